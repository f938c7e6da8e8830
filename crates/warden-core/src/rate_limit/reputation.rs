//! IP Reputation Tracker
//!
//! Coarse-grained defense layered over the per-rule windows. Every request
//! outcome seen from an IP is remembered in a bounded history; the weighted
//! count of recent events is the IP's suspicious score. Once the score reaches
//! the threshold the IP is blocked for a fixed duration, whatever rule or
//! account it targets.

use std::collections::VecDeque;
use std::sync::Arc;

use super::api::{IpStatus, IpVerdict};
use super::clock::Clock;
use super::config::ReputationConfig;
use super::store::{Retention, ShardedStore};
use crate::prelude::*;

/// Kind of event fed into the score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
	/// Request that passed every check, or a successful login
	Allowed,
	/// Request that was refused, or a failed login
	Denied,
}

#[derive(Debug, Clone, Default)]
struct IpState {
	blocked_until: Option<Timestamp>,
	recent_requests: VecDeque<(Timestamp, Activity)>,
}

impl IpState {
	fn active_block(&self, now: Timestamp) -> Option<Timestamp> {
		self.blocked_until.filter(|until| *until > now)
	}

	fn evict_before(&mut self, cutoff: Timestamp) {
		while self.recent_requests.front().is_some_and(|(ts, _)| *ts <= cutoff) {
			self.recent_requests.pop_front();
		}
	}

	/// An active block is never given up for room; an empty history is expired
	fn retention(&mut self, now: Timestamp, cutoff: Timestamp) -> Retention {
		if self.active_block(now).is_some() {
			return Retention::Protected;
		}
		self.blocked_until = None;
		self.evict_before(cutoff);
		if self.recent_requests.is_empty() { Retention::Expired } else { Retention::Evictable }
	}
}

#[derive(Debug)]
pub struct IpReputationTracker {
	config: ReputationConfig,
	ips: ShardedStore<String, IpState>,
	clock: Arc<dyn Clock>,
}

impl IpReputationTracker {
	pub fn new(config: ReputationConfig, capacity: usize, shards: usize, clock: Arc<dyn Clock>) -> Self {
		Self { config, ips: ShardedStore::new(capacity, shards), clock }
	}

	fn weight(&self, activity: Activity) -> f64 {
		match activity {
			Activity::Allowed => self.config.allowed_weight,
			Activity::Denied => self.config.denied_weight,
		}
	}

	fn score(&self, state: &IpState, cutoff: Timestamp) -> f64 {
		state
			.recent_requests
			.iter()
			.filter(|(ts, _)| *ts > cutoff)
			.map(|(_, activity)| self.weight(*activity))
			.sum()
	}

	/// Clear an elapsed block, then block if the score crossed the threshold
	fn evaluate(&self, ip: &str, state: &mut IpState, now: Timestamp) -> IpVerdict {
		if let Some(blocked_until) = state.active_block(now) {
			return IpVerdict::Blocked { blocked_until, newly_blocked: false };
		}
		state.blocked_until = None;
		state.evict_before(now.sub(self.config.window()));

		let score = self.score(state, now.sub(self.config.window()));
		if score >= self.config.block_threshold {
			let blocked_until = now.add(self.config.block_duration());
			state.blocked_until = Some(blocked_until);
			// Start over once the block ends
			state.recent_requests.clear();
			info!(ip = %ip, score, blocked_until = %blocked_until, "IP blocked for suspicious activity");
			return IpVerdict::Blocked { blocked_until, newly_blocked: true };
		}
		IpVerdict::Clear
	}

	/// Whether `ip` is blocked, blocking it now if its score calls for it
	pub fn check_and_maybe_block(&self, ip: &str) -> IpVerdict {
		let now = self.clock.now();
		self.ips
			.with_existing(ip, |state| self.evaluate(ip, state, now))
			.unwrap_or(IpVerdict::Clear)
	}

	/// Remember an event from `ip` and re-evaluate its score
	pub fn record_activity(&self, ip: &str, activity: Activity) -> IpVerdict {
		let now = self.clock.now();
		let history_len = self.config.history_len;
		let cutoff = now.sub(self.config.window());
		let retention = |state: &mut IpState| state.retention(now, cutoff);
		self.ips.with_entry(ip, IpState::default, retention, |state| {
			if state.active_block(now).is_some() {
				// Already blocked; nothing new to learn
				return self.evaluate(ip, state, now);
			}
			state.recent_requests.push_back((now, activity));
			while state.recent_requests.len() > history_len {
				state.recent_requests.pop_front();
			}
			self.evaluate(ip, state, now)
		})
	}

	/// Force `ip` back to unblocked with a zero score
	///
	/// Returns whether a record existed.
	pub fn unblock(&self, ip: &str) -> bool {
		let existed = self.ips.remove(ip).is_some();
		if existed {
			info!(ip = %ip, "IP unblocked");
		}
		existed
	}

	/// Effective reputation of `ip` without modifying anything
	///
	/// Window usage and bypass flags are filled in by the engine.
	pub fn status(&self, ip: &str) -> IpStatus {
		let now = self.clock.now();
		let cutoff = now.sub(self.config.window());
		let snapshot = self.ips.peek(ip, |state| {
			let live = state.recent_requests.iter().filter(|(ts, _)| *ts > cutoff).count();
			(state.active_block(now), self.score(state, cutoff), live)
		});
		let (blocked_until, suspicious_score, recent_requests) = snapshot.unwrap_or((None, 0.0, 0));
		IpStatus {
			ip: ip.into(),
			tracked: snapshot.is_some(),
			bypassed: false,
			blocked: blocked_until.is_some(),
			blocked_until,
			suspicious_score,
			recent_requests,
			windows: Vec::new(),
		}
	}

	/// Drop records with no block in force and no event left in the scoring window
	pub fn sweep(&self) -> usize {
		let now = self.clock.now();
		let cutoff = now.sub(self.config.window());
		self.ips.sweep(|state| state.retention(now, cutoff))
	}

	pub fn active_blocks(&self) -> usize {
		let now = self.clock.now();
		self.ips.count(|state| state.active_block(now).is_some())
	}

	pub fn tracked(&self) -> usize {
		self.ips.len()
	}
}


// vim: ts=4
