//! Stats Collector
//!
//! Monotonic counters plus a bounded ring of recent login attempts used to
//! answer "attempts in the last hour" style queries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::api::AttemptRecord;
use super::clock::Clock;
use super::config::StatsConfig;

#[derive(Debug)]
pub struct StatsCollector {
	config: StatsConfig,
	total_blocked_requests: AtomicU64,
	total_user_lockouts: AtomicU64,
	total_ip_blocks: AtomicU64,
	recent: Mutex<VecDeque<AttemptRecord>>,
	clock: Arc<dyn Clock>,
}

/// Attempt counts within the stats horizon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecentCounts {
	pub attempts: usize,
	pub failed: usize,
}

impl StatsCollector {
	pub fn new(config: StatsConfig, clock: Arc<dyn Clock>) -> Self {
		let recent = Mutex::new(VecDeque::with_capacity(config.recent_capacity.min(4096)));
		Self {
			config,
			total_blocked_requests: AtomicU64::new(0),
			total_user_lockouts: AtomicU64::new(0),
			total_ip_blocks: AtomicU64::new(0),
			recent,
			clock,
		}
	}

	pub fn record_blocked_request(&self) {
		self.total_blocked_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_user_lockout(&self) {
		self.total_user_lockouts.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_ip_block(&self) {
		self.total_ip_blocks.fetch_add(1, Ordering::Relaxed);
	}

	/// Append a login attempt, evicting the oldest one when the ring is full
	pub fn record_attempt(&self, ip: &str, email: &str, success: bool) {
		let record = AttemptRecord {
			timestamp: self.clock.now(),
			ip: ip.into(),
			email: email.into(),
			success,
		};
		let mut recent = self.recent.lock();
		while recent.len() >= self.config.recent_capacity {
			recent.pop_front();
		}
		recent.push_back(record);
	}

	pub fn total_blocked_requests(&self) -> u64 {
		self.total_blocked_requests.load(Ordering::Relaxed)
	}

	pub fn total_user_lockouts(&self) -> u64 {
		self.total_user_lockouts.load(Ordering::Relaxed)
	}

	pub fn total_ip_blocks(&self) -> u64 {
		self.total_ip_blocks.load(Ordering::Relaxed)
	}

	/// Attempts inside the stats horizon (one hour by default)
	pub fn recent_counts(&self) -> RecentCounts {
		let cutoff = self.clock.now().sub(self.config.horizon());
		let recent = self.recent.lock();
		recent.iter().rev().take_while(|r| r.timestamp > cutoff).fold(
			RecentCounts::default(),
			|mut counts, r| {
				counts.attempts += 1;
				if !r.success {
					counts.failed += 1;
				}
				counts
			},
		)
	}

	/// Newest-first view of the recent attempts
	pub fn recent_attempts(&self, limit: usize) -> Vec<AttemptRecord> {
		self.recent.lock().iter().rev().take(limit).cloned().collect()
	}

	/// Drop attempts older than the stats horizon
	pub fn sweep(&self) -> usize {
		let cutoff = self.clock.now().sub(self.config.horizon());
		let mut recent = self.recent.lock();
		let before = recent.len();
		while recent.front().is_some_and(|r| r.timestamp <= cutoff) {
			recent.pop_front();
		}
		before - recent.len()
	}
}


// vim: ts=4
