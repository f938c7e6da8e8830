//! Sliding Window Limiter
//!
//! Per (rule, client) request timestamps over the trailing window. A request
//! is counted only when it is allowed; denied requests do not consume quota.
//! The window is the half-open interval `(now - window, now]`: a timestamp
//! exactly `window` old has already left it.
//!
//! Each rule keeps its own store of client windows, so a lookup borrows the
//! client key and only a client's first request allocates.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::api::{WindowDecision, WindowUsage};
use super::catalog::RuleCatalog;
use super::clock::Clock;
use super::config::{RateLimitRule, DEFAULT_RULE};
use super::store::{Retention, ShardedStore};
use crate::prelude::*;

/// Timestamps of the allowed requests still inside the window, oldest first
#[derive(Debug, Default)]
struct AttemptWindow {
	hits: VecDeque<Timestamp>,
}

impl AttemptWindow {
	fn evict_before(&mut self, cutoff: Timestamp) {
		while self.hits.front().is_some_and(|ts| *ts <= cutoff) {
			self.hits.pop_front();
		}
	}

	fn retention(&mut self, cutoff: Timestamp) -> Retention {
		self.evict_before(cutoff);
		if self.hits.is_empty() { Retention::Expired } else { Retention::Evictable }
	}

	fn count(&self) -> u32 {
		u32::try_from(self.hits.len()).unwrap_or(u32::MAX)
	}
}

/// Client windows of a single rule
#[derive(Debug)]
struct RuleWindows {
	rule: Arc<RateLimitRule>,
	name: Arc<str>,
	clients: ShardedStore<String, AttemptWindow>,
}

impl RuleWindows {
	fn new(rule: Arc<RateLimitRule>, capacity: usize, shards: usize) -> Self {
		let name = Arc::from(rule.name.as_str());
		Self { rule, name, clients: ShardedStore::new(capacity, shards) }
	}

	fn usage(&self, used: u32) -> WindowUsage {
		WindowUsage {
			rule: self.name.clone(),
			used,
			limit: self.rule.max_requests,
			remaining: self.rule.max_requests.saturating_sub(used),
		}
	}
}

#[derive(Debug)]
pub struct SlidingWindowLimiter {
	catalog: RuleCatalog,
	windows: HashMap<Box<str>, RuleWindows>,
	default: RuleWindows,
	clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
	/// `capacity` bounds the number of clients tracked per rule
	pub fn new(catalog: RuleCatalog, capacity: usize, shards: usize, clock: Arc<dyn Clock>) -> Self {
		let default = RuleWindows::new(catalog.resolve(DEFAULT_RULE).clone(), capacity, shards);
		let windows = catalog
			.rules()
			.into_iter()
			.filter(|rule| rule.name != DEFAULT_RULE)
			.map(|rule| (Box::from(rule.name.as_str()), RuleWindows::new(rule, capacity, shards)))
			.collect();
		Self { catalog, windows, default, clock }
	}

	pub fn catalog(&self) -> &RuleCatalog {
		&self.catalog
	}

	fn rule_windows(&self, rule_name: &str) -> &RuleWindows {
		let rule = self.catalog.resolve(rule_name);
		self.windows.get(rule.name.as_str()).unwrap_or(&self.default)
	}

	fn all_windows(&self) -> impl Iterator<Item = &RuleWindows> {
		self.windows.values().chain(std::iter::once(&self.default))
	}

	/// Count a request for `client_key` under `rule_name` if the window has room
	pub fn allow(&self, rule_name: &str, client_key: &str) -> WindowDecision {
		let windows = self.rule_windows(rule_name);
		let rule = &windows.rule;
		let now = self.clock.now();
		let cutoff = now.sub(rule.window());

		let decision = windows.clients.with_entry(
			client_key,
			AttemptWindow::default,
			|window| window.retention(cutoff),
			|window| {
				window.evict_before(cutoff);
				let allowed = window.count() < rule.max_requests;
				if allowed {
					window.hits.push_back(now);
				}
				let oldest = window.hits.front().copied().unwrap_or(now);
				WindowDecision {
					rule: windows.name.clone(),
					allowed,
					limit: rule.max_requests,
					remaining: rule.max_requests.saturating_sub(window.count()),
					reset_at: oldest.add(rule.window()),
					retry_after: (!allowed).then(|| rule.block_duration()),
				}
			},
		);

		if decision.allowed {
			debug!(rule = %rule.name, key = %client_key, remaining = decision.remaining, "Request allowed");
		} else {
			debug!(rule = %rule.name, key = %client_key, "Request rate limited");
		}
		decision
	}

	/// Current usage of every rule's window by `client_key`, without counting a request
	pub fn usage(&self, client_key: &str) -> Vec<WindowUsage> {
		let now = self.clock.now();
		self.catalog
			.rules()
			.iter()
			.filter_map(|rule| {
				let windows = self.rule_windows(&rule.name);
				let cutoff = now.sub(rule.window());
				let used = windows.clients.peek(client_key, |window| {
					let live = window.hits.iter().filter(|ts| **ts > cutoff).count();
					u32::try_from(live).unwrap_or(u32::MAX)
				})?;
				(used > 0).then(|| windows.usage(used))
			})
			.collect()
	}

	/// Drop windows whose timestamps have all expired
	pub fn sweep(&self) -> usize {
		let now = self.clock.now();
		self.all_windows()
			.map(|windows| {
				let cutoff = now.sub(windows.rule.window());
				windows.clients.sweep(|window| window.retention(cutoff))
			})
			.sum()
	}

	pub fn tracked(&self) -> usize {
		self.all_windows().map(|windows| windows.clients.len()).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rate_limit::clock::ManualClock;
	use crate::rate_limit::config::DEFAULT_RULE;
	use std::time::Duration;

	fn limiter() -> (SlidingWindowLimiter, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());
		let catalog = RuleCatalog::new(&[
			RateLimitRule::new("login", 5, 60, 60),
			RateLimitRule::new(DEFAULT_RULE, 2, 10, 30),
		]);
		(SlidingWindowLimiter::new(catalog, 1000, 4, clock.clone()), clock)
	}

	#[test]
	fn test_allows_up_to_max_then_denies() {
		let (limiter, _clock) = limiter();
		let results: Vec<bool> = (0..6).map(|_| limiter.allow("login", "1.2.3.4").allowed).collect();
		assert_eq!(results, vec![true, true, true, true, true, false]);

		let denied = limiter.allow("login", "1.2.3.4");
		assert_eq!(denied.remaining, 0);
		assert_eq!(denied.retry_after, Some(Duration::from_secs(60)));
	}

	#[test]
	fn test_remaining_counts_down() {
		let (limiter, _clock) = limiter();
		assert_eq!(limiter.allow("login", "a").remaining, 4);
		assert_eq!(limiter.allow("login", "a").remaining, 3);
		// Other clients have their own window
		assert_eq!(limiter.allow("login", "b").remaining, 4);
	}

	#[test]
	fn test_window_rolls_forward() {
		let (limiter, clock) = limiter();
		for _ in 0..5 {
			assert!(limiter.allow("login", "a").allowed);
		}
		assert!(!limiter.allow("login", "a").allowed);

		clock.advance(Duration::from_secs(59));
		assert!(!limiter.allow("login", "a").allowed);

		// Exactly one window later the old hits are outside (now - window, now]
		clock.advance(Duration::from_secs(1));
		assert!(limiter.allow("login", "a").allowed);
	}

	#[test]
	fn test_denied_requests_do_not_consume_quota() {
		let (limiter, clock) = limiter();
		for _ in 0..5 {
			limiter.allow("login", "a");
		}
		// Hammering while denied must not push the reset further out
		for _ in 0..50 {
			clock.advance(Duration::from_secs(1));
			limiter.allow("login", "a");
		}
		clock.advance(Duration::from_secs(10));
		assert!(limiter.allow("login", "a").allowed);
	}

	#[test]
	fn test_reset_at_tracks_oldest_hit() {
		let (limiter, clock) = limiter();
		let start = clock.now();
		limiter.allow("login", "a");
		clock.advance(Duration::from_secs(5));
		let decision = limiter.allow("login", "a");
		assert_eq!(decision.reset_at, start.add(Duration::from_secs(60)));
	}

	#[test]
	fn test_unknown_rule_falls_back_to_default() {
		let (limiter, _clock) = limiter();
		let decision = limiter.allow("no_such_rule", "a");
		assert_eq!(&*decision.rule, DEFAULT_RULE);
		assert_eq!(decision.limit, 2);
		assert!(limiter.allow("another_unknown", "a").allowed);
		// Both unknown names share the default bucket
		assert!(!limiter.allow("no_such_rule", "a").allowed);
	}

	#[test]
	fn test_usage_and_sweep() {
		let (limiter, clock) = limiter();
		limiter.allow("login", "a");
		limiter.allow("default", "a");
		let usage = limiter.usage("a");
		assert_eq!(usage.len(), 2);
		assert!(usage.iter().any(|u| &*u.rule == "login" && u.used == 1 && u.remaining == 4));

		clock.advance(Duration::from_secs(10));
		assert_eq!(limiter.sweep(), 1);
		assert_eq!(limiter.tracked(), 1);

		clock.advance(Duration::from_secs(50));
		assert_eq!(limiter.sweep(), 1);
		assert_eq!(limiter.tracked(), 0);
		assert!(limiter.usage("a").is_empty());
	}

	#[test]
	fn test_decisions_share_rule_name() {
		let (limiter, _clock) = limiter();
		let first = limiter.allow("login", "a");
		let second = limiter.allow("login", "b");
		assert!(Arc::ptr_eq(&first.rule, &second.rule));
		// Unknown names land on the default rule's name
		let fallback = limiter.allow("no_such_rule", "a");
		assert!(Arc::ptr_eq(&fallback.rule, &limiter.allow(DEFAULT_RULE, "b").rule));
	}

	#[test]
	fn test_full_store_forgets_expired_windows_first() {
		let clock = Arc::new(ManualClock::default());
		let catalog = RuleCatalog::new(&[RateLimitRule::new(DEFAULT_RULE, 2, 10, 30)]);
		let limiter = SlidingWindowLimiter::new(catalog, 4, 1, clock.clone());
		limiter.allow(DEFAULT_RULE, "a");
		limiter.allow(DEFAULT_RULE, "a");
		clock.advance(Duration::from_secs(5));
		for client in ["b", "c", "d"] {
			limiter.allow(DEFAULT_RULE, client);
		}
		assert!(!limiter.allow(DEFAULT_RULE, "a").allowed);

		// Only the hits of "a" have left the window
		clock.advance(Duration::from_secs(6));
		assert!(limiter.allow(DEFAULT_RULE, "e").allowed);
		assert_eq!(limiter.tracked(), 4);
		assert_eq!(limiter.usage("b").len(), 1);
	}
}

// vim: ts=4
