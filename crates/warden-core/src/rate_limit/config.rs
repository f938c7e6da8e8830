//! Rate Limiting Configuration
//!
//! Strongly typed configuration for the rule catalog, account lockout, IP
//! reputation, statistics and the janitor. Loaded once at startup and
//! validated before the engine is built.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Name of the fallback rule used for unknown rule names
pub const DEFAULT_RULE: &str = "default";

/// A single named sliding-window rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
	/// Rule name (e.g., "login", "register", "forgot_password")
	pub name: String,
	/// Requests allowed inside one window
	pub max_requests: u32,
	/// Trailing window length
	pub window_seconds: u64,
	/// Advisory retry delay reported once the limit is exceeded
	pub block_duration_seconds: u64,
}

impl RateLimitRule {
	pub fn new(
		name: impl Into<String>,
		max_requests: u32,
		window_seconds: u64,
		block_duration_seconds: u64,
	) -> Self {
		Self { name: name.into(), max_requests, window_seconds, block_duration_seconds }
	}

	pub fn window(&self) -> Duration {
		Duration::from_secs(self.window_seconds)
	}

	pub fn block_duration(&self) -> Duration {
		Duration::from_secs(self.block_duration_seconds)
	}

	fn validate(&self) -> ClResult<()> {
		if self.name.trim().is_empty() {
			return Err(Error::ConfigError("rule name must not be empty".into()));
		}
		if self.max_requests == 0 {
			return Err(Error::ConfigError(format!("rule '{}': max_requests must be >= 1", self.name)));
		}
		if self.window_seconds == 0 {
			return Err(Error::ConfigError(format!(
				"rule '{}': window_seconds must be >= 1",
				self.name
			)));
		}
		if self.block_duration_seconds == 0 {
			return Err(Error::ConfigError(format!(
				"rule '{}': block_duration_seconds must be >= 1",
				self.name
			)));
		}
		Ok(())
	}
}

/// Per-account lockout settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
	/// Consecutive failures that lock the account
	pub threshold: u32,
	/// How long a lock lasts, counted from the failure that triggered it
	pub duration_secs: u64,
	/// Idle time after which an unlocked account record is swept
	pub idle_ttl_secs: u64,
}

impl LockoutConfig {
	pub fn duration(&self) -> Duration {
		Duration::from_secs(self.duration_secs)
	}

	pub fn idle_ttl(&self) -> Duration {
		Duration::from_secs(self.idle_ttl_secs)
	}
}

impl Default for LockoutConfig {
	fn default() -> Self {
		Self {
			threshold: 5,
			duration_secs: 900,  // 15 minutes
			idle_ttl_secs: 3600, // 1 hour
		}
	}
}

/// Per-IP suspicious activity scoring
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
	/// Score at which the IP gets blocked
	pub block_threshold: f64,
	/// How long an IP block lasts
	pub block_duration_secs: u64,
	/// Trailing window over which events are scored
	pub window_secs: u64,
	/// Maximum number of events remembered per IP
	pub history_len: usize,
	/// Weight of a denied request or failed login
	pub denied_weight: f64,
	/// Weight of an allowed request
	pub allowed_weight: f64,
}

impl ReputationConfig {
	pub fn block_duration(&self) -> Duration {
		Duration::from_secs(self.block_duration_secs)
	}

	pub fn window(&self) -> Duration {
		Duration::from_secs(self.window_secs)
	}
}

impl Default for ReputationConfig {
	fn default() -> Self {
		Self {
			block_threshold: 10.0,
			block_duration_secs: 3600, // 1 hour
			window_secs: 600,          // 10 minutes
			history_len: 100,
			denied_weight: 1.0,
			allowed_weight: 0.05,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
	/// Time between two sweeps
	pub interval_secs: u64,
}

impl JanitorConfig {
	pub fn interval(&self) -> Duration {
		Duration::from_secs(self.interval_secs)
	}
}

impl Default for JanitorConfig {
	fn default() -> Self {
		Self { interval_secs: 300 }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
	/// Capacity of the recent login attempt ring buffer
	pub recent_capacity: usize,
	/// How far back "recent" attempt queries look
	pub horizon_secs: u64,
}

impl StatsConfig {
	pub fn horizon(&self) -> Duration {
		Duration::from_secs(self.horizon_secs)
	}
}

impl Default for StatsConfig {
	fn default() -> Self {
		Self { recent_capacity: 1000, horizon_secs: 3600 }
	}
}

/// Main rate limit configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Sliding-window rules by endpoint
	pub rules: Vec<RateLimitRule>,
	pub lockout: LockoutConfig,
	pub reputation: ReputationConfig,
	pub janitor: JanitorConfig,
	pub stats: StatsConfig,
	/// IPs that bypass every check from startup on
	pub bypass_ips: Vec<String>,
	/// Maximum number of keys each tracker holds (memory limit)
	pub max_tracked_keys: usize,
	/// Number of lock stripes per tracker
	pub shards: usize,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			rules: vec![
				// Strict limits to slow down credential stuffing
				RateLimitRule::new("login", 5, 60, 300),
				RateLimitRule::new("register", 3, 3600, 3600),
				RateLimitRule::new("forgot_password", 3, 3600, 3600),
				// Operator endpoints, kept apart from ordinary traffic
				RateLimitRule::new("admin", 30, 60, 300),
				RateLimitRule::new(DEFAULT_RULE, 60, 60, 60),
			],
			lockout: LockoutConfig::default(),
			reputation: ReputationConfig::default(),
			janitor: JanitorConfig::default(),
			stats: StatsConfig::default(),
			bypass_ips: Vec::new(),
			max_tracked_keys: 100_000,
			shards: 16,
		}
	}
}

impl RateLimitConfig {
	/// Reject configurations the engine cannot enforce
	pub fn validate(&self) -> ClResult<()> {
		let mut names = HashSet::new();
		for rule in &self.rules {
			rule.validate()?;
			if !names.insert(rule.name.as_str()) {
				return Err(Error::ConfigError(format!("duplicate rule '{}'", rule.name)));
			}
		}

		if self.lockout.threshold == 0 {
			return Err(Error::ConfigError("lockout.threshold must be >= 1".into()));
		}
		if self.lockout.duration_secs == 0 {
			return Err(Error::ConfigError("lockout.duration_secs must be >= 1".into()));
		}

		let rep = &self.reputation;
		if rep.block_threshold.is_nan() || rep.block_threshold <= 0.0 {
			return Err(Error::ConfigError("reputation.block_threshold must be > 0".into()));
		}
		if rep.block_duration_secs == 0 || rep.window_secs == 0 {
			return Err(Error::ConfigError(
				"reputation.block_duration_secs and reputation.window_secs must be >= 1".into(),
			));
		}
		if rep.history_len == 0 {
			return Err(Error::ConfigError("reputation.history_len must be >= 1".into()));
		}
		if rep.allowed_weight.is_nan() || rep.allowed_weight < 0.0 {
			return Err(Error::ConfigError("reputation.allowed_weight must be >= 0".into()));
		}
		if rep.denied_weight.is_nan() || rep.denied_weight <= rep.allowed_weight {
			return Err(Error::ConfigError(
				"reputation.denied_weight must be greater than allowed_weight".into(),
			));
		}

		if self.janitor.interval_secs == 0 {
			return Err(Error::ConfigError("janitor.interval_secs must be >= 1".into()));
		}
		if self.stats.recent_capacity == 0 || self.stats.horizon_secs == 0 {
			return Err(Error::ConfigError(
				"stats.recent_capacity and stats.horizon_secs must be >= 1".into(),
			));
		}
		if self.shards == 0 {
			return Err(Error::ConfigError("shards must be >= 1".into()));
		}
		if self.max_tracked_keys < self.shards {
			return Err(Error::ConfigError("max_tracked_keys must be >= shards".into()));
		}

		Ok(())
	}
}


// vim: ts=4
