//! Rate Limit Engine
//!
//! Orchestrates the trackers. Checks run in the order bypass, IP block,
//! account lock, sliding window; the first blocking condition wins. The
//! trackers never reference each other: all cross-tracker effects (stats,
//! reputation feedback) happen here.

use std::sync::Arc;

use super::api::{
	AccountStatus, AttemptRecord, BlockReason, CheckResult, IpStatus, IpVerdict,
	LoginAttemptOutcome, LockoutOutcome, RateLimiterStats, SweepReport,
};
use super::bypass::AdminBypassRegistry;
use super::catalog::RuleCatalog;
use super::clock::{Clock, SystemClock};
use super::config::RateLimitConfig;
use super::extractors::{normalize_email, normalize_ip};
use super::lockout::AccountLockoutTracker;
use super::reputation::{Activity, IpReputationTracker};
use super::stats::StatsCollector;
use super::window::SlidingWindowLimiter;
use crate::prelude::*;

/// Main rate limit engine
///
/// Build one at startup and share it (`Arc<RateLimitEngine>`) with request handlers.
#[derive(Debug)]
pub struct RateLimitEngine {
	config: RateLimitConfig,
	bypass: AdminBypassRegistry,
	reputation: IpReputationTracker,
	lockout: AccountLockoutTracker,
	window: SlidingWindowLimiter,
	stats: StatsCollector,
	clock: Arc<dyn Clock>,
}

impl RateLimitEngine {
	/// Create an engine reading the system clock
	pub fn new(config: RateLimitConfig) -> ClResult<Self> {
		Self::with_clock(config, Arc::new(SystemClock))
	}

	/// Create an engine with a custom time source
	pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> ClResult<Self> {
		config.validate()?;

		let capacity = config.max_tracked_keys;
		let shards = config.shards;
		let catalog = RuleCatalog::new(&config.rules);

		let bypass = AdminBypassRegistry::new();
		for ip in &config.bypass_ips {
			bypass.add(&normalize_ip(ip));
		}

		info!(
			rules = catalog.rules().len(),
			lockout_threshold = config.lockout.threshold,
			ip_block_threshold = config.reputation.block_threshold,
			"Rate limit engine initialized"
		);

		Ok(Self {
			bypass,
			reputation: IpReputationTracker::new(
				config.reputation.clone(),
				capacity,
				shards,
				clock.clone(),
			),
			lockout: AccountLockoutTracker::new(config.lockout.clone(), capacity, shards, clock.clone()),
			window: SlidingWindowLimiter::new(catalog, capacity, shards, clock.clone()),
			stats: StatsCollector::new(config.stats.clone(), clock.clone()),
			clock,
			config,
		})
	}

	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	pub fn catalog(&self) -> &RuleCatalog {
		self.window.catalog()
	}

	/// Decide whether a request to a protected endpoint may proceed
	///
	/// `identity` is the claimed account (e.g., the login email) when known.
	pub fn check_rate_limit(&self, rule: &str, ip: &str, identity: Option<&str>) -> CheckResult {
		let ip = normalize_ip(ip);

		if self.bypass.is_bypassed(&ip) {
			debug!(ip = %ip, rule = %rule, "Rate limit bypassed");
			return CheckResult::bypassed();
		}

		let verdict = self.reputation.check_and_maybe_block(&ip);
		if let IpVerdict::Blocked { blocked_until, newly_blocked } = verdict {
			if newly_blocked {
				self.stats.record_ip_block();
			}
			return self.block(BlockReason::Ip, blocked_until, &ip, rule);
		}

		if let Some(email) = identity.map(normalize_email) {
			if let Some(locked_until) = self.lockout.lock_status(&email) {
				self.feed_reputation(&ip, Activity::Denied);
				return self.block(BlockReason::Account, locked_until, &ip, rule);
			}
		}

		let result = CheckResult::from_window(self.window.allow(rule, &ip));
		if result.allowed {
			self.feed_reputation(&ip, Activity::Allowed);
		} else {
			self.stats.record_blocked_request();
			self.feed_reputation(&ip, Activity::Denied);
		}
		result
	}

	fn block(&self, reason: BlockReason, until: Timestamp, ip: &str, rule: &str) -> CheckResult {
		self.stats.record_blocked_request();
		debug!(ip = %ip, rule = %rule, reason = ?reason, until = %until, "Request blocked");
		CheckResult::blocked(reason, until.saturating_since(self.clock.now()))
	}

	fn feed_reputation(&self, ip: &str, activity: Activity) -> IpVerdict {
		let verdict = self.reputation.record_activity(ip, activity);
		if matches!(verdict, IpVerdict::Blocked { newly_blocked: true, .. }) {
			self.stats.record_ip_block();
		}
		verdict
	}

	/// Report the outcome of a login attempt that reached the business logic
	///
	/// May lock the account or block the IP as a side effect.
	pub fn record_login_attempt(&self, ip: &str, email: &str, success: bool) -> LoginAttemptOutcome {
		let ip = normalize_ip(ip);
		let email = normalize_email(email);

		let account = self.lockout.record_attempt(&email, success);
		if matches!(account, LockoutOutcome::Locked { .. }) {
			self.stats.record_user_lockout();
		}

		let activity = if success { Activity::Allowed } else { Activity::Denied };
		let ip_verdict = if self.bypass.is_bypassed(&ip) {
			IpVerdict::Clear
		} else {
			self.feed_reputation(&ip, activity)
		};

		self.stats.record_attempt(&ip, &email, success);
		LoginAttemptOutcome { account, ip: ip_verdict }
	}

	/// Count a request refused outside the engine against `ip`'s reputation
	///
	/// For checks the engine never sees, such as a rejected admin token.
	pub fn record_denial(&self, ip: &str) -> IpVerdict {
		let ip = normalize_ip(ip);
		if self.bypass.is_bypassed(&ip) {
			return IpVerdict::Clear;
		}
		debug!(ip = %ip, "Request denied outside the engine");
		self.feed_reputation(&ip, Activity::Denied)
	}

	pub fn is_locked(&self, email: &str) -> bool {
		self.lockout.is_locked(&normalize_email(email))
	}

	pub fn account_status(&self, email: &str) -> AccountStatus {
		self.lockout.status(&normalize_email(email))
	}

	pub fn ip_status(&self, ip: &str) -> IpStatus {
		let ip = normalize_ip(ip);
		let mut status = self.reputation.status(&ip);
		status.bypassed = self.bypass.is_bypassed(&ip);
		status.windows = self.window.usage(&ip);
		status
	}

	pub fn stats(&self) -> RateLimiterStats {
		let recent = self.stats.recent_counts();
		RateLimiterStats {
			total_blocked_requests: self.stats.total_blocked_requests(),
			total_user_lockouts: self.stats.total_user_lockouts(),
			total_ip_blocks: self.stats.total_ip_blocks(),
			attempts_last_hour: recent.attempts,
			failed_attempts_last_hour: recent.failed,
			active_lockouts: self.lockout.active_lockouts(),
			active_ip_blocks: self.reputation.active_blocks(),
			bypassed_ips: self.bypass.len(),
			tracked_windows: self.window.tracked(),
			tracked_accounts: self.lockout.tracked(),
			tracked_ips: self.reputation.tracked(),
		}
	}

	/// Newest-first recent login attempts
	pub fn recent_attempts(&self, limit: usize) -> Vec<AttemptRecord> {
		self.stats.recent_attempts(limit)
	}

	// Administrative operations: idempotent, never fail.
	// Callers are responsible for authorizing the operator.

	pub fn unlock_account(&self, email: &str) {
		let email = normalize_email(email);
		if self.lockout.unlock(&email) {
			info!(email = %email, "Account unlocked by administrator");
		}
	}

	pub fn unblock_ip(&self, ip: &str) {
		self.reputation.unblock(&normalize_ip(ip));
	}

	pub fn add_bypass(&self, ip: &str) {
		self.bypass.add(&normalize_ip(ip));
	}

	pub fn remove_bypass(&self, ip: &str) {
		self.bypass.remove(&normalize_ip(ip));
	}

	pub fn list_bypass(&self) -> Vec<Box<str>> {
		self.bypass.list()
	}

	/// Evict expired records from every tracker
	pub fn sweep(&self) -> SweepReport {
		SweepReport {
			windows: self.window.sweep(),
			accounts: self.lockout.sweep(),
			ips: self.reputation.sweep(),
			attempts: self.stats.sweep(),
		}
	}
}


// vim: ts=4
