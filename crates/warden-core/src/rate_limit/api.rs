//! Rate Limiting API Types
//!
//! Decisions returned by the hot path and read-only snapshots for admin tooling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::prelude::*;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_BLOCKED: &str = "X-RateLimit-Blocked";
pub const HEADER_BYPASS: &str = "X-RateLimit-Bypass";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Outcome of a sliding-window evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDecision {
	/// Rule actually applied (after fallback)
	#[serde(serialize_with = "serialize_shared_str")]
	pub rule: Arc<str>,
	pub allowed: bool,
	/// Requests allowed per window
	pub limit: u32,
	/// Requests left in the current window after this one
	pub remaining: u32,
	/// When the oldest counted request leaves the window
	pub reset_at: Timestamp,
	/// Set when denied
	#[serde(serialize_with = "serialize_secs")]
	pub retry_after: Option<Duration>,
}

/// Why a request was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
	/// The client IP is blocked for suspicious activity
	Ip,
	/// The claimed account is locked out
	Account,
	/// The sliding window for this rule is exhausted
	RateLimit,
}

impl BlockReason {
	/// Value of the `X-RateLimit-Blocked` header, if any
	pub fn tag(self) -> Option<&'static str> {
		match self {
			BlockReason::Ip => Some("ip"),
			BlockReason::Account => Some("account"),
			BlockReason::RateLimit => None,
		}
	}
}

/// Decision of [`RateLimitEngine::check_rate_limit`](super::RateLimitEngine::check_rate_limit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
	pub allowed: bool,
	/// The IP is on the admin bypass list; no checks were made
	pub bypassed: bool,
	pub reason: Option<BlockReason>,
	#[serde(serialize_with = "serialize_secs")]
	pub retry_after: Option<Duration>,
	/// Present when the sliding window was consulted
	pub window: Option<WindowDecision>,
}

impl CheckResult {
	pub(crate) fn bypassed() -> Self {
		Self { allowed: true, bypassed: true, reason: None, retry_after: None, window: None }
	}

	pub(crate) fn blocked(reason: BlockReason, retry_after: Duration) -> Self {
		Self {
			allowed: false,
			bypassed: false,
			reason: Some(reason),
			retry_after: Some(retry_after),
			window: None,
		}
	}

	pub(crate) fn from_window(window: WindowDecision) -> Self {
		Self {
			allowed: window.allowed,
			bypassed: false,
			reason: (!window.allowed).then_some(BlockReason::RateLimit),
			retry_after: window.retry_after,
			window: Some(window),
		}
	}

	/// Response headers describing this decision
	pub fn headers(&self) -> BTreeMap<&'static str, String> {
		let mut headers = BTreeMap::new();
		if self.bypassed {
			headers.insert(HEADER_BYPASS, "true".to_string());
		}
		if let Some(window) = &self.window {
			headers.insert(HEADER_LIMIT, window.limit.to_string());
			headers.insert(HEADER_REMAINING, window.remaining.to_string());
			headers.insert(HEADER_RESET, ceil_secs(window.reset_at).to_string());
		}
		if let Some(retry_after) = self.retry_after {
			headers.insert(HEADER_RETRY_AFTER, retry_after_secs(retry_after).to_string());
		}
		if let Some(tag) = self.reason.and_then(BlockReason::tag) {
			headers.insert(HEADER_BLOCKED, tag.to_string());
		}
		headers
	}
}

/// Whole seconds for a `Retry-After` header, rounded up and at least 1
pub fn retry_after_secs(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis().div_ceil(1000)).unwrap_or(u64::MAX).max(1)
}

fn ceil_secs(ts: Timestamp) -> i64 {
	ts.0.div_euclid(1000) + i64::from(ts.0.rem_euclid(1000) != 0)
}

fn serialize_secs<S: serde::Serializer>(
	value: &Option<Duration>,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	match value {
		Some(d) => serializer.serialize_some(&retry_after_secs(*d)),
		None => serializer.serialize_none(),
	}
}

fn serialize_shared_str<S: serde::Serializer>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(value)
}

/// Account lockout state transition caused by a login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "state")]
pub enum LockoutOutcome {
	/// Successful login, counters cleared
	Reset,
	/// Failure recorded, still below the threshold
	Failed { failed_attempts: u32 },
	/// This failure reached the threshold and locked the account
	Locked { locked_until: Timestamp },
	/// Failure while already locked; nothing changed
	AlreadyLocked { locked_until: Timestamp },
}

/// IP reputation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "state")]
pub enum IpVerdict {
	Clear,
	Blocked {
		blocked_until: Timestamp,
		/// This call transitioned the IP into the blocked state
		newly_blocked: bool,
	},
}

impl IpVerdict {
	pub fn is_blocked(&self) -> bool {
		matches!(self, IpVerdict::Blocked { .. })
	}
}

/// Side effects of [`RateLimitEngine::record_login_attempt`](super::RateLimitEngine::record_login_attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptOutcome {
	pub account: LockoutOutcome,
	pub ip: IpVerdict,
}

/// Snapshot of an account's lockout state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
	pub email: Box<str>,
	/// A record exists for this account
	pub tracked: bool,
	pub locked: bool,
	pub failed_attempts: u32,
	pub locked_until: Option<Timestamp>,
	pub last_attempt: Option<Timestamp>,
}

/// Usage of one rule's window by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowUsage {
	#[serde(serialize_with = "serialize_shared_str")]
	pub rule: Arc<str>,
	pub used: u32,
	pub limit: u32,
	pub remaining: u32,
}

/// Snapshot of an IP's reputation state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpStatus {
	pub ip: Box<str>,
	/// A reputation record exists for this IP
	pub tracked: bool,
	pub bypassed: bool,
	pub blocked: bool,
	pub blocked_until: Option<Timestamp>,
	pub suspicious_score: f64,
	/// Events currently remembered for this IP
	pub recent_requests: usize,
	pub windows: Vec<WindowUsage>,
}

/// One entry of the recent-activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
	pub timestamp: Timestamp,
	pub ip: Box<str>,
	pub email: Box<str>,
	pub success: bool,
}

/// Statistics about the rate limiter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
	/// Requests refused by any check
	pub total_blocked_requests: u64,
	/// Accounts that transitioned into the locked state
	pub total_user_lockouts: u64,
	/// IPs that transitioned into the blocked state
	pub total_ip_blocks: u64,
	pub attempts_last_hour: usize,
	pub failed_attempts_last_hour: usize,
	pub active_lockouts: usize,
	pub active_ip_blocks: usize,
	pub bypassed_ips: usize,
	pub tracked_windows: usize,
	pub tracked_accounts: usize,
	pub tracked_ips: usize,
}

/// Records removed by one janitor pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
	pub windows: usize,
	pub accounts: usize,
	pub ips: usize,
	pub attempts: usize,
}

impl SweepReport {
	pub fn total(&self) -> usize {
		self.windows + self.accounts + self.ips + self.attempts
	}
}


// vim: ts=4
