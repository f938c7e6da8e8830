//! Rate Limiting System
//!
//! Layered brute-force protection for authentication endpoints: per-endpoint
//! sliding windows, per-account lockout, per-IP reputation scoring and an
//! administrator bypass list, with a janitor that keeps memory bounded.

pub mod admin;
mod api;
mod bypass;
mod catalog;
mod clock;
mod config;
mod engine;
mod error;
mod extractors;
mod janitor;
mod lockout;
mod middleware;
mod reputation;
mod stats;
mod store;
mod window;

pub use api::{
	AccountStatus, AttemptRecord, BlockReason, CheckResult, IpStatus, IpVerdict, LockoutOutcome,
	LoginAttemptOutcome, RateLimiterStats, SweepReport, WindowDecision, WindowUsage,
	HEADER_BLOCKED, HEADER_BYPASS, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
	HEADER_RETRY_AFTER,
};
pub use bypass::AdminBypassRegistry;
pub use catalog::RuleCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
	JanitorConfig, LockoutConfig, RateLimitConfig, RateLimitRule, ReputationConfig, StatsConfig,
	DEFAULT_RULE,
};
pub use engine::RateLimitEngine;
pub use error::RateLimitRejection;
pub use extractors::{extract_client_ip, normalize_email, normalize_ip, ProxyMode, UNKNOWN_CLIENT};
pub use janitor::spawn_janitor;
pub use lockout::AccountLockoutTracker;
pub use middleware::{RateLimitLayer, RateLimitService};
pub use reputation::{Activity, IpReputationTracker};
pub use stats::{RecentCounts, StatsCollector};
pub use window::SlidingWindowLimiter;

// vim: ts=4
