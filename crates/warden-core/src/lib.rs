//! Brute-force protection engine for authentication endpoints.
//!
//! Combines per-endpoint sliding-window throttling, per-account lockout,
//! per-IP reputation scoring and an administrator bypass list behind a single
//! [`RateLimitEngine`]. All state is in memory and bounded; a periodic janitor
//! evicts expired records.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod prelude;
pub mod rate_limit;

pub use rate_limit::{CheckResult, RateLimitConfig, RateLimitEngine, RateLimitLayer};

// vim: ts=4
