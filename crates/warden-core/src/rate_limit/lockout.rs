//! Account Lockout Tracker
//!
//! Counts consecutive failed logins per account. Reaching the threshold locks
//! the account for a fixed duration measured from the failure that triggered
//! it; further failures while locked change nothing. A success, an elapsed
//! lock, or an admin unlock returns the account to the active state.

use std::sync::Arc;

use super::api::{AccountStatus, LockoutOutcome};
use super::clock::Clock;
use super::config::LockoutConfig;
use super::store::{Retention, ShardedStore};
use crate::prelude::*;

#[derive(Debug, Clone)]
struct AccountLockState {
	failed_attempts: u32,
	locked_until: Option<Timestamp>,
	last_attempt: Timestamp,
}

impl AccountLockState {
	fn new(now: Timestamp) -> Self {
		Self { failed_attempts: 0, locked_until: None, last_attempt: now }
	}

	/// Returns the lock expiry if the lock is still in force
	fn active_lock(&self, now: Timestamp) -> Option<Timestamp> {
		self.locked_until.filter(|until| *until > now)
	}

	/// Lazily return an elapsed lock to the active state
	fn expire_lock(&mut self, now: Timestamp) {
		if self.locked_until.is_some_and(|until| until <= now) {
			self.locked_until = None;
			self.failed_attempts = 0;
		}
	}

	/// An active lock is never given up for room; idle records are expired
	fn retention(&mut self, now: Timestamp, idle_cutoff: Timestamp) -> Retention {
		self.expire_lock(now);
		if self.locked_until.is_some() {
			Retention::Protected
		} else if self.last_attempt <= idle_cutoff {
			Retention::Expired
		} else {
			Retention::Evictable
		}
	}
}

#[derive(Debug)]
pub struct AccountLockoutTracker {
	config: LockoutConfig,
	accounts: ShardedStore<String, AccountLockState>,
	clock: Arc<dyn Clock>,
}

impl AccountLockoutTracker {
	pub fn new(config: LockoutConfig, capacity: usize, shards: usize, clock: Arc<dyn Clock>) -> Self {
		Self { config, accounts: ShardedStore::new(capacity, shards), clock }
	}

	/// Record the outcome of a login attempt for `email`
	pub fn record_attempt(&self, email: &str, success: bool) -> LockoutOutcome {
		let now = self.clock.now();
		let threshold = self.config.threshold;
		let duration = self.config.duration();

		if success {
			// Only an existing record can hold state worth resetting
			self.accounts.with_existing(email, |state| {
				*state = AccountLockState::new(now);
			});
			debug!(email = %email, "Successful login, lockout counters reset");
			return LockoutOutcome::Reset;
		}

		let idle_cutoff = now.sub(self.config.idle_ttl());
		let outcome = self.accounts.with_entry(
			email,
			|| AccountLockState::new(now),
			|state| state.retention(now, idle_cutoff),
			|state| {
				state.expire_lock(now);
				state.last_attempt = now;
				if let Some(locked_until) = state.active_lock(now) {
					return LockoutOutcome::AlreadyLocked { locked_until };
				}
				state.failed_attempts = state.failed_attempts.saturating_add(1);
				if state.failed_attempts >= threshold {
					let locked_until = now.add(duration);
					state.locked_until = Some(locked_until);
					LockoutOutcome::Locked { locked_until }
				} else {
					LockoutOutcome::Failed { failed_attempts: state.failed_attempts }
				}
			},
		);

		match outcome {
			LockoutOutcome::Locked { locked_until } => {
				info!(email = %email, locked_until = %locked_until, "Account locked after repeated failed logins");
			}
			LockoutOutcome::Failed { failed_attempts } => {
				debug!(email = %email, failed_attempts, "Failed login recorded");
			}
			_ => {}
		}
		outcome
	}

	/// Expiry of the lock on `email`, if it is currently locked
	///
	/// An elapsed lock is cleared on the way, with the failure counter reset.
	pub fn lock_status(&self, email: &str) -> Option<Timestamp> {
		let now = self.clock.now();
		self.accounts
			.with_existing(email, |state| {
				state.expire_lock(now);
				state.active_lock(now)
			})
			.flatten()
	}

	pub fn is_locked(&self, email: &str) -> bool {
		self.lock_status(email).is_some()
	}

	/// Force the account back to the active state
	///
	/// Returns whether a record existed. Unknown accounts are already active.
	pub fn unlock(&self, email: &str) -> bool {
		self.accounts.remove(email).is_some()
	}

	/// Effective state of `email` without modifying anything
	pub fn status(&self, email: &str) -> AccountStatus {
		let now = self.clock.now();
		let state = self.accounts.peek(email, Clone::clone);
		match state {
			Some(state) => {
				let locked_until = state.active_lock(now);
				let lock_elapsed = state.locked_until.is_some() && locked_until.is_none();
				AccountStatus {
					email: email.into(),
					tracked: true,
					locked: locked_until.is_some(),
					failed_attempts: if lock_elapsed { 0 } else { state.failed_attempts },
					locked_until,
					last_attempt: Some(state.last_attempt),
				}
			}
			None => AccountStatus {
				email: email.into(),
				tracked: false,
				locked: false,
				failed_attempts: 0,
				locked_until: None,
				last_attempt: None,
			},
		}
	}

	/// Drop records that are not locked and have been idle for the configured TTL
	pub fn sweep(&self) -> usize {
		let now = self.clock.now();
		let idle_cutoff = now.sub(self.config.idle_ttl());
		self.accounts.sweep(|state| state.retention(now, idle_cutoff))
	}

	pub fn active_lockouts(&self) -> usize {
		let now = self.clock.now();
		self.accounts.count(|state| state.active_lock(now).is_some())
	}

	pub fn tracked(&self) -> usize {
		self.accounts.len()
	}
}


// vim: ts=4
