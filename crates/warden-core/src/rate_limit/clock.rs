//! Time source for the engine.
//!
//! Production code reads the system clock; tests drive a [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::prelude::*;

pub trait Clock: Send + Sync + std::fmt::Debug {
	fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		Timestamp::now()
	}
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
	now: AtomicI64,
}

impl ManualClock {
	pub fn new(start: Timestamp) -> Self {
		Self { now: AtomicI64::new(start.0) }
	}

	pub fn advance(&self, by: Duration) {
		let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
		self.now.fetch_add(millis, Ordering::SeqCst);
	}

	pub fn set(&self, to: Timestamp) {
		self.now.store(to.0, Ordering::SeqCst);
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new(Timestamp::from_secs(1_700_000_000))
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		Timestamp(self.now.load(Ordering::SeqCst))
	}
}


// vim: ts=4
