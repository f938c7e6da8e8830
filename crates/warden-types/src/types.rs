//! Common types used throughout Warden.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

// Timestamp //
//***********//
/// Milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(i64::try_from(res.as_millis()).unwrap_or(i64::MAX))
	}

	pub fn from_secs(secs: i64) -> Timestamp {
		Timestamp(secs.saturating_mul(1000))
	}

	pub fn add(self, duration: Duration) -> Timestamp {
		Timestamp(self.0.saturating_add(duration_millis(duration)))
	}

	pub fn sub(self, duration: Duration) -> Timestamp {
		Timestamp(self.0.saturating_sub(duration_millis(duration)))
	}

	/// Time elapsed from `earlier` to `self`, zero if `earlier` is later
	pub fn saturating_since(self, earlier: Timestamp) -> Duration {
		u64::try_from(self.0.saturating_sub(earlier.0)).map_or(Duration::ZERO, Duration::from_millis)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

fn duration_millis(duration: Duration) -> i64 {
	i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_arithmetic() {
		let ts = Timestamp::from_secs(1_000);
		assert_eq!(ts.0, 1_000_000);
		assert_eq!(ts.add(Duration::from_secs(60)), Timestamp::from_secs(1_060));
		assert_eq!(ts.sub(Duration::from_millis(1)).0, 999_999);
	}

	#[test]
	fn test_saturating_since() {
		let a = Timestamp(5_000);
		let b = Timestamp(7_500);
		assert_eq!(b.saturating_since(a), Duration::from_millis(2_500));
		assert_eq!(a.saturating_since(b), Duration::ZERO);
	}

	#[test]
	fn test_serializes_as_number() {
		let json = serde_json::to_string(&Timestamp(42)).unwrap();
		assert_eq!(json, "42");
	}
}

// vim: ts=4
