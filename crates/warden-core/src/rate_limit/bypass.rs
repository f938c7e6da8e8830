//! Admin Bypass Registry
//!
//! IPs on this list skip every check. Entries never expire; they stay until
//! an administrator removes them.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::prelude::*;

#[derive(Debug, Default)]
pub struct AdminBypassRegistry {
	ips: RwLock<HashSet<Box<str>>>,
}

impl AdminBypassRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns whether the IP was newly added
	pub fn add(&self, ip: &str) -> bool {
		let added = self.ips.write().insert(ip.into());
		if added {
			info!(ip = %ip, "IP added to rate limit bypass list");
		}
		added
	}

	/// Returns whether the IP was on the list
	pub fn remove(&self, ip: &str) -> bool {
		let removed = self.ips.write().remove(ip);
		if removed {
			info!(ip = %ip, "IP removed from rate limit bypass list");
		}
		removed
	}

	pub fn is_bypassed(&self, ip: &str) -> bool {
		self.ips.read().contains(ip)
	}

	/// All bypassed IPs, sorted
	pub fn list(&self) -> Vec<Box<str>> {
		let mut ips: Vec<_> = self.ips.read().iter().cloned().collect();
		ips.sort();
		ips
	}

	pub fn len(&self) -> usize {
		self.ips.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.ips.read().is_empty()
	}
}


// vim: ts=4
