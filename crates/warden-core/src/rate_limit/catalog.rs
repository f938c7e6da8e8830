//! Rule Catalog
//!
//! Static table of sliding-window rules, resolved by name with a fallback to
//! the `default` rule so an unknown name is still throttled.

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{RateLimitRule, DEFAULT_RULE};
use crate::prelude::*;

#[derive(Debug)]
pub struct RuleCatalog {
	rules: HashMap<Box<str>, Arc<RateLimitRule>>,
	default: Arc<RateLimitRule>,
}

impl RuleCatalog {
	/// Build the catalog from validated rules
	///
	/// Installs the built-in default rule when none named `default` is given.
	pub fn new(rules: &[RateLimitRule]) -> Self {
		let mut map: HashMap<Box<str>, Arc<RateLimitRule>> = rules
			.iter()
			.map(|rule| (Box::from(rule.name.as_str()), Arc::new(rule.clone())))
			.collect();

		let default = if let Some(rule) = map.get(DEFAULT_RULE) {
			rule.clone()
		} else {
			warn!("No '{}' rate limit rule configured, using built-in fallback", DEFAULT_RULE);
			let rule = Arc::new(RateLimitRule::new(DEFAULT_RULE, 60, 60, 60));
			map.insert(DEFAULT_RULE.into(), rule.clone());
			rule
		};

		Self { rules: map, default }
	}

	/// Look up a rule, falling back to the default rule for unknown names
	pub fn resolve(&self, name: &str) -> &Arc<RateLimitRule> {
		match self.rules.get(name) {
			Some(rule) => rule,
			None => {
				debug!(rule = %name, "Unknown rate limit rule, using default");
				&self.default
			}
		}
	}

	/// All rules, sorted by name
	pub fn rules(&self) -> Vec<Arc<RateLimitRule>> {
		let mut rules: Vec<_> = self.rules.values().cloned().collect();
		rules.sort_by(|a, b| a.name.cmp(&b.name));
		rules
	}
}


// vim: ts=4
