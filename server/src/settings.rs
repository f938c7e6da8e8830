//! Server settings
//!
//! Read from an optional YAML file named by `WARDEN_CONFIG`, then overridden
//! from the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_core::rate_limit::{ProxyMode, RateLimitConfig};

use crate::prelude::*;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	/// Address the HTTP server binds to
	pub listen: String,
	/// Bearer token for the admin routes; admin routes are disabled when unset
	pub admin_token: Option<String>,
	/// How client IPs are extracted from inbound requests
	pub proxy_mode: ProxyMode,
	pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: DEFAULT_LISTEN.to_string(),
			admin_token: None,
			proxy_mode: ProxyMode::Direct,
			rate_limit: RateLimitConfig::default(),
		}
	}
}

impl ServerConfig {
	/// Parse a YAML document
	pub fn from_yaml(yaml: &str) -> ClResult<Self> {
		serde_yaml::from_str(yaml).map_err(|e| Error::ConfigError(format!("invalid YAML: {}", e)))
	}

	pub fn from_file(path: &Path) -> ClResult<Self> {
		let yaml = std::fs::read_to_string(path)?;
		Self::from_yaml(&yaml)
	}

	/// Load the configuration file (if any) and apply environment overrides
	pub fn load() -> ClResult<Self> {
		let mut config = match std::env::var("WARDEN_CONFIG") {
			Ok(path) => {
				info!(path = %path, "Loading configuration");
				Self::from_file(Path::new(&path))?
			}
			Err(_) => Self::default(),
		};
		config.apply_overrides(|name| std::env::var(name).ok())?;
		config.rate_limit.validate()?;
		Ok(config)
	}

	/// Apply `WARDEN_*` overrides read through `var`
	pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> ClResult<()> {
		if let Some(listen) = var("WARDEN_LISTEN") {
			self.listen = listen;
		}
		if let Some(token) = var("WARDEN_ADMIN_TOKEN") {
			self.admin_token = (!token.is_empty()).then_some(token);
		}
		if let Some(trust) = var("WARDEN_TRUST_PROXY") {
			self.proxy_mode = match trust.trim().to_ascii_lowercase().as_str() {
				"1" | "true" | "yes" => ProxyMode::TrustedProxy,
				"0" | "false" | "no" | "" => ProxyMode::Direct,
				other => {
					return Err(Error::ConfigError(format!(
						"WARDEN_TRUST_PROXY: expected a boolean, got '{}'",
						other
					)));
				}
			};
		}
		Ok(())
	}
}


// vim: ts=4
