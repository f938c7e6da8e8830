//! Client Key Extractors
//!
//! Normalisation of the client IP and account identity used as tracker keys,
//! and extraction of the client IP from an HTTP request.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use serde::{Deserialize, Serialize};

/// Key used when a request's client IP cannot be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Where the client IP comes from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
	/// Clients connect directly; use the peer address
	#[default]
	Direct,
	/// Behind a trusted reverse proxy; honour forwarding headers first
	TrustedProxy,
}

/// Canonical form of an IP string
///
/// IPv4-mapped IPv6 addresses collapse to their IPv4 form. Strings that do not
/// parse as an IP are used trimmed, so odd inputs still get throttled.
pub fn normalize_ip(ip: &str) -> String {
	let trimmed = ip.trim();
	match trimmed.parse::<IpAddr>() {
		Ok(addr) => addr.to_canonical().to_string(),
		Err(_) => trimmed.to_string(),
	}
}

/// Canonical form of an account identity (trimmed, lower-cased)
pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

/// Extract client IP from request based on ProxyMode
pub fn extract_client_ip<B>(req: &Request<B>, mode: ProxyMode) -> Option<IpAddr> {
	let peer = || req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip());
	let ip = match mode {
		ProxyMode::Direct => peer(),
		ProxyMode::TrustedProxy => extract_from_xff(req)
			.or_else(|| extract_from_x_real_ip(req))
			.or_else(|| extract_from_forwarded(req))
			.or_else(peer),
	};
	ip.map(|ip| ip.to_canonical())
}

/// Extract IP from X-Forwarded-For header
fn extract_from_xff<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| {
			// "client, proxy1, proxy2": the leftmost entry is the original client
			s.split(',').next().map(str::trim).and_then(|ip| ip.parse().ok())
		})
}

/// Extract IP from X-Real-IP header
fn extract_from_x_real_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-real-ip")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.trim().parse().ok())
}

/// Extract IP from Forwarded header (RFC 7239)
fn extract_from_forwarded<B>(req: &Request<B>) -> Option<IpAddr> {
	let header = req.headers().get("forwarded").and_then(|h| h.to_str().ok())?;
	// "for=192.0.2.60;proto=http;by=203.0.113.43" or "for=\"[2001:db8::1]:4711\""
	let first_hop = header.split(',').next()?;
	let value = first_hop.split(';').find_map(|part| {
		let (name, value) = part.trim().split_once('=')?;
		name.eq_ignore_ascii_case("for").then_some(value)
	})?;
	let value = value.trim_matches('"');
	if let Some(rest) = value.strip_prefix('[') {
		return rest.split(']').next().and_then(|ip| ip.parse().ok());
	}
	value.parse().ok().or_else(|| {
		// IPv4 with port
		value.rsplit_once(':').and_then(|(ip, _)| ip.parse().ok())
	})
}


// vim: ts=4
