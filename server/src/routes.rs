//! HTTP routes of the decision service

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use warden_core::rate_limit::{
	admin, extract_client_ip, CheckResult, LoginAttemptOutcome, ProxyMode, RateLimitEngine,
	RateLimitLayer, UNKNOWN_CLIENT,
};

use crate::prelude::*;

/// Rule throttling the admin routes (falls back to `default` when a custom rule set omits it)
pub const ADMIN_RULE: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
	pub rule: String,
	pub ip: String,
	pub identity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
	#[serde(flatten)]
	pub result: CheckResult,
	/// Headers the caller should put on its own response
	pub headers: BTreeMap<&'static str, String>,
}

#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
	pub ip: String,
	pub email: String,
	pub success: bool,
}

fn require_field(name: &str, value: &str) -> ClResult<()> {
	if value.trim().is_empty() {
		return Err(Error::ValidationError(format!("'{}' must not be empty", name)));
	}
	Ok(())
}

/// POST /api/check - decide whether a request may proceed
async fn post_check(
	State(engine): State<Arc<RateLimitEngine>>,
	Json(req): Json<CheckRequest>,
) -> ClResult<Json<CheckResponse>> {
	require_field("rule", &req.rule)?;
	require_field("ip", &req.ip)?;
	let result = engine.check_rate_limit(&req.rule, &req.ip, req.identity.as_deref());
	let headers = result.headers();
	Ok(Json(CheckResponse { result, headers }))
}

/// POST /api/attempts - report the outcome of a login attempt
async fn post_attempt(
	State(engine): State<Arc<RateLimitEngine>>,
	Json(req): Json<AttemptRequest>,
) -> ClResult<Json<LoginAttemptOutcome>> {
	require_field("ip", &req.ip)?;
	require_field("email", &req.email)?;
	Ok(Json(engine.record_login_attempt(&req.ip, &req.email, req.success)))
}

async fn get_health() -> &'static str {
	"ok"
}

/// Constant-time comparison so the token cannot be guessed byte by byte
fn token_matches(given: &[u8], expected: &[u8]) -> bool {
	given.len() == expected.len()
		&& given.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[derive(Clone)]
struct AdminGuard {
	token: Arc<str>,
	engine: Arc<RateLimitEngine>,
	mode: ProxyMode,
}

/// Admin guard: requires `Authorization: Bearer <token>`
///
/// A rejected token counts against the caller's IP reputation, so guessing
/// tokens ends in an IP block.
async fn require_admin(
	State(guard): State<AdminGuard>,
	req: Request<Body>,
	next: Next,
) -> ClResult<Response> {
	let given = req
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|h| h.to_str().ok())
		.and_then(|h| h.strip_prefix("Bearer "))
		.map(str::trim);

	match given {
		Some(given) if token_matches(given.as_bytes(), guard.token.as_bytes()) => Ok(next.run(req).await),
		_ => {
			let client_ip = extract_client_ip(&req, guard.mode)
				.map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string());
			warn!(uri = %req.uri(), ip = %client_ip, "Rejected admin request with missing or invalid token");
			guard.engine.record_denial(&client_ip);
			Err(Error::PermissionDenied)
		}
	}
}

/// Build the service router
pub fn init(engine: Arc<RateLimitEngine>, admin_token: Option<&str>, mode: ProxyMode) -> Router {
	let mut router = Router::new()
		.route("/health", get(get_health))
		.route("/api/check", post(post_check))
		.route("/api/attempts", post(post_attempt))
		.with_state(engine.clone());

	if let Some(token) = admin_token {
		let guard = AdminGuard { token: Arc::from(token), engine: engine.clone(), mode };
		let admin_router = admin::router(engine.clone())
			.layer(middleware::from_fn_with_state(guard, require_admin))
			.layer(RateLimitLayer::new(engine, ADMIN_RULE, mode));
		router = router.nest("/api/admin", admin_router);
	} else {
		info!("No admin token configured, admin routes disabled");
	}

	router.layer(TraceLayer::new_for_http())
}


// vim: ts=4
