//! Decision service HTTP tests

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use warden_core::rate_limit::{ProxyMode, RateLimitConfig, RateLimitEngine};
use warden_server::routes;

const TOKEN: &str = "test-admin-token";

fn create_app(admin_token: Option<&str>) -> (Router, Arc<RateLimitEngine>) {
	let engine = Arc::new(RateLimitEngine::new(RateLimitConfig::default()).expect("valid config"));
	(routes::init(engine.clone(), admin_token, ProxyMode::Direct), engine)
}

async fn send(
	app: &Router,
	method: &str,
	uri: &str,
	token: Option<&str>,
	body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
	let mut builder = Request::builder().method(method).uri(uri);
	if let Some(token) = token {
		builder = builder.header("authorization", format!("Bearer {token}"));
	}
	let req = match body {
		Some(body) => builder
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.expect("request"),
		None => builder.body(Body::empty()).expect("request"),
	};
	let response = app.clone().oneshot(req).await.expect("response");
	let status = response.status();
	let bytes = response.into_body().collect().await.expect("body").to_bytes();
	let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
	(status, json)
}

#[tokio::test]
async fn test_health() {
	let (app, _engine) = create_app(None);
	let (status, _) = send(&app, "GET", "/health", None, None).await;
	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_check_decisions() {
	let (app, _engine) = create_app(None);
	let body = serde_json::json!({ "rule": "login", "ip": "203.0.113.5" });

	for remaining in (0..5).rev() {
		let (status, json) = send(&app, "POST", "/api/check", None, Some(body.clone())).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(json["allowed"], true);
		assert_eq!(json["headers"]["X-RateLimit-Remaining"], remaining.to_string());
	}

	let (_, json) = send(&app, "POST", "/api/check", None, Some(body)).await;
	assert_eq!(json["allowed"], false);
	assert_eq!(json["reason"], "rate_limit");
	assert_eq!(json["retryAfter"], 300);
	assert_eq!(json["headers"]["Retry-After"], "300");
}

#[tokio::test]
async fn test_attempts_lock_account() {
	let (app, engine) = create_app(None);
	let attempt = serde_json::json!({ "ip": "203.0.113.5", "email": "a@b.com", "success": false });

	for _ in 0..4 {
		let (status, json) = send(&app, "POST", "/api/attempts", None, Some(attempt.clone())).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(json["account"]["state"], "failed");
	}
	let (_, json) = send(&app, "POST", "/api/attempts", None, Some(attempt)).await;
	assert_eq!(json["account"]["state"], "locked");
	assert!(engine.is_locked("a@b.com"));

	let check = serde_json::json!({ "rule": "login", "ip": "198.51.100.1", "identity": "a@b.com" });
	let (_, json) = send(&app, "POST", "/api/check", None, Some(check)).await;
	assert_eq!(json["allowed"], false);
	assert_eq!(json["reason"], "account");
	assert_eq!(json["headers"]["X-RateLimit-Blocked"], "account");
}

#[tokio::test]
async fn test_invalid_request() {
	let (app, _engine) = create_app(None);
	let body = serde_json::json!({ "rule": "login", "ip": "  " });
	let (status, json) = send(&app, "POST", "/api/check", None, Some(body)).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error"]["code"], "E-VALIDATION");
}

#[tokio::test]
async fn test_admin_disabled_without_token() {
	let (app, _engine) = create_app(None);
	let (status, _) = send(&app, "GET", "/api/admin/stats", Some(TOKEN), None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_requires_token() {
	let (app, engine) = create_app(Some(TOKEN));

	let (status, json) = send(&app, "GET", "/api/admin/stats", None, None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(json["error"]["code"], "E-PERMISSION-DENIED");
	let (status, _) = send(&app, "GET", "/api/admin/stats", Some("wrong"), None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, json) = send(&app, "GET", "/api/admin/stats", Some(TOKEN), None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["totalBlockedRequests"], 0);

	let (status, _) = send(&app, "PUT", "/api/admin/bypass/10.0.0.7", Some(TOKEN), None).await;
	assert_eq!(status, StatusCode::NO_CONTENT);
	assert_eq!(engine.list_bypass(), vec![Box::from("10.0.0.7")]);
}

#[tokio::test]
async fn test_guessing_admin_token_blocks_ip() {
	let (app, engine) = create_app(Some(TOKEN));

	// Each guess scores as one denial plus the allowed admin window hit
	for i in 0..10 {
		let (status, _) = send(&app, "GET", "/api/admin/stats", Some(&format!("guess-{i}")), None).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
	}
	assert!(engine.ip_status("unknown").blocked);

	let req = Request::builder()
		.uri("/api/admin/stats")
		.header("authorization", format!("Bearer {TOKEN}"))
		.body(Body::empty())
		.expect("request");
	let response = app.clone().oneshot(req).await.expect("response");
	assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(response.headers()["x-ratelimit-blocked"], "ip");
	assert_eq!(response.headers()["retry-after"], "3600");

	// The admin rule has its own window, apart from the default bucket
	let status = engine.ip_status("unknown");
	assert_eq!(status.windows.len(), 1);
	assert_eq!(&*status.windows[0].rule, "admin");
	assert_eq!(status.windows[0].used, 10);
	assert_eq!(engine.stats().total_ip_blocks, 1);
}

// vim: ts=4
