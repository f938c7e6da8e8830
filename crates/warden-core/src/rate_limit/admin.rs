//! Admin Rate Limit Handlers
//!
//! Inspection and override endpoints for operators. The router does no
//! authentication of its own; mount it behind the caller's admin guard.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::api::{AccountStatus, AttemptRecord, IpStatus, RateLimiterStats};
use super::engine::RateLimitEngine;
use crate::prelude::*;

const DEFAULT_ATTEMPTS_LIMIT: usize = 50;

type EngineState = State<Arc<RateLimitEngine>>;

#[derive(Debug, Default, Deserialize)]
pub struct AttemptsQuery {
	pub limit: Option<usize>,
}

/// Admin routes, relative to the mount point
pub fn router(engine: Arc<RateLimitEngine>) -> Router {
	Router::new()
		.route("/stats", get(get_stats))
		.route("/attempts", get(list_attempts))
		.route("/accounts/{email}", get(get_account))
		.route("/accounts/{email}/unlock", post(unlock_account))
		.route("/ips/{ip}", get(get_ip))
		.route("/ips/{ip}/unblock", post(unblock_ip))
		.route("/bypass", get(list_bypass))
		.route("/bypass/{ip}", put(add_bypass).delete(remove_bypass))
		.with_state(engine)
}

/// GET /stats
async fn get_stats(State(engine): EngineState) -> Json<RateLimiterStats> {
	Json(engine.stats())
}

/// GET /attempts?limit=N - recent login attempts, newest first
async fn list_attempts(
	State(engine): EngineState,
	Query(query): Query<AttemptsQuery>,
) -> Json<Vec<AttemptRecord>> {
	Json(engine.recent_attempts(query.limit.unwrap_or(DEFAULT_ATTEMPTS_LIMIT)))
}

async fn get_account(State(engine): EngineState, Path(email): Path<String>) -> Json<AccountStatus> {
	Json(engine.account_status(&email))
}

async fn unlock_account(State(engine): EngineState, Path(email): Path<String>) -> StatusCode {
	info!(email = %email, "Admin account unlock requested");
	engine.unlock_account(&email);
	StatusCode::NO_CONTENT
}

async fn get_ip(State(engine): EngineState, Path(ip): Path<String>) -> Json<IpStatus> {
	Json(engine.ip_status(&ip))
}

async fn unblock_ip(State(engine): EngineState, Path(ip): Path<String>) -> StatusCode {
	info!(ip = %ip, "Admin IP unblock requested");
	engine.unblock_ip(&ip);
	StatusCode::NO_CONTENT
}

async fn list_bypass(State(engine): EngineState) -> Json<Vec<Box<str>>> {
	Json(engine.list_bypass())
}

async fn add_bypass(State(engine): EngineState, Path(ip): Path<String>) -> StatusCode {
	engine.add_bypass(&ip);
	StatusCode::NO_CONTENT
}

async fn remove_bypass(State(engine): EngineState, Path(ip): Path<String>) -> StatusCode {
	engine.remove_bypass(&ip);
	StatusCode::NO_CONTENT
}


// vim: ts=4
