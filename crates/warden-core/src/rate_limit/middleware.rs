//! Rate Limiting Middleware
//!
//! Tower middleware layer for applying a rule to Axum routes.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::engine::RateLimitEngine;
use super::error::{insert_headers, RateLimitRejection};
use super::extractors::{extract_client_ip, ProxyMode, UNKNOWN_CLIENT};

/// Rate limit middleware layer
#[derive(Clone)]
pub struct RateLimitLayer {
	engine: Arc<RateLimitEngine>,
	rule: Arc<str>,
	mode: ProxyMode,
}

impl RateLimitLayer {
	/// Create a new rate limit layer checking every request against `rule`
	pub fn new(engine: Arc<RateLimitEngine>, rule: impl Into<Arc<str>>, mode: ProxyMode) -> Self {
		Self { engine, rule: rule.into(), mode }
	}
}

impl<S> Layer<S> for RateLimitLayer {
	type Service = RateLimitService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RateLimitService {
			inner,
			engine: self.engine.clone(),
			rule: self.rule.clone(),
			mode: self.mode,
		}
	}
}

/// Rate limit middleware service
#[derive(Clone)]
pub struct RateLimitService<S> {
	inner: S,
	engine: Arc<RateLimitEngine>,
	rule: Arc<str>,
	mode: ProxyMode,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
	S: Service<Request<Body>, Response = axum::response::Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let engine = self.engine.clone();
		let rule = self.rule.clone();
		let mode = self.mode;
		let mut inner = self.inner.clone();

		Box::pin(async move {
			// Requests without a known origin share one bucket
			let client_ip = extract_client_ip(&req, mode)
				.map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string());

			// No identity is known at this layer; handlers check accounts themselves
			let result = match RateLimitRejection::from_result(engine.check_rate_limit(&rule, &client_ip, None)) {
				Ok(result) => result,
				Err(rejection) => return Ok(rejection.into_response()),
			};

			let mut response = inner.call(req).await?;
			insert_headers(&mut response, &result);
			Ok(response)
		})
	}
}


// vim: ts=4
