//! Rate Limiting Error Types
//!
//! HTTP rejection produced when a check blocks a request.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::{retry_after_secs, BlockReason, CheckResult};

/// A blocked [`CheckResult`], rendered as `429 Too Many Requests`
#[derive(Debug)]
pub struct RateLimitRejection(pub CheckResult);

impl RateLimitRejection {
	/// Wrap `result` if it blocks the request
	pub fn from_result(result: CheckResult) -> Result<CheckResult, Self> {
		if result.allowed { Ok(result) } else { Err(Self(result)) }
	}

	fn code(&self) -> &'static str {
		match self.0.reason {
			Some(BlockReason::Ip) => "E-IP-BLOCKED",
			Some(BlockReason::Account) => "E-ACCOUNT-LOCKED",
			Some(BlockReason::RateLimit) | None => "E-RATE-LIMITED",
		}
	}

	fn message(&self) -> &'static str {
		match self.0.reason {
			Some(BlockReason::Ip) => "Access temporarily blocked due to suspicious activity.",
			Some(BlockReason::Account) => "Account temporarily locked after repeated failed logins.",
			Some(BlockReason::RateLimit) | None => "Too many requests. Please slow down.",
		}
	}
}

impl std::fmt::Display for RateLimitRejection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.0.retry_after {
			Some(retry_after) => write!(f, "{}, retry after {:?}", self.message(), retry_after),
			None => write!(f, "{}", self.message()),
		}
	}
}

impl std::error::Error for RateLimitRejection {}

impl IntoResponse for RateLimitRejection {
	fn into_response(self) -> Response {
		let body = serde_json::json!({
			"error": {
				"code": self.code(),
				"message": self.message(),
				"details": {
					"reason": self.0.reason.and_then(BlockReason::tag).unwrap_or("rate_limit"),
					"retryAfter": self.0.retry_after.map(retry_after_secs),
				}
			}
		});

		let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
		insert_headers(&mut response, &self.0);
		response
	}
}

/// Copy the decision headers of `result` onto `response`
///
/// Headers the response already carries are kept, so a handler's own
/// rate limit decision wins over the middleware's.
pub(crate) fn insert_headers(response: &mut Response, result: &CheckResult) {
	for (name, value) in result.headers() {
		// Header names are lower-cased on parse
		if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(&value)) {
			response.headers_mut().entry(name).or_insert(value);
		}
	}
}


// vim: ts=4
