//! Error type shared across the Warden crates.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Invalid startup configuration
	ConfigError(String),
	/// Invalid input from a caller
	ValidationError(String),
	PermissionDenied,

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let (status, code) = match &self {
			Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "E-VALIDATION"),
			Error::PermissionDenied => (StatusCode::UNAUTHORIZED, "E-PERMISSION-DENIED"),
			Error::ConfigError(_) | Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E-INTERNAL"),
		};
		let message = match &self {
			Error::ValidationError(msg) => msg.clone(),
			Error::PermissionDenied => "Permission denied".to_string(),
			_ => {
				tracing::error!(error = %self, "Internal error");
				"Internal server error".to_string()
			}
		};
		let body = serde_json::json!({
			"error": {
				"code": code,
				"message": message,
			}
		});
		(status, Json(body)).into_response()
	}
}


// vim: ts=4
