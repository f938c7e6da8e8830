//! Warden decision service
//!
//! Exposes the brute-force protection engine over HTTP so that an external
//! web tier can ask "may this request proceed?" and report login outcomes.

#![forbid(unsafe_code)]

pub mod prelude;
pub mod routes;
pub mod settings;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use warden_core::rate_limit::{spawn_janitor, RateLimitEngine};

use crate::prelude::*;
use crate::settings::ServerConfig;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the service until Ctrl-C
pub async fn run(config: ServerConfig) -> ClResult<()> {
	info!("Warden V{}", VERSION);

	let engine = Arc::new(RateLimitEngine::new(config.rate_limit.clone())?);
	let shutdown = CancellationToken::new();
	let janitor = spawn_janitor(engine.clone(), shutdown.clone());

	let router = routes::init(engine, config.admin_token.as_deref(), config.proxy_mode);
	let listener = tokio::net::TcpListener::bind(&config.listen).await?;
	info!(listen = %config.listen, proxy_mode = ?config.proxy_mode, "Listening on HTTP");

	let signal = shutdown.clone();
	axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
		.with_graceful_shutdown(async move {
			match tokio::signal::ctrl_c().await {
				Ok(()) => info!("Shutdown signal received"),
				Err(e) => error!("Failed to listen for shutdown signal: {}", e),
			}
			signal.cancel();
		})
		.await?;

	shutdown.cancel();
	if let Err(e) = janitor.await {
		warn!("Janitor task ended abnormally: {}", e);
	}
	info!("Server stopped");
	Ok(())
}

// vim: ts=4
