use warden_server::settings::ServerConfig;

#[tokio::main]
async fn main() -> std::process::ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.init();

	let result = match ServerConfig::load() {
		Ok(config) => warden_server::run(config).await,
		Err(e) => Err(e),
	};

	match result {
		Ok(()) => std::process::ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("FATAL: {}", e);
			std::process::ExitCode::FAILURE
		}
	}
}

// vim: ts=4
