//! Periodic sweep of expired rate limit state

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::engine::RateLimitEngine;
use crate::prelude::*;

/// Run [`RateLimitEngine::sweep`] every `janitor.interval_secs` until `shutdown` is cancelled
///
/// The first sweep happens one interval after spawning.
pub fn spawn_janitor(engine: Arc<RateLimitEngine>, shutdown: CancellationToken) -> JoinHandle<()> {
	let period = engine.config().janitor.interval();
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		// The first tick completes immediately
		interval.tick().await;

		loop {
			tokio::select! {
				() = shutdown.cancelled() => {
					debug!("Rate limit janitor stopped");
					break;
				}
				_ = interval.tick() => {
					let report = engine.sweep();
					if report.total() > 0 {
						info!(
							windows = report.windows,
							accounts = report.accounts,
							ips = report.ips,
							attempts = report.attempts,
							"Rate limit janitor evicted expired records"
						);
					} else {
						debug!("Rate limit janitor found nothing to evict");
					}
				}
			}
		}
	})
}


// vim: ts=4
