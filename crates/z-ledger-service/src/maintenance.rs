//! Periodic housekeeping: expired boost sweep and counter pruning.
//!
//! Neither job is needed for correctness; reads evaluate expiry and
//! rollover themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use z_ledger_engine::Engine;

/// Run one sweep and prune pass.
pub fn run_once(engine: &Engine) {
    match engine.sweep_expired_boosts() {
        Ok(changed) => tracing::debug!(changed, "Boost sweep finished"),
        Err(e) => tracing::warn!(error = %e, "Boost sweep failed"),
    }
    match engine.prune_counters() {
        Ok(removed) => tracing::debug!(removed, "Counter prune finished"),
        Err(e) => tracing::warn!(error = %e, "Counter prune failed"),
    }
}

/// Spawn the housekeeping loop. Returns `None` if `every` is zero.
#[must_use]
pub fn spawn(engine: Arc<Engine>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("Housekeeping disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let engine = Arc::clone(&engine);
            if let Err(e) = tokio::task::spawn_blocking(move || run_once(&engine)).await {
                tracing::error!(error = %e, "Housekeeping task panicked");
            }
        }
    }))
}
