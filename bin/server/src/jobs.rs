//! Background jobs.

use tokio::task::JoinHandle;

use encore_identity::run_reauth_sweep;

use crate::auth::AppState;

/// Spawns the periodic reauth scheduler.
///
/// Each tick re-verifies every record whose last verification predates
/// its provider's reauth interval. Ticks are best-effort; a failed
/// record is retried on the next tick until it is invalidated.
pub fn spawn_reauth_scheduler(state: AppState) -> JoinHandle<()> {
    let tick = std::time::Duration::from_secs(state.session.reauth_tick_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            let summary = run_reauth_sweep(&state.service, &state.registry).await;
            if summary.renewed > 0 || summary.failed > 0 {
                tracing::info!(
                    renewed = summary.renewed,
                    failed = summary.failed,
                    "reauth sweep finished"
                );
            }
        }
    })
}
