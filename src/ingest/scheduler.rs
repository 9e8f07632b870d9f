// src/ingest/scheduler.rs
use crate::ingest::sync::{execute_scheduled_sync, SyncContext};
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug)]
pub struct SyncSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn the periodic sync loop. Every tick runs all due sources; the first
/// tick fires immediately.
pub fn spawn_sync_scheduler(cfg: SyncSchedulerCfg, ctx: SyncContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = execute_scheduled_sync(&ctx).await;

            if report.total_sources > 0 {
                tracing::info!(
                    target: "sync",
                    sources = report.total_sources,
                    ok = report.successful_syncs,
                    failed = report.failed_syncs,
                    "scheduled sync tick"
                );
            } else {
                tracing::debug!(target: "sync", "scheduled sync tick, nothing due");
            }
        }
    })
}
