// src/scheduler.rs
//! In-process triggers for deployments without an external scheduler.

use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::AppState;
use crate::topic::next_hour_boundary;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub fetch_interval: Duration,
}

/// Fetch every `fetch_interval`; cron at each full hour.
pub fn spawn(state: AppState, cfg: SchedulerCfg) -> (JoinHandle<()>, JoinHandle<()>) {
    let fetch_state = state.clone();
    let fetch = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.fetch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let result = fetch_state.run_fetch().await;
            tracing::info!(
                target: "scheduler",
                ok = result.ok,
                prepared = result.prepared.unwrap_or(0),
                "scheduled fetch tick"
            );
        }
    });

    let cron = tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let wait = (next_hour_boundary(now) - now)
                .to_std()
                .unwrap_or(Duration::from_secs(1));
            tokio::time::sleep(wait).await;
            let result = state.run_cron().await;
            tracing::info!(
                target: "scheduler",
                ok = result.ok,
                sent = result.processed.unwrap_or(0),
                "scheduled cron tick"
            );
        }
    });

    (fetch, cron)
}
