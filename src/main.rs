//! Newsdesk service: binary entrypoint.
//! Boots the Axum HTTP server with the fetch/cron triggers and, optionally,
//! the in-process scheduler.

use newsdesk::metrics::Metrics;
use newsdesk::scheduler::{self, SchedulerCfg};
use newsdesk::{create_router, AppState, Settings, Stages, TriggerAuth};
use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env().map_err(|e| shuttle_runtime::Error::Custom(e.into()))?;
    newsdesk::init_tracing(settings.log_json);

    let metrics = match Metrics::init() {
        Ok(m) => Some(m.handle),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed");
            None
        }
    };

    let stages = Stages::from_settings(&settings);
    let state = AppState::new(stages, TriggerAuth::from_settings(&settings), metrics);

    if settings.scheduler_enabled {
        info!(interval_secs = settings.fetch_interval.as_secs(), "in-process scheduler enabled");
        let _ = scheduler::spawn(
            state.clone(),
            SchedulerCfg {
                fetch_interval: settings.fetch_interval,
            },
        );
    }

    Ok(create_router(state).into())
}
