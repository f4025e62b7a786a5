// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod outcome;
pub mod relevance;
pub mod scheduler;
pub mod topic;

// Fetch stage: feeds -> gate -> scoring -> analysis -> topic
pub mod analyze;
pub mod ingest;
pub mod pipeline;
pub mod store;

// Cron stage: topic -> channel
pub mod notify;
pub mod publish;

pub use crate::api::{create_router, AppState, TriggerAuth};
pub use crate::bootstrap::Stages;
pub use crate::config::Settings;
pub use crate::outcome::RunResult;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// A no-op when a subscriber is already installed (e.g. by the host runtime).
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsdesk=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
