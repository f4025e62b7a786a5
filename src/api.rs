// src/api.rs
use std::sync::Arc;

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::bootstrap::Stages;
use crate::config::Settings;
use crate::outcome::RunResult;

/// Who may trigger a stage: the platform scheduler (trusted header) or a
/// caller presenting the shared secret.
#[derive(Debug, Clone)]
pub struct TriggerAuth {
    trusted_header: String,
    secret: Option<String>,
}

impl TriggerAuth {
    pub fn new(trusted_header: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            trusted_header: trusted_header.into().to_ascii_lowercase(),
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.cron_trusted_header.clone(), settings.cron_secret.clone())
    }

    pub fn check(&self, headers: &HeaderMap, token: Option<&str>) -> Result<(), &'static str> {
        if headers.contains_key(self.trusted_header.as_str()) {
            return Ok(());
        }
        let Some(secret) = &self.secret else {
            return Err("trigger secret not configured");
        };
        match token {
            Some(t) if bool::from(t.as_bytes().ct_eq(secret.as_bytes())) => Ok(()),
            Some(_) => Err("invalid token"),
            None => Err("missing token"),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    stages: Arc<Stages>,
    auth: Arc<TriggerAuth>,
    metrics: Option<PrometheusHandle>,
    // One run per stage at a time.
    fetch_lock: Arc<Mutex<()>>,
    cron_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(stages: Stages, auth: TriggerAuth, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            stages: Arc::new(stages),
            auth: Arc::new(auth),
            metrics,
            fetch_lock: Arc::new(Mutex::new(())),
            cron_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn stages(&self) -> &Stages {
        &self.stages
    }

    /// Run the fetch stage now, waiting for any run already in progress.
    pub async fn run_fetch(&self) -> RunResult {
        match &self.stages.fetch {
            Err(e) => RunResult::config_failure(e),
            Ok(stage) => {
                let _guard = self.fetch_lock.lock().await;
                stage.run(Utc::now()).await
            }
        }
    }

    pub async fn run_cron(&self) -> RunResult {
        match &self.stages.cron {
            Err(e) => RunResult::config_failure(e),
            Ok(stage) => {
                let _guard = self.cron_lock.lock().await;
                stage.run(Utc::now()).await
            }
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/fetch", get(trigger_fetch).post(trigger_fetch))
        .route("/api/cron", get(trigger_cron).post(trigger_cron))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct TriggerQuery {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            ok: false,
            error: format!("unauthorized: {reason}"),
        }),
    )
        .into_response()
}

fn run_response(result: RunResult) -> Response {
    // Only a configuration failure leaves `error` set.
    let status = if result.error.is_some() && result.per_language.is_empty() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(result)).into_response()
}

async fn trigger_fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<TriggerQuery>,
) -> Response {
    if let Err(reason) = state.auth.check(&headers, q.token.as_deref()) {
        warn!(target: "api", stage = "fetch", reason, "trigger rejected");
        return unauthorized(reason);
    }
    info!(target: "api", stage = "fetch", "trigger accepted");
    run_response(state.run_fetch().await)
}

async fn trigger_cron(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<TriggerQuery>,
) -> Response {
    if let Err(reason) = state.auth.check(&headers, q.token.as_deref()) {
        warn!(target: "api", stage = "cron", reason, "trigger rejected");
        return unauthorized(reason);
    }
    info!(target: "api", stage = "cron", "trigger accepted");
    run_response(state.run_cron().await)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
