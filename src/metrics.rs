// src/metrics.rs
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the pipeline series.
    /// Fails if another recorder is already installed.
    pub fn init() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe();
        Ok(Self { handle })
    }
}

fn describe() {
    describe_counter!("fetch_source_errors_total", "Feed requests that failed or returned a non-success status");
    describe_counter!("fetch_items_total", "Items parsed from feeds");
    describe_histogram!("fetch_source_ms", "Feed request and parse time in milliseconds");
    describe_counter!("dedup_rejected_total", "Items rejected by the dedup gate, by reason");
    describe_counter!("candidates_analyzed_total", "Candidates sent to the analysis service");
    describe_counter!("topics_prepared_total", "Topics written by the fetch stage");
    describe_counter!("topics_published_total", "Messages delivered to channels, by language");
    describe_counter!("fallback_translations_total", "Topics derived by translation for another language");
    describe_gauge!("pipeline_last_run_ts", "Unix time of the last finished run, by stage");
}
