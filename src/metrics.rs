use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe every series this crate emits.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("chat_messages_parsed_total", "Chat messages parsed from exports.");
        describe_counter!(
            "chat_entities_extracted_total",
            "Entities extracted from chat messages."
        );
        describe_counter!("ingest_rows_created_total", "Listing rows accepted into a batch result.");
        describe_counter!(
            "ingest_rows_skipped_total",
            "Listing rows skipped (invalid or duplicate)."
        );
        describe_counter!(
            "ingest_validation_errors_total",
            "Validation errors reported across all rows."
        );
        describe_counter!("ingest_duplicates_total", "Rows skipped as likely duplicates.");
        describe_histogram!("ingest_batch_ms", "Batch processing time in milliseconds.");
        describe_counter!("sync_runs_total", "External source sync runs.");
        describe_counter!("sync_failures_total", "External source sync runs that failed.");
        describe_gauge!("sync_last_run_ts", "Unix ts of the last sync run.");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
