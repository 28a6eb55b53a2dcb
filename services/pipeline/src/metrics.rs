//! Run metrics, recorded through the `metrics` facade.
//!
//! Nothing is exported unless [`install_exporter`] ran; without a recorder
//! the macros are no-ops.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::stages::StageKind;

pub fn record_stage_duration(stage: StageKind, elapsed: Duration) {
    histogram!("pipeline_stage_duration_seconds", "stage" => stage.as_str()).record(elapsed.as_secs_f64());
}

pub fn record_stage_failure(stage: StageKind) {
    counter!("pipeline_stage_failures_total", "stage" => stage.as_str()).increment(1);
}

pub fn record_download(dataset: &str) {
    counter!("pipeline_downloaded_files_total", "dataset" => dataset.to_string()).increment(1);
}

pub fn record_tracks_scored(count: usize) {
    counter!("alongtrack_tracks_scored_total").increment(count as u64);
}

/// Serve `/metrics` on `addr` for the lifetime of the process.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus exporter on {}", addr))
}
