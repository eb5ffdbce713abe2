//! Stage-organized metrics for the sales pipeline
//!
//! Each pipeline stage owns a metrics struct in `stages`, and every metric name
//! is built with `phase_metric!` so names follow `etl_{stage}_{metric}`.
//! Until [`init_metrics`] installs the Prometheus recorder the macros are no-ops.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

use crate::error::Result;
use crate::table::write_atomically;

/// When set to a file path, the CLI installs the recorder and writes a
/// Prometheus text snapshot there once the command finishes.
pub const METRICS_FILE_ENV: &str = "SALES_ETL_METRICS_FILE";

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Build a metric name with the crate-wide naming convention
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

pub mod core;
pub mod stages;

pub use self::core::{time_operation, TimingGuard};
pub use stages::{IntegrityMetrics, NumericMetrics, SanitizeMetrics, SplitMetrics, StoreFilterMetrics};

/// Trait for stage-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this stage
    fn register_metrics();

    /// Get the stage name used in metric names
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this stage
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Install the Prometheus recorder once per process and register every
/// stage's metrics with it. Returns `None` if another recorder is installed.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            register_all_metrics();
            info!("Prometheus recorder installed, all pipeline metrics registered");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
    HANDLE.get()
}

/// Write the current Prometheus text rendering to `path`.
/// Does nothing when no recorder was installed.
pub fn write_snapshot(path: &Path) -> Result<()> {
    let Some(handle) = HANDLE.get() else {
        warn!("Metrics recorder not installed, no snapshot written");
        return Ok(());
    };
    let rendered = handle.render();
    write_atomically(path, |tmp| Ok(std::fs::write(tmp, &rendered)?))?;
    info!("Metrics snapshot written to {}", path.display());
    Ok(())
}

/// Register every stage's metrics with the installed recorder
pub fn register_all_metrics() {
    SplitMetrics::register_metrics();
    SanitizeMetrics::register_metrics();
    NumericMetrics::register_metrics();
    IntegrityMetrics::register_metrics();
    StoreFilterMetrics::register_metrics();
}

/// All documented metrics across stages
pub fn all_metrics_documentation() -> Vec<MetricDoc> {
    let mut docs = SplitMetrics::metrics_documentation();
    docs.extend(SanitizeMetrics::metrics_documentation());
    docs.extend(NumericMetrics::metrics_documentation());
    docs.extend(IntegrityMetrics::metrics_documentation());
    docs.extend(StoreFilterMetrics::metrics_documentation());
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        register_all_metrics();
        let docs = all_metrics_documentation();
        let names: HashSet<_> = docs.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), docs.len());
        for doc in &docs {
            assert!(doc.name.starts_with("etl_"), "bad metric name {}", doc.name);
            if doc.metric_type == MetricType::Counter {
                assert!(doc.name.ends_with("_total"));
            }
        }
    }

    #[test]
    fn installed_recorder_renders_stage_metrics() {
        let handle = init_metrics().expect("recorder installed");
        SplitMetrics::record_split(3, 1);

        let rendered = handle.render();
        assert!(rendered.contains("etl_split_rows_read_total"));
        assert!(rendered.contains("etl_store_filter_store_errors_total"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        write_snapshot(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("etl_split_duplicates_dropped_total"));
    }
}
