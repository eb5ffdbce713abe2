//! Per-stage metric collections

use crate::metrics::{MetricDoc, MetricType, PhaseMetrics};

pub struct SplitMetrics;

impl SplitMetrics {
    pub fn record_split(rows_in: usize, duplicates_dropped: usize) {
        ::metrics::counter!(phase_metric!(counter, "split", "rows_read")).increment(rows_in as u64);
        ::metrics::counter!(phase_metric!(counter, "split", "duplicates_dropped"))
            .increment(duplicates_dropped as u64);
    }
}

impl PhaseMetrics for SplitMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "split", "rows_read"));
        let _ = ::metrics::counter!(phase_metric!(counter, "split", "duplicates_dropped"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "split", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "split"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "split", "rows_read"),
                metric_type: MetricType::Counter,
                help: "Rows read from the raw export",
            },
            MetricDoc {
                name: phase_metric!(counter, "split", "duplicates_dropped"),
                metric_type: MetricType::Counter,
                help: "Duplicate product and user rows removed",
            },
            MetricDoc {
                name: phase_metric!(histogram, "split", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of the split stage",
            },
        ]
    }
}

pub struct SanitizeMetrics;

impl SanitizeMetrics {
    pub fn record_cells(seen: usize, changed: usize) {
        ::metrics::counter!(phase_metric!(counter, "sanitize", "cells_seen")).increment(seen as u64);
        ::metrics::counter!(phase_metric!(counter, "sanitize", "cells_changed")).increment(changed as u64);
    }
}

impl PhaseMetrics for SanitizeMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "sanitize", "cells_seen"));
        let _ = ::metrics::counter!(phase_metric!(counter, "sanitize", "cells_changed"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "sanitize", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "sanitize"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "sanitize", "cells_seen"),
                metric_type: MetricType::Counter,
                help: "Text cells inspected by the sanitizer",
            },
            MetricDoc {
                name: phase_metric!(counter, "sanitize", "cells_changed"),
                metric_type: MetricType::Counter,
                help: "Text cells rewritten by the sanitizer",
            },
            MetricDoc {
                name: phase_metric!(histogram, "sanitize", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of one sanitize pass over a table",
            },
        ]
    }
}

pub struct NumericMetrics;

impl NumericMetrics {
    pub fn record_parsed(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "numeric", "cells_parsed")).increment(count as u64);
    }

    pub fn record_parse_failure() {
        ::metrics::counter!(phase_metric!(counter, "numeric", "parse_failures")).increment(1);
    }
}

impl PhaseMetrics for NumericMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "numeric", "cells_parsed"));
        let _ = ::metrics::counter!(phase_metric!(counter, "numeric", "parse_failures"));
    }

    fn phase_name() -> &'static str {
        "numeric"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "numeric", "cells_parsed"),
                metric_type: MetricType::Counter,
                help: "Price, count and percentage cells parsed",
            },
            MetricDoc {
                name: phase_metric!(counter, "numeric", "parse_failures"),
                metric_type: MetricType::Counter,
                help: "Cells that could not be parsed and became missing",
            },
        ]
    }
}

pub struct IntegrityMetrics;

impl IntegrityMetrics {
    pub fn record_orphans(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "integrity", "orphan_keys")).increment(count as u64);
    }
}

impl PhaseMetrics for IntegrityMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "integrity", "orphan_keys"));
    }

    fn phase_name() -> &'static str {
        "integrity"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![MetricDoc {
            name: phase_metric!(counter, "integrity", "orphan_keys"),
            metric_type: MetricType::Counter,
            help: "Distinct foreign keys with no matching parent row",
        }]
    }
}

pub struct StoreFilterMetrics;

impl StoreFilterMetrics {
    pub fn record_filtered(kept: usize, excluded: usize) {
        ::metrics::counter!(phase_metric!(counter, "store_filter", "rows_kept")).increment(kept as u64);
        ::metrics::counter!(phase_metric!(counter, "store_filter", "rows_excluded")).increment(excluded as u64);
    }

    pub fn record_store_error() {
        ::metrics::counter!(phase_metric!(counter, "store_filter", "store_errors")).increment(1);
    }
}

impl PhaseMetrics for StoreFilterMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "store_filter", "rows_kept"));
        let _ = ::metrics::counter!(phase_metric!(counter, "store_filter", "rows_excluded"));
        let _ = ::metrics::counter!(phase_metric!(counter, "store_filter", "store_errors"));
    }

    fn phase_name() -> &'static str {
        "store_filter"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "store_filter", "rows_kept"),
                metric_type: MetricType::Counter,
                help: "Relation rows kept for import",
            },
            MetricDoc {
                name: phase_metric!(counter, "store_filter", "rows_excluded"),
                metric_type: MetricType::Counter,
                help: "Relation rows excluded because the store lacks the referenced key",
            },
            MetricDoc {
                name: phase_metric!(counter, "store_filter", "store_errors"),
                metric_type: MetricType::Counter,
                help: "Failures connecting to or querying the external store",
            },
        ]
    }
}
