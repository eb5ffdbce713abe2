//! Filters a child table down to rows whose foreign key exists in the external
//! store, producing the import-ready subset.
//!
//! All store queries finish before anything is written, and the output artifact
//! is only written on success, so a store failure leaves the work directory as
//! it was.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

use crate::app::ports::{KeyStore, StoreConnector};
use crate::config::StoreConfig;
use crate::constants::{
    cleaned_name, IMPORT_READY_REVIEWS_FILE, MISSING_KEY_SAMPLE_SIZE, PRODUCT_ID, REVIEWS_FILE,
    STORE_PRODUCTS_TABLE,
};
use crate::error::Result;
use crate::metrics::StoreFilterMetrics;
use crate::pipeline::integrity::distinct_keys;
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub child_path: PathBuf,
    pub output_path: PathBuf,
    pub foreign_key: String,
    pub store_table: String,
    pub store_key: String,
}

impl FilterRequest {
    /// `cleaned_reviews.csv` filtered against the store's `products` table.
    pub fn reviews_for_products(work_dir: &Path) -> Self {
        Self {
            child_path: work_dir.join(cleaned_name(REVIEWS_FILE)),
            output_path: work_dir.join(IMPORT_READY_REVIEWS_FILE),
            foreign_key: PRODUCT_ID.to_string(),
            store_table: STORE_PRODUCTS_TABLE.to_string(),
            store_key: PRODUCT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub connector: String,
    pub store_keys: usize,
    pub store_rows: u64,
    pub original_rows: usize,
    pub kept_rows: usize,
    pub excluded_rows: usize,
    pub missing_key_count: usize,
    pub missing_key_sample: Vec<String>,
    pub output: PathBuf,
}

/// Rows of `child` whose `foreign_key` is in `keys`, plus the distinct keys
/// that are not. Rows with an empty foreign key are dropped.
pub fn filter_table(child: &Table, foreign_key: &str, keys: &HashSet<String>) -> Result<(Table, Vec<String>)> {
    let idx = child.column_index(foreign_key)?;

    let missing: Vec<String> = distinct_keys(child, idx)
        .into_iter()
        .filter(|key| !keys.contains(*key))
        .map(String::from)
        .collect();

    let mut kept = child.clone();
    kept.retain_rows(|row| row[idx].as_ref().is_some_and(|key| keys.contains(key)));
    Ok((kept, missing))
}

struct StoreSnapshot {
    keys: HashSet<String>,
    rows: u64,
}

fn take_snapshot(store: &dyn KeyStore, request: &FilterRequest) -> Result<StoreSnapshot> {
    let keys = store.primary_keys(&request.store_table, &request.store_key)?;
    let rows = store.row_count(&request.store_table)?;
    Ok(StoreSnapshot { keys, rows })
}

#[instrument(skip_all, fields(connector = connector.name(), child = %request.child_path.display()))]
pub fn filter_against_store(
    connector: &dyn StoreConnector,
    config: &StoreConfig,
    request: &FilterRequest,
) -> Result<FilterReport> {
    // The connection lives only for this block and is released on every exit path
    let snapshot = {
        let store = connector.connect(config).map_err(|e| {
            StoreFilterMetrics::record_store_error();
            error!("Failed to connect to store: {}", e);
            e
        })?;
        take_snapshot(store.as_ref(), request).map_err(|e| {
            StoreFilterMetrics::record_store_error();
            error!("Store query failed: {}", e);
            e
        })?
    };
    info!("Keys found in store table {}: {}", request.store_table, snapshot.keys.len());

    let child = Table::read(&request.child_path)?;
    let (kept, missing) = filter_table(&child, &request.foreign_key, &snapshot.keys)?;
    let excluded_rows = child.len() - kept.len();

    let output_name = request
        .output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    kept.with_name(output_name).write(&request.output_path)?;

    StoreFilterMetrics::record_filtered(child.len() - excluded_rows, excluded_rows);

    let report = FilterReport {
        connector: connector.name().to_string(),
        store_keys: snapshot.keys.len(),
        store_rows: snapshot.rows,
        original_rows: child.len(),
        kept_rows: child.len() - excluded_rows,
        excluded_rows,
        missing_key_count: missing.len(),
        missing_key_sample: missing.into_iter().take(MISSING_KEY_SAMPLE_SIZE).collect(),
        output: request.output_path.clone(),
    };

    info!(
        kept = report.kept_rows,
        excluded = report.excluded_rows,
        missing_keys = report.missing_key_count,
        "Import-ready rows saved as: {}",
        report.output.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::infra::InMemoryConnector;

    fn reviews(fks: &[&str]) -> Table {
        let rows: Vec<Vec<String>> = fks
            .iter()
            .enumerate()
            .map(|(i, fk)| vec![format!("R{}", i), fk.to_string()])
            .collect();
        let rows: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        Table::from_rows("cleaned_reviews.csv", &["review_id", "product_id"], &rows).unwrap()
    }

    fn keys(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn keeps_rows_with_known_keys() {
        let child = reviews(&["A", "B", "C", "D"]);
        let (kept, missing) = filter_table(&child, "product_id", &keys(&["A", "B"])).unwrap();

        assert_eq!(kept.len(), 2);
        assert_eq!(kept.rows()[0][1].as_deref(), Some("A"));
        assert_eq!(kept.rows()[1][1].as_deref(), Some("B"));
        assert_eq!(missing, vec!["C".to_string(), "D".to_string()]);
    }

    #[test]
    fn rows_without_foreign_key_are_dropped() {
        let child = reviews(&["A", ""]);
        let (kept, missing) = filter_table(&child, "product_id", &keys(&["A"])).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(missing.is_empty());
    }

    #[test]
    fn failed_query_releases_connection_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = FilterRequest::reviews_for_products(dir.path());
        reviews(&["A", "B"]).write(&request.child_path).unwrap();

        // Connects fine but has no products table
        let connector = InMemoryConnector::new();
        let result = filter_against_store(&connector, &StoreConfig::default(), &request);

        assert!(matches!(result, Err(EtlError::Store { .. })));
        assert_eq!(connector.open_connections(), 0);
        assert!(!request.output_path.exists());
    }

    #[test]
    fn default_request_targets_cleaned_reviews() {
        let request = FilterRequest::reviews_for_products(Path::new("work"));
        assert_eq!(request.child_path, Path::new("work/cleaned_reviews.csv"));
        assert_eq!(request.output_path, Path::new("work/reviews_for_import.csv"));
        assert_eq!(request.store_table, "products");
    }
}
