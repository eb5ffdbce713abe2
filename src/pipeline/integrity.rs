//! Referential integrity check between a parent table and a child table.
//!
//! Orphans are a finding, not an error: the check only fails when a key column
//! is absent.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::constants::ORPHAN_SAMPLE_SIZE;
use crate::error::Result;
use crate::metrics::IntegrityMetrics;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub parent: String,
    pub child: String,
    pub key: String,
    pub parent_rows: usize,
    pub child_rows: usize,
    pub orphan_count: usize,
    /// First orphan keys in order of appearance in the child table
    pub orphan_sample: Vec<String>,
    /// Child rows whose foreign key cell is empty
    pub missing_keys: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_count == 0
    }
}

/// Distinct present values of `column`, in first-appearance order.
pub(crate) fn distinct_keys(table: &Table, idx: usize) -> Vec<&str> {
    let mut seen = HashSet::new();
    table
        .column_values(idx)
        .flatten()
        .map(String::as_str)
        .filter(|key| seen.insert(*key))
        .collect()
}

pub fn check_foreign_keys(
    parent: &Table,
    parent_key: &str,
    child: &Table,
    child_key: &str,
) -> Result<IntegrityReport> {
    let parent_idx = parent.column_index(parent_key)?;
    let child_idx = child.column_index(child_key)?;

    let parent_keys: HashSet<&str> = distinct_keys(parent, parent_idx).into_iter().collect();
    let orphans: Vec<&str> = distinct_keys(child, child_idx)
        .into_iter()
        .filter(|key| !parent_keys.contains(key))
        .collect();
    let missing_keys = child.column_values(child_idx).filter(|c| c.is_none()).count();

    IntegrityMetrics::record_orphans(orphans.len());

    let report = IntegrityReport {
        parent: parent.name().to_string(),
        child: child.name().to_string(),
        key: child_key.to_string(),
        parent_rows: parent.len(),
        child_rows: child.len(),
        orphan_count: orphans.len(),
        orphan_sample: orphans
            .iter()
            .take(ORPHAN_SAMPLE_SIZE)
            .map(|k| k.to_string())
            .collect(),
        missing_keys,
    };

    if report.is_clean() {
        info!(parent = %report.parent, child = %report.child, key = %report.key, "No orphaned keys");
    } else {
        warn!(
            parent = %report.parent,
            child = %report.child,
            key = %report.key,
            sample = ?report.orphan_sample,
            "{} orphaned keys",
            report.orphan_count
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;

    fn products(ids: &[&str]) -> Table {
        let rows: Vec<Vec<&str>> = ids.iter().map(|id| vec![*id]).collect();
        let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        Table::from_rows("cleaned_products.csv", &["product_id"], &rows).unwrap()
    }

    fn reviews(ids: &[&str]) -> Table {
        let rows: Vec<Vec<&str>> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| vec![if i % 2 == 0 { "R-even" } else { "R-odd" }, *id])
            .collect();
        let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        Table::from_rows("cleaned_reviews.csv", &["review_id", "product_id"], &rows).unwrap()
    }

    #[test]
    fn reports_orphan_keys() {
        let report = check_foreign_keys(
            &products(&["A", "B"]),
            "product_id",
            &reviews(&["A", "B", "C", "C"]),
            "product_id",
        )
        .unwrap();

        assert_eq!(report.parent_rows, 2);
        assert_eq!(report.child_rows, 4);
        assert_eq!(report.orphan_count, 1);
        assert_eq!(report.orphan_sample, vec!["C".to_string()]);
        assert!(!report.is_clean());
    }

    #[test]
    fn sample_is_bounded_and_ordered() {
        let report = check_foreign_keys(
            &products(&["A"]),
            "product_id",
            &reviews(&["G", "F", "E", "D", "C", "B", "A"]),
            "product_id",
        )
        .unwrap();

        assert_eq!(report.orphan_count, 6);
        assert_eq!(report.orphan_sample, vec!["G", "F", "E", "D", "C"]);
    }

    #[test]
    fn clean_tables_and_missing_keys() {
        let report = check_foreign_keys(
            &products(&["A", "B"]),
            "product_id",
            &reviews(&["A", "", "B"]),
            "product_id",
        )
        .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.missing_keys, 1);
    }

    #[test]
    fn absent_key_column_is_schema_error() {
        let err = check_foreign_keys(&products(&["A"]), "product_id", &products(&["A"]), "user_id").unwrap_err();
        assert!(matches!(err, EtlError::Schema { .. }));
    }
}
