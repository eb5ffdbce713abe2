//! The fixed stage sequence: split → sanitize → normalize → integrity → store filter.
//!
//! Each stage reads and writes whole artifacts in the work directory. Stages up
//! to the integrity check are fatal on error; the store filter only records its
//! failure so the artifacts already written stay usable.

pub mod integrity;
pub mod numeric;
pub mod sanitize;
pub mod split;
pub mod store_filter;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

use crate::app::ports::StoreConnector;
use crate::config::Config;
use crate::constants::{
    cleaned_name, PIPELINE_REPORT_FILE, PRODUCTS_FILE, PRODUCT_ID, REVIEWS_FILE, USERS_FILE, USER_ID,
};
use crate::error::Result;
use crate::table::{write_atomically, Table};

use integrity::{check_foreign_keys, IntegrityReport};
use numeric::{default_rules, normalize_file, NormalizeReport};
use sanitize::{sanitize_file, SanitizeReport};
use split::{split_file, SplitReport};
use store_filter::{filter_against_store, FilterReport, FilterRequest};

/// Outcome of the store-dependent stage
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StoreStage {
    Completed(FilterReport),
    Failed(String),
    Skipped,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub split: SplitReport,
    pub sanitized: Vec<SanitizeReport>,
    pub numeric: NormalizeReport,
    pub integrity: Vec<IntegrityReport>,
    pub store_filter: StoreStage,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_store: bool,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    connector: &'a dyn StoreConnector,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, connector: &'a dyn StoreConnector) -> Self {
        Self { config, connector }
    }

    fn work_path(&self, file_name: &str) -> PathBuf {
        self.config.artifact(file_name)
    }

    pub fn split(&self) -> Result<SplitReport> {
        println!("Step 1: Splitting data into normalized tables...");
        fs::create_dir_all(&self.config.paths.work_dir)?;
        let report = split_file(&self.config.paths.raw_input, &self.config.paths.work_dir)?;
        println!(
            "   {} raw rows -> {} products, {} users, {} reviews",
            report.raw_rows, report.products, report.users, report.reviews
        );
        Ok(report)
    }

    pub fn sanitize_all(&self) -> Result<Vec<SanitizeReport>> {
        let map = self.config.replacement_map()?;
        let mut reports = Vec::new();
        for name in [PRODUCTS_FILE, USERS_FILE, REVIEWS_FILE] {
            println!("Step 2: Cleaning special characters from {}...", name);
            reports.push(sanitize_file(&self.work_path(name), &map)?);
            println!("   Cleaned CSV saved as: {}", cleaned_name(name));
        }
        Ok(reports)
    }

    pub fn normalize(&self) -> Result<NormalizeReport> {
        let path = self.work_path(&cleaned_name(PRODUCTS_FILE));
        println!("Step 3: Cleaning numeric columns in {}...", path.display());
        let report = normalize_file(&path, &default_rules(), self.config.currency.rate)?;
        for diagnostic in &report.diagnostics {
            println!("   {} (column {}, row {})", diagnostic.reason, diagnostic.column, diagnostic.row);
        }
        println!("   Columns cleaned and saved to: {}", path.display());
        Ok(report)
    }

    pub fn check_integrity(&self) -> Result<Vec<IntegrityReport>> {
        println!("\nStep 4: Checking data integrity...");
        let products = Table::read(&self.work_path(&cleaned_name(PRODUCTS_FILE)))?;
        let users = Table::read(&self.work_path(&cleaned_name(USERS_FILE)))?;
        let reviews = Table::read(&self.work_path(&cleaned_name(REVIEWS_FILE)))?;

        println!("   Products: {} rows", products.len());
        println!("   Users: {} rows", users.len());
        println!("   Reviews: {} rows", reviews.len());

        let reports = vec![
            check_foreign_keys(&products, PRODUCT_ID, &reviews, PRODUCT_ID)?,
            check_foreign_keys(&users, USER_ID, &reviews, USER_ID)?,
        ];
        for report in &reports {
            println!(
                "   Orphaned {} keys in {} (no match in {}): {}",
                report.key, report.child, report.parent, report.orphan_count
            );
            if !report.orphan_sample.is_empty() {
                println!("   Sample orphaned IDs: {:?}", report.orphan_sample);
            }
        }
        Ok(reports)
    }

    /// Never fails: a store problem is returned as [`StoreStage::Failed`].
    pub fn filter_for_import(&self) -> StoreStage {
        println!("\nStep 5: Creating store-compatible reviews file...");
        let request = FilterRequest::reviews_for_products(&self.config.paths.work_dir);
        match filter_against_store(self.connector, &self.config.store, &request) {
            Ok(report) => {
                println!("   Products found in store: {}", report.store_keys);
                println!("   Original reviews: {}", report.original_rows);
                println!("   Valid reviews (matching store products): {}", report.kept_rows);
                println!("   Reviews to be excluded: {}", report.excluded_rows);
                if report.missing_key_count > 0 {
                    println!("   Product IDs in reviews but not in store: {}", report.missing_key_count);
                    println!("   Sample missing IDs: {:?}", report.missing_key_sample);
                }
                println!("   Store-compatible reviews saved as: {}", report.output.display());
                println!("   Total products in store: {}", report.store_rows);
                StoreStage::Completed(report)
            }
            Err(e) => {
                println!("   Failed to build import file: {}", e);
                StoreStage::Failed(e.to_string())
            }
        }
    }

    /// Run every stage in order and write `pipeline_report.json`.
    #[instrument(skip_all, fields(work_dir = %self.config.paths.work_dir.display()))]
    pub fn run(&self, options: RunOptions) -> Result<PipelineReport> {
        println!("=== SALES DATA PROCESSING PIPELINE ===\n");
        let started_at = Utc::now();

        let split = self.split()?;
        let sanitized = self.sanitize_all()?;
        let numeric = self.normalize()?;
        let integrity = self.check_integrity()?;

        let store_filter = if options.skip_store {
            info!("Store stage skipped");
            StoreStage::Skipped
        } else {
            println!("\n{}", "=".repeat(50));
            println!("Before the store stage, {} and {} must already be", cleaned_name(PRODUCTS_FILE), cleaned_name(USERS_FILE));
            println!("imported into the store.");
            println!("{}", "=".repeat(50));
            self.filter_for_import()
        };
        if let StoreStage::Failed(reason) = &store_filter {
            warn!("Store stage failed, earlier artifacts are kept: {}", reason);
        }

        let report = PipelineReport {
            started_at,
            finished_at: Utc::now(),
            split,
            sanitized,
            numeric,
            integrity,
            store_filter,
        };
        self.write_report(&report)?;
        Ok(report)
    }

    fn write_report(&self, report: &PipelineReport) -> Result<()> {
        let path = self.work_path(PIPELINE_REPORT_FILE);
        let json = serde_json::to_string_pretty(report)?;
        write_atomically(&path, |tmp| Ok(fs::write(tmp, &json)?)).map_err(|e| {
            error!("Failed to write pipeline report {}: {}", path.display(), e);
            e
        })?;
        info!("Pipeline report written to {}", path.display());
        Ok(())
    }
}
