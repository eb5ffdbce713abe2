//! Table splitter: projects the wide sales export into products, users and
//! reviews. Products and users are deduplicated; reviews are kept as exported.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::constants::{
    PRODUCTS_FILE, PRODUCT_COLUMNS, REVIEWS_FILE, REVIEW_COLUMNS, USERS_FILE, USER_COLUMNS,
};
use crate::error::Result;
use crate::metrics::{phase_metric, time_operation, SplitMetrics};
use crate::table::Table;

pub struct SplitTables {
    pub products: Table,
    pub users: Table,
    pub reviews: Table,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitReport {
    pub raw_rows: usize,
    pub products: usize,
    pub users: usize,
    pub reviews: usize,
    pub duplicates_dropped: usize,
    pub outputs: Vec<PathBuf>,
}

/// Project `raw` into the three entity tables. A missing column is a schema error.
pub fn split_table(raw: &Table) -> Result<(SplitTables, SplitReport)> {
    let mut products = raw.project(PRODUCTS_FILE, &PRODUCT_COLUMNS)?;
    let mut users = raw.project(USERS_FILE, &USER_COLUMNS)?;
    // Reviews are keyed by review_id already, so they are not deduplicated
    let reviews = raw.project(REVIEWS_FILE, &REVIEW_COLUMNS)?;

    let duplicates_dropped = products.dedup() + users.dedup();
    SplitMetrics::record_split(raw.len(), duplicates_dropped);

    let report = SplitReport {
        raw_rows: raw.len(),
        products: products.len(),
        users: users.len(),
        reviews: reviews.len(),
        duplicates_dropped,
        outputs: Vec::new(),
    };
    Ok((SplitTables { products, users, reviews }, report))
}

/// Split the export at `input` and write `products.csv`, `users.csv` and
/// `reviews.csv` into `work_dir`.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn split_file(input: &Path, work_dir: &Path) -> Result<SplitReport> {
    let _timing = time_operation(phase_metric!(histogram, "split", "duration_seconds"));

    let raw = Table::read(input)?;
    let (tables, mut report) = split_table(&raw)?;

    for table in [&tables.products, &tables.users, &tables.reviews] {
        let path = work_dir.join(table.name());
        table.write(&path)?;
        report.outputs.push(path);
    }

    info!(
        products = report.products,
        users = report.users,
        reviews = report.reviews,
        duplicates = report.duplicates_dropped,
        "Split {} raw rows",
        report.raw_rows
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;

    const RAW_HEADERS: [&str; 17] = [
        "product_id",
        "product_name",
        "category",
        "discounted_price",
        "actual_price",
        "discount_percentage",
        "rating",
        "rating_count",
        "about_product",
        "user_id",
        "user_name",
        "review_id",
        "review_title",
        "review_content",
        "img_link",
        "product_link",
        "extra",
    ];

    fn raw_row<'a>(product: &'a str, user: &'a str, review: &'a str) -> [&'a str; 17] {
        [
            product, "Cable", "Electronics", "\u{20b9}399", "\u{20b9}1,099", "64%", "4.2", "24,269",
            "Fast charging", user, "Ann", review, "Good", "Works", "http://img", "http://p", "x",
        ]
    }

    #[test]
    fn splits_and_dedups_products_and_users_only() {
        let rows = [
            raw_row("B01", "U1", "R1"),
            raw_row("B01", "U1", "R1"),
            raw_row("B02", "U1", "R2"),
        ];
        let rows: Vec<&[&str]> = rows.iter().map(|r| &r[..]).collect();
        let raw = Table::from_rows("amazon.csv", &RAW_HEADERS, &rows).unwrap();

        let (tables, report) = split_table(&raw).unwrap();

        assert_eq!(tables.products.len(), 2);
        assert_eq!(tables.users.len(), 1);
        assert_eq!(tables.reviews.len(), 3);
        assert_eq!(report.duplicates_dropped, 3);
        assert_eq!(tables.products.headers().len(), PRODUCT_COLUMNS.len());
        assert_eq!(tables.reviews.headers()[2], "product_id");
    }

    #[test]
    fn missing_column_is_schema_error() {
        let raw = Table::from_rows("amazon.csv", &["product_id", "user_id"], &[&["B01", "U1"]]).unwrap();
        let err = split_table(&raw).err().unwrap();
        assert!(matches!(err, EtlError::Schema { .. }));
    }
}
