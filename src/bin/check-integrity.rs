use std::path::PathBuf;

use sales_etl::constants::{cleaned_name, PRODUCTS_FILE, PRODUCT_ID, REVIEWS_FILE, USERS_FILE, USER_ID};
use sales_etl::pipeline::integrity::check_foreign_keys;
use sales_etl::table::Table;

/// Prints the integrity reports for the cleaned tables in a work directory as JSON.
fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let work_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    println!("🔍 Checking foreign keys in {}", work_dir.display());
    println!("{}", "=".repeat(60));

    let products = Table::read(&work_dir.join(cleaned_name(PRODUCTS_FILE)))?;
    let users = Table::read(&work_dir.join(cleaned_name(USERS_FILE)))?;
    let reviews = Table::read(&work_dir.join(cleaned_name(REVIEWS_FILE)))?;

    let reports = [
        check_foreign_keys(&products, PRODUCT_ID, &reviews, PRODUCT_ID)?,
        check_foreign_keys(&users, USER_ID, &reviews, USER_ID)?,
    ];

    for report in &reports {
        let marker = if report.is_clean() { "✅" } else { "❌" };
        println!(
            "{} {} -> {}: {} orphaned keys",
            marker, report.child, report.parent, report.orphan_count
        );
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);

    Ok(())
}
