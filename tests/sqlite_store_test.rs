use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use tempfile::tempdir;

use sales_etl::app::ports::{KeyStore, StoreConnector};
use sales_etl::config::StoreConfig;
use sales_etl::infra::SqliteConnector;
use sales_etl::pipeline::store_filter::{filter_against_store, FilterRequest};
use sales_etl::table::Table;
use sales_etl::EtlError;

fn create_store(path: &Path) -> Result<()> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE products (
            product_id   TEXT PRIMARY KEY,
            product_name TEXT
        );
        INSERT INTO products VALUES ('A', 'Cable'), ('B', 'Mouse');
        CREATE TABLE orders (
            id INTEGER PRIMARY KEY
        );
        INSERT INTO orders VALUES (1), (2), (3);
        "#,
    )?;
    Ok(())
}

fn store_config(path: &Path) -> StoreConfig {
    StoreConfig {
        host: "localhost".to_string(),
        user: "etl".to_string(),
        secret: "unused".to_string(),
        store: path.display().to_string(),
    }
}

fn write_reviews(work_dir: &Path) -> Result<()> {
    let reviews = Table::from_rows(
        "cleaned_reviews.csv",
        &["review_id", "user_id", "product_id", "review_title", "review_content"],
        &[
            &["R1", "U1", "A", "Great", "Works"],
            &["R2", "U2", "B", "Ok", "Fine"],
            &["R3", "U1", "C", "Meh", "Dim"],
            &["R4", "U3", "D", "Bad", "Broke"],
        ],
    )?;
    reviews.write(&work_dir.join("cleaned_reviews.csv"))?;
    Ok(())
}

#[test]
fn reads_keys_and_counts() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("store.db");
    create_store(&db)?;

    let store = SqliteConnector.connect(&store_config(&db))?;

    let keys = store.primary_keys("products", "product_id")?;
    assert_eq!(keys.len(), 2);
    assert!(keys.contains("A") && keys.contains("B"));
    assert_eq!(store.row_count("products")?, 2);

    let ids = store.primary_keys("orders", "id")?;
    assert!(ids.contains("1") && ids.contains("3"));

    assert!(matches!(store.row_count("no_such_table"), Err(EtlError::Store { .. })));
    assert!(matches!(store.row_count("products; --"), Err(EtlError::Store { .. })));
    Ok(())
}

#[test]
fn filters_reviews_against_store_products() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("store.db");
    create_store(&db)?;
    write_reviews(dir.path())?;

    let request = FilterRequest::reviews_for_products(dir.path());
    let report = filter_against_store(&SqliteConnector, &store_config(&db), &request)?;

    assert_eq!(report.connector, "sqlite");
    assert_eq!(report.store_keys, 2);
    assert_eq!(report.store_rows, 2);
    assert_eq!(report.original_rows, 4);
    assert_eq!(report.kept_rows, 2);
    assert_eq!(report.excluded_rows, 2);
    assert_eq!(report.missing_key_sample, vec!["C".to_string(), "D".to_string()]);

    let import = Table::read(&request.output_path)?;
    let product_ids: Vec<_> = import.rows().iter().map(|r| r[2].clone().unwrap()).collect();
    assert_eq!(product_ids, vec!["A", "B"]);
    Ok(())
}

#[test]
fn missing_database_is_a_connection_failure() -> Result<()> {
    let dir = tempdir()?;
    write_reviews(dir.path())?;

    let request = FilterRequest::reviews_for_products(dir.path());
    let err = filter_against_store(&SqliteConnector, &store_config(&dir.path().join("absent.db")), &request)
        .unwrap_err();

    assert!(matches!(err, EtlError::Store { .. }));
    assert!(!request.output_path.exists());
    assert!(!dir.path().join("absent.db").exists());
    Ok(())
}
