use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::app::ports::{KeyStore, StoreConnector};
use crate::config::StoreConfig;
use crate::error::{EtlError, Result};

/// Relational store backed by a SQLite database file.
///
/// `store` is the database path. The database is opened read-only, so a path
/// that does not exist is a connection failure rather than a fresh empty store.
/// `host`, `user` and `secret` are not used by this adapter.
pub struct SqliteConnector;

impl StoreConnector for SqliteConnector {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, config: &StoreConfig) -> Result<Box<dyn KeyStore>> {
        if config.store.trim().is_empty() {
            return Err(EtlError::store("no store configured (store.store is empty)"));
        }

        let conn = Connection::open_with_flags(
            &config.store,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| EtlError::store(format!("Error connecting to '{}': {}", config.store, e)))?;

        info!(store = %config.store, user = %config.user, "Successfully connected to store");
        Ok(Box::new(SqliteKeyStore {
            conn,
            store: config.store.clone(),
        }))
    }
}

struct SqliteKeyStore {
    conn: Connection,
    store: String,
}

impl KeyStore for SqliteKeyStore {
    fn primary_keys(&self, table: &str, column: &str) -> Result<HashSet<String>> {
        let sql = format!("SELECT {} FROM {}", quote_ident(column)?, quote_ident(table)?);
        let query_err = |e: rusqlite::Error| EtlError::store(format!("Error fetching keys from {}: {}", table, e));

        let mut stmt = self.conn.prepare(&sql).map_err(query_err)?;
        let mut rows = stmt.query([]).map_err(query_err)?;

        let mut keys = HashSet::new();
        while let Some(row) = rows.next().map_err(query_err)? {
            let key = match row.get_ref(0).map_err(query_err)? {
                ValueRef::Null => continue,
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
            };
            keys.insert(key);
        }

        debug!("Fetched {} keys from {}.{}", keys.len(), table, column);
        Ok(keys)
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| EtlError::store(format!("Error counting rows in {}: {}", table, e)))?;
        Ok(count as u64)
    }
}

impl Drop for SqliteKeyStore {
    fn drop(&mut self) {
        info!(store = %self.store, "Store connection closed");
    }
}

/// Identifiers are interpolated into SQL, so only plain names are accepted.
fn quote_ident(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{}\"", name))
    } else {
        Err(EtlError::store(format!("invalid identifier: {:?}", name)))
    }
}
