use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::app::ports::{KeyStore, StoreConnector};
use crate::config::StoreConfig;
use crate::error::{EtlError, Result};

/// In-memory store for development/testing
#[derive(Default)]
pub struct InMemoryConnector {
    tables: HashMap<String, HashSet<String>>,
    unreachable: bool,
    open_connections: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` with the given primary keys; its row count is the key count.
    pub fn with_table<I, S>(mut self, table: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(table.to_string(), keys.into_iter().map(Into::into).collect());
        self
    }

    /// A connector whose every connect attempt fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Connections handed out and not yet dropped
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }
}

impl StoreConnector for InMemoryConnector {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn connect(&self, config: &StoreConfig) -> Result<Box<dyn KeyStore>> {
        if self.unreachable {
            return Err(EtlError::store(format!(
                "cannot reach store '{}' on host '{}'",
                config.store, config.host
            )));
        }
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory store connection");
        Ok(Box::new(InMemoryKeyStore {
            tables: self.tables.clone(),
            open_connections: Arc::clone(&self.open_connections),
        }))
    }
}

struct InMemoryKeyStore {
    tables: HashMap<String, HashSet<String>>,
    open_connections: Arc<AtomicUsize>,
}

impl InMemoryKeyStore {
    fn table(&self, table: &str) -> Result<&HashSet<String>> {
        self.tables
            .get(table)
            .ok_or_else(|| EtlError::store(format!("no such table: {}", table)))
    }
}

impl KeyStore for InMemoryKeyStore {
    fn primary_keys(&self, table: &str, _column: &str) -> Result<HashSet<String>> {
        self.table(table).cloned()
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        Ok(self.table(table)?.len() as u64)
    }
}

impl Drop for InMemoryKeyStore {
    fn drop(&mut self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
        debug!("Closed in-memory store connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_connection_lifetime() {
        let connector = InMemoryConnector::new().with_table("products", ["A", "B"]);
        {
            let store = connector.connect(&StoreConfig::default()).unwrap();
            assert_eq!(connector.open_connections(), 1);
            assert_eq!(store.row_count("products").unwrap(), 2);
            assert!(store.primary_keys("products", "product_id").unwrap().contains("A"));
        }
        assert_eq!(connector.open_connections(), 0);
    }

    #[test]
    fn unknown_table_and_unreachable_store_fail() {
        let connector = InMemoryConnector::new();
        let store = connector.connect(&StoreConfig::default()).unwrap();
        assert!(store.row_count("products").is_err());

        let err = InMemoryConnector::unreachable()
            .connect(&StoreConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, EtlError::Store { .. }));
    }
}
