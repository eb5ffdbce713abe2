use std::collections::HashSet;

use crate::config::StoreConfig;
use crate::error::Result;

/// Opens connections to the external relational store.
pub trait StoreConnector: Send + Sync {
    /// Connector name used in logs
    fn name(&self) -> &str;

    fn connect(&self, config: &StoreConfig) -> Result<Box<dyn KeyStore>>;
}

/// A live store connection. Dropping it releases the connection.
pub trait KeyStore {
    /// Every value of `column` in `table`, rendered as text.
    fn primary_keys(&self, table: &str, column: &str) -> Result<HashSet<String>>;

    fn row_count(&self, table: &str) -> Result<u64>;
}
