pub mod in_memory_store;
pub mod sqlite_store;

pub use in_memory_store::InMemoryConnector;
pub use sqlite_store::SqliteConnector;
