use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Schema error: column '{column}' missing from {artifact}")]
    Schema { column: String, artifact: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table error in {artifact}: {message}")]
    Table { artifact: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {message}")]
    Store { message: String },
}

impl EtlError {
    pub fn schema(column: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
            artifact: artifact.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
