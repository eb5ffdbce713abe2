use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_CONVERSION_RATE;
use crate::error::{EtlError, Result};
use crate::pipeline::sanitize::{Replacement, ReplacementMap};

/// Environment variable that overrides `store.secret` from the config file.
pub const STORE_SECRET_ENV: &str = "SALES_ETL_STORE_SECRET";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub currency: CurrencyConfig,
    pub store: StoreConfig,
    pub sanitizer: SanitizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The wide sales export
    pub raw_input: PathBuf,
    /// Directory every derived artifact is written to
    pub work_dir: PathBuf,
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub rate: f64,
}

/// Connection settings for the external relational store.
///
/// Opaque to the pipeline: each connector decides which fields it uses.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub user: String,
    pub secret: String,
    pub store: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Replaces the built-in dictionary when non-empty
    pub replacements: Vec<Replacement>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_input: PathBuf::from("data/raw/amazon.csv"),
            work_dir: PathBuf::from("."),
            log_dir: "logs".to_string(),
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_CONVERSION_RATE,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .field("store", &self.store)
            .finish()
    }
}

impl Config {
    /// Load the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path).map_err(|e| {
                EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&config_content)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        if let Ok(secret) = std::env::var(STORE_SECRET_ENV) {
            config.store.secret = secret;
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.currency.rate.is_finite() || self.currency.rate <= 0.0 {
            return Err(EtlError::Config(format!(
                "currency.rate must be a positive number, got {}",
                self.currency.rate
            )));
        }
        self.replacement_map()?;
        Ok(())
    }

    /// The sanitizer dictionary: the configured one, or the built-in default.
    pub fn replacement_map(&self) -> Result<ReplacementMap> {
        if self.sanitizer.replacements.is_empty() {
            Ok(ReplacementMap::default())
        } else {
            ReplacementMap::new(self.sanitizer.replacements.clone())
        }
    }

    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.paths.work_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.currency.rate, 0.012);
        assert_eq!(config.paths.work_dir, PathBuf::from("."));
        assert_eq!(config.replacement_map().unwrap().len(), 22);
    }

    #[test]
    fn parses_store_and_replacements() {
        let config = Config::from_toml(
            r#"
            [paths]
            work_dir = "out"

            [store]
            host = "localhost"
            user = "root"
            secret = "hunter2"
            store = "sales.db"

            [[sanitizer.replacements]]
            from = "’"
            to = "'"
            "#,
        )
        .unwrap();

        assert_eq!(config.artifact("users.csv"), PathBuf::from("out/users.csv"));
        assert_eq!(config.store.store, "sales.db");
        assert_eq!(config.replacement_map().unwrap().len(), 1);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let store = StoreConfig {
            secret: "hunter2".to_string(),
            ..StoreConfig::default()
        };
        let rendered = format!("{:?}", store);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn rejects_non_positive_rate() {
        let err = Config::from_toml("[currency]\nrate = 0.0").unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn rejects_ascii_replacement_key() {
        let err = Config::from_toml(
            r#"
            [[sanitizer.replacements]]
            from = "a"
            to = "b"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }
}
