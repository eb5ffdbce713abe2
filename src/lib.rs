pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod table;

pub mod pipeline;

// Store boundary: ports in app, adapters in infra
pub mod app;
pub mod infra;

pub use error::{EtlError, Result};
