//! Configuration module
//!
//! Loads and saves the JSON settings file.

pub mod settings;

use std::path::PathBuf;

pub use settings::Settings;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}
