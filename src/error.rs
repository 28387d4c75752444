use thiserror::Error;

use crate::types::SourceId;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Source {source} unavailable: {reason}")]
    SourceUnavailable { source: SourceId, reason: String },

    #[error("No usable data: every source failed to deliver records")]
    NoUsableData,
}

pub type Result<T> = std::result::Result<T, CompileError>;
