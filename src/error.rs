//! Error types for fence configuration.
//!
//! Only configuration can fail. Once a fence is built, evaluating a mutation
//! never returns an error: anything malformed degrades to "no messages".

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FenceError>;

#[derive(Debug, Error)]
pub enum FenceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("toml error: {0}")]
    Toml(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
