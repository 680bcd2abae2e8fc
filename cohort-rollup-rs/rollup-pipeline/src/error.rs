//! Errors raised while loading segment files or running a rollup.

use rollup_core::RollupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error at line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a segment array or an object with \"segments\", got {0}")]
    UnexpectedShape(String),

    #[error("Unsupported segment file format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Rollup(#[from] RollupError),
}

/// Result type alias for loading and running.
pub type LoadResult<T> = Result<T, LoadError>;
