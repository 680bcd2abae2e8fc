//! Rollup error types.
//!
//! Only malformed input is an error. Empty segment lists, missing
//! country or region, and zero counts all produce a well-formed tree.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollupError {
    #[error("Segment {index} has negative user_count: {value}")]
    NegativeUserCount { index: usize, value: i64 },

    #[error("Segment {index} has negative final_user_count: {value}")]
    NegativeFinalUserCount { index: usize, value: i64 },

    #[error("Segment {index} pushes the {field} total past u64::MAX")]
    UserCountOverflow { index: usize, field: &'static str },

    #[error("Segment {index} {field} contains the key separator '|': {value:?}")]
    SeparatorInKey {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("Invalid min_cohort_size: {0}")]
    InvalidMinCohortSize(String),

    #[error("Invalid tier table: {0}")]
    InvalidTierTable(String),
}

/// Result type alias for rollup operations.
pub type RollupResult<T> = Result<T, RollupError>;
