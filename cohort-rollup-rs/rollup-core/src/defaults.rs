//! Centralized defaults for cohort rollup evaluation.
//!
//! The minimum cohort size is a policy value owned by the caller; the
//! constant here only backs `RollupConfig::default()` and the CLI fallback.

/// Minimum number of users a node must reach to be reportable on its own.
pub const DEFAULT_MIN_COHORT_SIZE: i64 = 50;

/// Country key used when a segment arrives without a country code.
/// Not an ISO code, so the built-in tier table sends it to tier 4.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Joins product key components in output; rejected inside the components.
pub const PRODUCT_KEY_SEPARATOR: char = '|';
