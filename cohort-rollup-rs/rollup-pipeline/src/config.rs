//! Run configuration.
//!
//! Resolution order for the cohort size is: explicit value, then the
//! `ROLLUP_MIN_COHORT_SIZE` environment variable, then the value carried by
//! a wrapped segment file, then `DEFAULT_MIN_COHORT_SIZE`.

use rollup_core::defaults::DEFAULT_MIN_COHORT_SIZE;
use rollup_core::{RollupError, RollupResult};

pub const MIN_COHORT_SIZE_ENV: &str = "ROLLUP_MIN_COHORT_SIZE";
pub const PARALLEL_ENV: &str = "ROLLUP_PARALLEL";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollupConfig {
    pub min_cohort_size: i64,
    /// Fold level-1 subtrees on the rayon pool.
    pub parallel: bool,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            min_cohort_size: DEFAULT_MIN_COHORT_SIZE,
            parallel: false,
        }
    }
}

impl RollupConfig {
    pub fn with_min_cohort_size(mut self, min_cohort_size: i64) -> Self {
        self.min_cohort_size = min_cohort_size;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> RollupResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> RollupResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(MIN_COHORT_SIZE_ENV) {
            config.min_cohort_size = parse_min_cohort_size(&raw)?;
        }
        if let Some(raw) = lookup(PARALLEL_ENV) {
            config.parallel = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(config)
    }
}

/// Parse a cohort size, rejecting anything that is not an integer.
pub fn parse_min_cohort_size(raw: &str) -> RollupResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| RollupError::InvalidMinCohortSize(raw.to_string()))
}
