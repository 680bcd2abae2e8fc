//! Input segments and boundary validation.
//!
//! A segment is one pre-aggregated row produced by the upstream analysis
//! job. The sufficiency verdict, dropped properties, rollup target and
//! accuracy score are taken as given; nothing here recomputes them.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::defaults::{PRODUCT_KEY_SEPARATOR, UNKNOWN_COUNTRY};
use crate::error::{RollupError, RollupResult};

/// One bucketed group of users sharing product, store, price bucket,
/// country and optionally region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub product_id: String,
    pub app_store: String,
    pub price_bucket: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Signed so that malformed upstream rows can be rejected, not coerced.
    pub user_count: i64,
    pub has_sufficient_data: bool,
    #[serde(default)]
    pub properties_dropped: Vec<String>,
    #[serde(default)]
    pub rollup_description: Option<String>,
    #[serde(default)]
    pub rollup_target: Option<String>,
    #[serde(default)]
    pub final_user_count: Option<i64>,
    #[serde(default)]
    pub accuracy_score: Option<String>,
}

impl Segment {
    /// Level-1 key of this segment.
    pub fn product_key(&self) -> ProductKey {
        ProductKey {
            product_id: self.product_id.clone(),
            app_store: self.app_store.clone(),
            price_bucket: self.price_bucket.clone(),
        }
    }

    /// Country code, or `"Unknown"` when the upstream row has none.
    pub fn country_or_unknown(&self) -> &str {
        self.country.as_deref().unwrap_or(UNKNOWN_COUNTRY)
    }

    /// True when this segment was rolled up or had properties removed,
    /// and therefore contributes rollup evidence to its ancestors.
    pub fn has_rollup_evidence(&self) -> bool {
        !self.has_sufficient_data || !self.properties_dropped.is_empty()
    }

    /// Whether the segment stands on its own as a region leaf.
    pub fn passes_individually(&self) -> bool {
        self.has_sufficient_data && self.properties_dropped.is_empty()
    }

    pub(crate) fn users(&self) -> u64 {
        // non-negative after validate_segments
        u64::try_from(self.user_count).unwrap_or_default()
    }

    /// `final_user_count` when present, otherwise `user_count`.
    pub(crate) fn effective_final_users(&self) -> u64 {
        self.final_user_count
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or_else(|| self.users())
    }
}

/// Structured level-1 key. Components stay separate so a `|` inside a
/// product id cannot collide with another product's key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductKey {
    pub product_id: String,
    pub app_store: String,
    pub price_bucket: String,
}

impl ProductKey {
    pub fn new(
        product_id: impl Into<String>,
        app_store: impl Into<String>,
        price_bucket: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            app_store: app_store.into(),
            price_bucket: price_bucket.into(),
        }
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.product_id,
            self.app_store,
            self.price_bucket,
            sep = PRODUCT_KEY_SEPARATOR
        )
    }
}

impl Serialize for ProductKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A segment list that has passed boundary validation.
///
/// The builder only accepts this type, so a tree is never built from
/// rows with negative counts, totals that overflow, or key components
/// that would collide once joined for output.
#[derive(Clone, Copy, Debug)]
pub struct ValidatedSegments<'a> {
    segments: &'a [Segment],
}

impl<'a> ValidatedSegments<'a> {
    pub fn as_slice(&self) -> &'a [Segment] {
        self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Reject malformed rows before any node is created.
///
/// Every node total is bounded by the sum over the whole list, so checking
/// the overall sums is enough to keep the builder's additions in range.
pub fn validate_segments(segments: &[Segment]) -> RollupResult<ValidatedSegments<'_>> {
    let mut user_total: u64 = 0;
    let mut final_total: u64 = 0;
    for (index, segment) in segments.iter().enumerate() {
        for (field, value) in [
            ("product_id", &segment.product_id),
            ("app_store", &segment.app_store),
            ("price_bucket", &segment.price_bucket),
        ] {
            if value.contains(PRODUCT_KEY_SEPARATOR) {
                return Err(RollupError::SeparatorInKey {
                    index,
                    field,
                    value: value.clone(),
                });
            }
        }
        if segment.user_count < 0 {
            return Err(RollupError::NegativeUserCount {
                index,
                value: segment.user_count,
            });
        }
        if let Some(value) = segment.final_user_count.filter(|v| *v < 0) {
            return Err(RollupError::NegativeFinalUserCount { index, value });
        }
        user_total = user_total
            .checked_add(segment.users())
            .ok_or(RollupError::UserCountOverflow {
                index,
                field: "user_count",
            })?;
        final_total = final_total
            .checked_add(segment.effective_final_users())
            .ok_or(RollupError::UserCountOverflow {
                index,
                field: "final_user_count",
            })?;
    }
    Ok(ValidatedSegments { segments })
}
