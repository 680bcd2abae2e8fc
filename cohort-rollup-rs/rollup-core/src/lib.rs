//! Hierarchical cohort rollup.
//!
//! Folds statistically bucketed user segments into a
//! Product+Store+Price → Economic Tier → Country → Region tree, sums users
//! and rollup provenance bottom-up, then marks which aggregate levels reach
//! the minimum cohort size.
//!
//! The whole computation is a pure fold followed by a pure map. Nothing is
//! shared between calls, so `aggregate` may be called from many threads at
//! once as long as each call gets its own segment list.

pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod hierarchy;
pub mod provenance;
pub mod segment;
pub mod tiers;

pub use error::{RollupError, RollupResult};
pub use evaluator::{
    evaluate, passes_threshold, CountryNode, EconomicTierNode, EvaluatedTree,
    ProductStorePriceNode, ThresholdEvaluator,
};
pub use hierarchy::{HierarchyBuilder, RegionEntry, UnevaluatedTree};
pub use provenance::RollupProvenance;
pub use segment::{validate_segments, ProductKey, Segment, ValidatedSegments};
pub use tiers::{EconomicTier, TierClassifier, TierTable};

/// Validate, build and evaluate in one call.
///
/// Fails only on malformed input, before any node is created.
pub fn aggregate<C: TierClassifier + ?Sized>(
    segments: &[Segment],
    min_cohort_size: i64,
    classifier: &C,
) -> RollupResult<EvaluatedTree> {
    let validated = validate_segments(segments)?;
    let tree = HierarchyBuilder::new(classifier).build(validated);
    Ok(evaluate(tree, min_cohort_size))
}
