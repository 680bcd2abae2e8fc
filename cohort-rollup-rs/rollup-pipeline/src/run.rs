//! Configured aggregation run: validate, build, evaluate, summarize.

use std::time::Instant;

use rollup_core::{
    validate_segments, EvaluatedTree, HierarchyBuilder, RollupResult, Segment,
    ThresholdEvaluator, TierClassifier,
};

use crate::config::RollupConfig;
use crate::summary::TreeSummary;

/// Everything a consumer needs from one aggregation call.
#[derive(Clone, Debug)]
pub struct RollupOutcome {
    pub tree: EvaluatedTree,
    pub summary: TreeSummary,
    pub elapsed_ms: u128,
}

/// One configured aggregation: validate → build → evaluate → summarize.
///
/// Holds no per-call state, so a single run can be shared across threads
/// and executed against many segment lists.
pub struct RollupRun<C> {
    config: RollupConfig,
    classifier: C,
}

impl<C: TierClassifier + Sync> RollupRun<C> {
    pub fn new(config: RollupConfig, classifier: C) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Either a complete tree or an error; never a partial tree.
    pub fn execute(&self, segments: &[Segment]) -> RollupResult<RollupOutcome> {
        let start = Instant::now();

        let validated = validate_segments(segments)?;
        let builder = HierarchyBuilder::new(&self.classifier);
        let built = if self.config.parallel {
            builder.build_parallel(validated)
        } else {
            builder.build(validated)
        };
        let tree = ThresholdEvaluator::new(self.config.min_cohort_size).evaluate(built);
        let summary = TreeSummary::from_tree(&tree);
        let elapsed_ms = start.elapsed().as_millis();

        log::info!(
            "rollup complete: segments={} products={} passing={} min_cohort_size={} elapsed_ms={}",
            summary.segments,
            summary.products.nodes,
            summary.products.passing,
            self.config.min_cohort_size,
            elapsed_ms
        );

        Ok(RollupOutcome {
            tree,
            summary,
            elapsed_ms,
        })
    }
}
