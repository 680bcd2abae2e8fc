//! Per-level counts over an evaluated tree.

use rollup_core::EvaluatedTree;
use serde::Serialize;

/// How many nodes a level has and how many of them pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    pub nodes: usize,
    pub passing: usize,
}

impl LevelCount {
    fn record(&mut self, passes: bool) {
        self.nodes += 1;
        if passes {
            self.passing += 1;
        }
    }

    pub fn failing(&self) -> usize {
        self.nodes - self.passing
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub segments: usize,
    pub total_users: u64,
    pub rolled_up_segments: u64,
    pub products: LevelCount,
    pub tiers: LevelCount,
    pub countries: LevelCount,
    pub regions: LevelCount,
}

impl TreeSummary {
    pub fn from_tree(tree: &EvaluatedTree) -> Self {
        let mut summary = TreeSummary {
            segments: tree.segment_count,
            ..TreeSummary::default()
        };

        for product in tree.products.values() {
            summary.total_users += product.total_users;
            summary.rolled_up_segments += product.provenance.rolled_up_segment_count;
            summary.products.record(product.passes_threshold);

            for tier in product.tiers.values() {
                summary.tiers.record(tier.passes_threshold);
                for country in tier.countries.values() {
                    summary.countries.record(country.passes_threshold);
                    for region in &country.regions {
                        summary.regions.record(region.passes);
                    }
                }
            }
        }

        summary
    }
}
