//! Folds a flat segment list into the four-level containment tree.
//!
//! Product+Store+Price → Economic Tier → Country → Region.
//!
//! Every segment adds its users and provenance to each node on its path.
//! Regions are not aggregated: each segment with a region appends its own
//! verbatim `RegionEntry` to the country, duplicates included.
//! Pass/fail is not decided here; see `evaluator`.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::provenance::ProvenanceAccumulator;
use crate::segment::{ProductKey, Segment, ValidatedSegments};
use crate::tiers::{EconomicTier, TierClassifier};

/// Running totals shared by the three aggregating levels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeTotals {
    pub total_users: u64,
    pub provenance: ProvenanceAccumulator,
}

impl NodeTotals {
    fn absorb(&mut self, segment: &Segment) {
        self.total_users += segment.users();
        self.provenance.absorb(segment);
    }
}

/// Level 4 leaf: one segment's own record, never merged with siblings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionEntry {
    pub name: String,
    /// `final_user_count` when the upstream job set one, else `user_count`.
    pub users: u64,
    /// Upstream sufficiency, not the cohort threshold.
    pub passes: bool,
    pub rollup_target: Option<String>,
    pub rollup_reason: Option<String>,
    pub accuracy_score: Option<String>,
    pub final_user_count: Option<u64>,
    pub original_user_count: u64,
    pub properties_dropped: Vec<String>,
}

impl RegionEntry {
    fn from_segment(name: &str, segment: &Segment) -> Self {
        Self {
            name: name.to_string(),
            users: segment.effective_final_users(),
            passes: segment.passes_individually(),
            rollup_target: segment.rollup_target.clone(),
            rollup_reason: segment.rollup_description.clone(),
            accuracy_score: segment.accuracy_score.clone(),
            final_user_count: segment.final_user_count.and_then(|v| u64::try_from(v).ok()),
            original_user_count: segment.users(),
            properties_dropped: segment.properties_dropped.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuiltCountryNode {
    pub totals: NodeTotals,
    pub regions: Vec<RegionEntry>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuiltTierNode {
    pub totals: NodeTotals,
    pub countries: BTreeMap<String, BuiltCountryNode>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuiltProductNode {
    pub totals: NodeTotals,
    pub tiers: BTreeMap<EconomicTier, BuiltTierNode>,
}

impl BuiltProductNode {
    fn fold<C: TierClassifier + ?Sized>(&mut self, segment: &Segment, classifier: &C) {
        let country = segment.country_or_unknown();
        let tier = classifier.classify(country);

        self.totals.absorb(segment);

        let tier_node = self.tiers.entry(tier).or_default();
        tier_node.totals.absorb(segment);

        let country_node = tier_node.countries.entry(country.to_string()).or_default();
        country_node.totals.absorb(segment);

        if let Some(region) = segment.region.as_deref() {
            country_node
                .regions
                .push(RegionEntry::from_segment(region, segment));
        }
    }
}

/// The tree before threshold evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnevaluatedTree {
    pub products: BTreeMap<ProductKey, BuiltProductNode>,
    pub segment_count: usize,
}

/// Builds an `UnevaluatedTree` with an injected tier classifier.
pub struct HierarchyBuilder<'c, C: TierClassifier + ?Sized> {
    classifier: &'c C,
}

impl<'c, C: TierClassifier + ?Sized> HierarchyBuilder<'c, C> {
    pub fn new(classifier: &'c C) -> Self {
        Self { classifier }
    }

    /// Fold segments in input order.
    pub fn build(&self, segments: ValidatedSegments<'_>) -> UnevaluatedTree {
        let mut products: BTreeMap<ProductKey, BuiltProductNode> = BTreeMap::new();
        for segment in segments.as_slice() {
            products
                .entry(segment.product_key())
                .or_default()
                .fold(segment, self.classifier);
        }

        log::debug!(
            "built hierarchy: {} segments into {} product nodes",
            segments.len(),
            products.len()
        );
        warn_unknown_countries(segments.as_slice());

        UnevaluatedTree {
            products,
            segment_count: segments.len(),
        }
    }
}

impl<'c, C: TierClassifier + Sync + ?Sized> HierarchyBuilder<'c, C> {
    /// Same tree as `build`, with each level-1 subtree folded on the rayon pool.
    ///
    /// Segments are grouped by product key first, keeping input order inside
    /// each group, so region order and last-writer provenance match the
    /// sequential fold exactly.
    pub fn build_parallel(&self, segments: ValidatedSegments<'_>) -> UnevaluatedTree {
        let mut groups: IndexMap<ProductKey, Vec<&Segment>> = IndexMap::new();
        for segment in segments.as_slice() {
            groups.entry(segment.product_key()).or_default().push(segment);
        }

        let classifier = self.classifier;
        let products: BTreeMap<ProductKey, BuiltProductNode> = groups
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(key, group)| {
                let mut node = BuiltProductNode::default();
                for segment in group {
                    node.fold(segment, classifier);
                }
                (key, node)
            })
            .collect();

        log::debug!(
            "built hierarchy in parallel: {} segments into {} product nodes",
            segments.len(),
            products.len()
        );
        warn_unknown_countries(segments.as_slice());

        UnevaluatedTree {
            products,
            segment_count: segments.len(),
        }
    }
}

fn warn_unknown_countries(segments: &[Segment]) {
    let missing = segments.iter().filter(|s| s.country.is_none()).count();
    if missing > 0 {
        log::warn!(
            "{} segments had no country and were placed under \"Unknown\"",
            missing
        );
    }
}
