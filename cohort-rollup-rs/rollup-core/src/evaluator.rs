//! Threshold evaluation over a built hierarchy.
//!
//! Aggregating levels pass by volume (`total_users >= min_cohort_size`).
//! Region leaves keep the upstream sufficiency verdict they were built with.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::hierarchy::{
    BuiltCountryNode, BuiltProductNode, BuiltTierNode, NodeTotals, RegionEntry, UnevaluatedTree,
};
use crate::provenance::RollupProvenance;
use crate::segment::ProductKey;
use crate::tiers::EconomicTier;

/// Inclusive threshold. A non-positive minimum lets every node pass.
pub fn passes_threshold(total_users: u64, min_cohort_size: i64) -> bool {
    match u64::try_from(min_cohort_size) {
        Ok(min) => total_users >= min,
        Err(_) => true,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountryNode {
    pub total_users: u64,
    pub passes_threshold: bool,
    pub provenance: RollupProvenance,
    pub regions: Vec<RegionEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EconomicTierNode {
    pub total_users: u64,
    pub passes_threshold: bool,
    pub provenance: RollupProvenance,
    pub countries: BTreeMap<String, CountryNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProductStorePriceNode {
    pub total_users: u64,
    pub passes_threshold: bool,
    pub provenance: RollupProvenance,
    pub tiers: BTreeMap<EconomicTier, EconomicTierNode>,
}

/// The final, immutable hierarchy handed to consumers.
///
/// Serializes as nested objects keyed by `"{product_id}|{app_store}|{price_bucket}"`,
/// then tier label, then country code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EvaluatedTree {
    pub min_cohort_size: i64,
    pub segment_count: usize,
    pub products: BTreeMap<ProductKey, ProductStorePriceNode>,
}

impl EvaluatedTree {
    pub fn product(
        &self,
        product_id: &str,
        app_store: &str,
        price_bucket: &str,
    ) -> Option<&ProductStorePriceNode> {
        self.products
            .get(&ProductKey::new(product_id, app_store, price_bucket))
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ProductStorePriceNode {
    pub fn tier(&self, tier: EconomicTier) -> Option<&EconomicTierNode> {
        self.tiers.get(&tier)
    }
}

impl EconomicTierNode {
    pub fn country(&self, code: &str) -> Option<&CountryNode> {
        self.countries.get(code)
    }
}

/// Stamps pass/fail on every aggregating node against one cohort size.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdEvaluator {
    min_cohort_size: i64,
}

impl ThresholdEvaluator {
    pub fn new(min_cohort_size: i64) -> Self {
        Self { min_cohort_size }
    }

    pub fn min_cohort_size(&self) -> i64 {
        self.min_cohort_size
    }

    pub fn evaluate(&self, tree: UnevaluatedTree) -> EvaluatedTree {
        let products: BTreeMap<ProductKey, ProductStorePriceNode> = tree
            .products
            .into_iter()
            .map(|(key, node)| (key, self.product(node)))
            .collect();

        log::debug!(
            "evaluated {} product nodes at min_cohort_size={}",
            products.len(),
            self.min_cohort_size
        );

        EvaluatedTree {
            min_cohort_size: self.min_cohort_size,
            segment_count: tree.segment_count,
            products,
        }
    }

    fn verdict(&self, totals: NodeTotals) -> (u64, bool, RollupProvenance) {
        (
            totals.total_users,
            passes_threshold(totals.total_users, self.min_cohort_size),
            totals.provenance.finalize(),
        )
    }

    fn product(&self, node: BuiltProductNode) -> ProductStorePriceNode {
        let (total_users, passes_threshold, provenance) = self.verdict(node.totals);
        ProductStorePriceNode {
            total_users,
            passes_threshold,
            provenance,
            tiers: node
                .tiers
                .into_iter()
                .map(|(tier, child)| (tier, self.tier(child)))
                .collect(),
        }
    }

    fn tier(&self, node: BuiltTierNode) -> EconomicTierNode {
        let (total_users, passes_threshold, provenance) = self.verdict(node.totals);
        EconomicTierNode {
            total_users,
            passes_threshold,
            provenance,
            countries: node
                .countries
                .into_iter()
                .map(|(code, child)| (code, self.country(child)))
                .collect(),
        }
    }

    fn country(&self, node: BuiltCountryNode) -> CountryNode {
        let (total_users, passes_threshold, provenance) = self.verdict(node.totals);
        CountryNode {
            total_users,
            passes_threshold,
            provenance,
            regions: node.regions,
        }
    }
}

/// Convenience wrapper around `ThresholdEvaluator::evaluate`.
pub fn evaluate(tree: UnevaluatedTree, min_cohort_size: i64) -> EvaluatedTree {
    ThresholdEvaluator::new(min_cohort_size).evaluate(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::segment::{validate_segments, Segment};
    use crate::tiers::TierTable;

    fn tree_with(users: &[(&str, Option<&str>, i64, bool)]) -> UnevaluatedTree {
        let segments: Vec<Segment> = users
            .iter()
            .map(|(country, region, count, sufficient)| Segment {
                product_id: "P1".into(),
                app_store: "APP_STORE".into(),
                price_bucket: "$5-$10".into(),
                country: Some(country.to_string()),
                region: region.map(String::from),
                user_count: *count,
                has_sufficient_data: *sufficient,
                ..Segment::default()
            })
            .collect();
        let table = TierTable::default();
        HierarchyBuilder::new(&table).build(validate_segments(&segments).unwrap())
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(passes_threshold(50, 50));
        assert!(!passes_threshold(49, 50));
        assert!(passes_threshold(51, 50));
    }

    #[test]
    fn non_positive_minimum_always_passes() {
        assert!(passes_threshold(0, 0));
        assert!(passes_threshold(0, -10));
    }

    #[test]
    fn stamps_every_aggregating_level() {
        let tree = evaluate(tree_with(&[("US", None, 30, true), ("GB", None, 25, true)]), 50);
        let product = tree.product("P1", "APP_STORE", "$5-$10").unwrap();
        assert!(product.passes_threshold);
        let tier1 = product.tier(EconomicTier::Tier1).unwrap();
        assert!(tier1.passes_threshold);
        assert!(!tier1.country("US").unwrap().passes_threshold);
        assert!(!tier1.country("GB").unwrap().passes_threshold);
    }

    #[test]
    fn regions_keep_their_built_verdict() {
        // region holds 5 users but passes; its country of 5 users fails the threshold
        let tree = evaluate(tree_with(&[("US", Some("CA"), 5, true)]), 50);
        let country = tree
            .product("P1", "APP_STORE", "$5-$10")
            .and_then(|p| p.tier(EconomicTier::Tier1))
            .and_then(|t| t.country("US"))
            .unwrap();
        assert!(!country.passes_threshold);
        assert!(country.regions[0].passes);
    }

    #[test]
    fn serializes_with_joined_product_key_and_tier_labels() {
        let tree = evaluate(tree_with(&[("US", Some("CA"), 80, true)]), 50);
        let json = serde_json::to_value(&tree).unwrap();
        let country = &json["products"]["P1|APP_STORE|$5-$10"]["tiers"]["tier1"]["countries"]["US"];
        assert_eq!(country["total_users"], 80);
        assert_eq!(country["passes_threshold"], true);
        assert_eq!(country["regions"][0]["name"], "CA");
    }
}
