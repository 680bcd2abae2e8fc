//! Rollup provenance: which segments under a node were rolled up, why,
//! and which properties had to be dropped to reach sufficiency.

use indexmap::IndexSet;
use serde::Serialize;

use crate::segment::Segment;

/// Provenance while the tree is being built.
///
/// Reasons and dropped properties are insertion-ordered sets so that
/// repeated values collapse to one entry and iteration order is stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProvenanceAccumulator {
    pub has_rollups: bool,
    pub rolled_up_segment_count: u64,
    pub total_segment_count: u64,
    pub reasons: IndexSet<String>,
    pub properties_dropped: IndexSet<String>,
    pub final_user_count_sum: u64,
    /// Last writer wins across contributing segments.
    pub last_rollup_target: Option<String>,
}

impl ProvenanceAccumulator {
    /// Fold one segment into this node's provenance.
    pub fn absorb(&mut self, segment: &Segment) {
        self.total_segment_count += 1;
        self.final_user_count_sum += segment.effective_final_users();

        if !segment.has_rollup_evidence() {
            return;
        }

        self.has_rollups = true;
        self.rolled_up_segment_count += 1;

        if let Some(reason) = segment.rollup_description.as_deref().filter(|r| !r.is_empty()) {
            self.reasons.insert(reason.to_string());
        }
        for property in &segment.properties_dropped {
            self.properties_dropped.insert(property.clone());
        }
        if let Some(target) = &segment.rollup_target {
            self.last_rollup_target = Some(target.clone());
        }
    }

    /// Freeze the sets into ordered sequences for downstream consumers.
    pub fn finalize(self) -> RollupProvenance {
        RollupProvenance {
            has_rollups: self.has_rollups,
            rolled_up_segment_count: self.rolled_up_segment_count,
            total_segment_count: self.total_segment_count,
            reasons: self.reasons.into_iter().collect(),
            properties_dropped: self.properties_dropped.into_iter().collect(),
            final_user_count_sum: self.final_user_count_sum,
            last_rollup_target: self.last_rollup_target,
        }
    }
}

/// Provenance of an evaluated node. `reasons` and `properties_dropped`
/// hold each value once, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RollupProvenance {
    pub has_rollups: bool,
    pub rolled_up_segment_count: u64,
    pub total_segment_count: u64,
    pub reasons: Vec<String>,
    pub properties_dropped: Vec<String>,
    pub final_user_count_sum: u64,
    pub last_rollup_target: Option<String>,
}
