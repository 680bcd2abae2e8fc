//! Country → economic tier classification.
//!
//! The table is data, not code: callers inject their own `TierTable`
//! (or any `TierClassifier`) and the builder never looks at country
//! lists directly. Lookup is total. A code found in no tier is tier 4.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RollupError, RollupResult};

/// Coarse income grouping of countries, highest-income first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EconomicTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl EconomicTier {
    /// All tiers in lookup priority order.
    pub const ALL: [EconomicTier; 4] = [
        EconomicTier::Tier1,
        EconomicTier::Tier2,
        EconomicTier::Tier3,
        EconomicTier::Tier4,
    ];

    /// Explicit fallback for codes no tier claims.
    pub const DEFAULT: EconomicTier = EconomicTier::Tier4;

    /// Parse the serialized label (`"tier1"` .. `"tier4"`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "tier1" => Some(EconomicTier::Tier1),
            "tier2" => Some(EconomicTier::Tier2),
            "tier3" => Some(EconomicTier::Tier3),
            "tier4" => Some(EconomicTier::Tier4),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            EconomicTier::Tier1 => 0,
            EconomicTier::Tier2 => 1,
            EconomicTier::Tier3 => 2,
            EconomicTier::Tier4 => 3,
        }
    }
}

impl fmt::Display for EconomicTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {}", self.index() + 1)
    }
}

/// Anything that can place a country code into a tier.
pub trait TierClassifier {
    /// Must never fail; unknown codes map to a tier too.
    fn classify(&self, country_code: &str) -> EconomicTier;
}

/// Per-tier sets of upper-cased ISO country codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierTable {
    tiers: [HashSet<String>; 4],
}

// Built-in table, roughly following World Bank income groups.
const TIER1_COUNTRIES: &[&str] = &[
    "US", "CA", "GB", "DE", "FR", "NL", "BE", "LU", "CH", "AT", "IE", "DK", "SE", "NO", "FI",
    "IS", "AU", "NZ", "JP", "KR", "SG", "HK", "IL", "AE", "QA", "KW",
];
const TIER2_COUNTRIES: &[&str] = &[
    "IT", "ES", "PT", "GR", "CZ", "SK", "SI", "EE", "LV", "LT", "PL", "HU", "HR", "CY", "MT",
    "TW", "SA", "BH", "OM", "CL", "UY", "PA",
];
const TIER3_COUNTRIES: &[&str] = &[
    "CN", "BR", "MX", "AR", "RU", "TR", "MY", "TH", "ZA", "CO", "PE", "RO", "BG", "RS", "KZ",
    "CR", "DO", "EC",
];
const TIER4_COUNTRIES: &[&str] = &[
    "IN", "ID", "PH", "VN", "PK", "BD", "NG", "EG", "KE", "GH", "MA", "UA", "LK", "NP", "ET",
];

impl TierTable {
    /// A table with no countries; every lookup falls through to tier 4.
    pub fn empty() -> Self {
        Self {
            tiers: Default::default(),
        }
    }

    /// Add `codes` to `tier`. Codes are normalized to upper case.
    pub fn with_countries<I, S>(mut self, tier: EconomicTier, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tiers[tier.index()].extend(codes.into_iter().map(|c| normalize(c.as_ref())));
        self
    }

    /// Parse `{ "tier1": [..], "tier2": [..], .. }`. Absent tiers are empty.
    pub fn from_json(json: &str) -> RollupResult<Self> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| RollupError::InvalidTierTable(e.to_string()))?;
        raw.into_iter().try_fold(Self::empty(), |table, (label, codes)| {
            let tier = EconomicTier::from_label(&label).ok_or_else(|| {
                RollupError::InvalidTierTable(format!("unknown tier '{}'", label))
            })?;
            Ok(table.with_countries(tier, codes))
        })
    }

    /// Number of codes explicitly listed under `tier`.
    pub fn country_count(&self, tier: EconomicTier) -> usize {
        self.tiers[tier.index()].len()
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::empty()
            .with_countries(EconomicTier::Tier1, TIER1_COUNTRIES)
            .with_countries(EconomicTier::Tier2, TIER2_COUNTRIES)
            .with_countries(EconomicTier::Tier3, TIER3_COUNTRIES)
            .with_countries(EconomicTier::Tier4, TIER4_COUNTRIES)
    }
}

impl TierClassifier for TierTable {
    fn classify(&self, country_code: &str) -> EconomicTier {
        let code = normalize(country_code);
        EconomicTier::ALL
            .into_iter()
            .find(|tier| self.tiers[tier.index()].contains(&code))
            .unwrap_or(EconomicTier::DEFAULT)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
