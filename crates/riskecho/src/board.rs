//! Latest-value view of risk factors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{FactorDomain, RiskFactor};

/// The most recent reading of every risk factor, keyed by factor id.
///
/// Cloning a board is the snapshot mechanism: a tick works on its own copy
/// so concurrent ingestion never produces a torn read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorBoard {
    factors: BTreeMap<String, RiskFactor>,
}

impl FactorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a factor, replacing any earlier value with the same id.
    pub fn upsert(&mut self, factor: RiskFactor) {
        self.factors.insert(factor.id.clone(), factor);
    }

    /// Current value of a factor, if one has been reported.
    pub fn value(&self, id: &str) -> Option<f64> {
        self.factors.get(id).map(|f| f.value)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn by_domain(&self, domain: FactorDomain) -> Vec<&RiskFactor> {
        self.factors.values().filter(|f| f.domain == domain).collect()
    }
}

impl FromIterator<RiskFactor> for FactorBoard {
    fn from_iter<I: IntoIterator<Item = RiskFactor>>(iter: I) -> Self {
        let mut board = Self::new();
        for factor in iter {
            board.upsert(factor);
        }
        board
    }
}
