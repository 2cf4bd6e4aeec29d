//! Cross-sector correlation library: known ripple patterns, network metadata,
//! confidence learning, and explicit pattern discovery.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::board::FactorBoard;
use crate::types::factor_ids::{CO2, HUMIDITY, PM25, TEMPERATURE};
use crate::types::{RiskError, RiskResult};

/// Confidence assigned to a freshly discovered pattern.
pub const DISCOVERED_CONFIDENCE: f64 = 0.5;

/// Upper bound of the confidence boost applied under environmental stress.
pub const MAX_STRESS_BOOST: f64 = 1.2;

const CONFIDENCE_FLOOR: f64 = 0.05;
const CONFIDENCE_CEILING: f64 = 0.99;
const OBSERVATION_JITTER: f64 = 0.01;

/// Industry sector a correlation pattern connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Healthcare,
    Education,
    Office,
    Manufacturing,
    Retail,
    Hospitality,
    Transportation,
    Logistics,
}

impl Sector {
    pub const ALL: [Sector; 8] = [
        Sector::Healthcare,
        Sector::Education,
        Sector::Office,
        Sector::Manufacturing,
        Sector::Retail,
        Sector::Hospitality,
        Sector::Transportation,
        Sector::Logistics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::Office => "office",
            Self::Manufacturing => "manufacturing",
            Self::Retail => "retail",
            Self::Hospitality => "hospitality",
            Self::Transportation => "transportation",
            Self::Logistics => "logistics",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Sector::ALL
            .iter()
            .copied()
            .find(|sector| sector.as_str() == needle)
            .ok_or_else(|| RiskError::UnknownSector(s.to_string()))
    }
}

/// How an event in the primary sector reaches the secondary ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RippleEffect {
    pub primary_sector: Sector,
    pub secondary_sectors: Vec<Sector>,
    /// Typical delay before the secondary impact, in hours.
    pub impact_delay_hours: f64,
    pub amplification_factor: f64,
}

/// How much of the network backs a pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkEffect {
    pub contributing_sites: u32,
    pub network_confidence: f64,
    pub prediction_accuracy: f64,
}

/// A known sector-to-sector correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPattern {
    pub pattern_id: String,
    pub sectors: Vec<Sector>,
    pub correlation_strength: f64,
    pub ripple_effect: RippleEffect,
    pub historical_occurrences: u32,
    pub confidence: f64,
    #[serde(default)]
    pub network_effect: NetworkEffect,
}

impl CorrelationPattern {
    pub fn involves(&self, sector: Sector) -> bool {
        self.sectors.contains(&sector)
    }

    fn validate(&self) -> Result<(), String> {
        let id = &self.pattern_id;
        if id.trim().is_empty() {
            return Err("pattern id must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.correlation_strength) {
            return Err(format!("pattern '{id}' correlation_strength must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("pattern '{id}' confidence must be in [0, 1]"));
        }
        let ripple = &self.ripple_effect;
        if !ripple.impact_delay_hours.is_finite() || ripple.impact_delay_hours < 0.0 {
            return Err(format!("pattern '{id}' impact delay must be finite and non-negative"));
        }
        if !ripple.amplification_factor.is_finite() {
            return Err(format!("pattern '{id}' amplification factor must be finite"));
        }
        if !self.sectors.contains(&ripple.primary_sector) {
            return Err(format!("pattern '{id}' primary sector is not one of its sectors"));
        }
        Ok(())
    }
}

/// Whether a prediction made from a pattern came true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationOutcome {
    Confirmed,
    Refuted,
}

/// Simulated size and learning rate of the contributing network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetadata {
    pub customer_count: u32,
    pub learning_velocity: f64,
}

/// Audit entry for a pattern synthesised by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub pattern_id: String,
    pub sectors: Vec<Sector>,
    pub network_size: u32,
    pub discovered_at: DateTime<Utc>,
}

/// Settings and seed data for a correlation library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Seed for the library's random source. `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub customer_count: u32,
    pub learning_velocity: f64,
    /// Largest network growth per discovery cycle.
    pub growth_per_cycle: u32,
    /// Network size below which discovery never synthesises patterns.
    pub discovery_threshold: u32,
    /// Chance per discovery cycle of synthesising a pattern once past the threshold.
    pub discovery_probability: f64,
    /// Upper bound of the random extra delay added to each predicted echo, in hours.
    pub echo_jitter_hours: f64,
    pub patterns: Vec<CorrelationPattern>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            seed: None,
            customer_count: 1200,
            learning_velocity: 0.15,
            growth_per_cycle: 25,
            discovery_threshold: 1000,
            discovery_probability: 0.05,
            echo_jitter_hours: 6.0,
            patterns: default_patterns(),
        }
    }
}

impl LibraryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.discovery_probability) {
            return Err("discovery_probability must be in [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.learning_velocity) {
            return Err("learning_velocity must be in [0, 1]".to_string());
        }
        if !self.echo_jitter_hours.is_finite() || self.echo_jitter_hours < 0.0 {
            return Err("echo_jitter_hours must be finite and non-negative".to_string());
        }
        let mut seen = HashSet::new();
        for pattern in &self.patterns {
            pattern.validate()?;
            if !seen.insert(pattern.pattern_id.as_str()) {
                return Err(format!("duplicate pattern id '{}'", pattern.pattern_id));
            }
        }
        Ok(())
    }
}

/// Registry of correlation patterns plus the network metadata they are scaled against.
///
/// There is no implicit global instance: callers build one with
/// [`CorrelationLibrary::initialize`] and pass it where it is needed.
pub struct CorrelationLibrary {
    patterns: Vec<CorrelationPattern>,
    network: NetworkMetadata,
    growth_per_cycle: u32,
    discovery_threshold: u32,
    discovery_probability: f64,
    echo_jitter_hours: f64,
    discoveries: Vec<DiscoveryRecord>,
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for CorrelationLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationLibrary")
            .field("patterns", &self.patterns.len())
            .field("network", &self.network)
            .field("discoveries", &self.discoveries.len())
            .finish_non_exhaustive()
    }
}

impl CorrelationLibrary {
    /// Seed a library from configuration, using `config.seed` for randomness.
    pub fn initialize(config: LibraryConfig) -> RiskResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::initialize_with_rng(config, rng)
    }

    /// Seed a library with an injected random source.
    pub fn initialize_with_rng<R>(config: LibraryConfig, rng: R) -> RiskResult<Self>
    where
        R: RngCore + Send + 'static,
    {
        config.validate().map_err(RiskError::InvalidConfig)?;

        tracing::info!(
            patterns = config.patterns.len(),
            customers = config.customer_count,
            "Correlation library initialized"
        );

        Ok(Self {
            patterns: config.patterns,
            network: NetworkMetadata {
                customer_count: config.customer_count,
                learning_velocity: config.learning_velocity,
            },
            growth_per_cycle: config.growth_per_cycle,
            discovery_threshold: config.discovery_threshold,
            discovery_probability: config.discovery_probability,
            echo_jitter_hours: config.echo_jitter_hours,
            discoveries: Vec::new(),
            rng: Box::new(rng),
        })
    }

    pub fn patterns(&self) -> &[CorrelationPattern] {
        &self.patterns
    }

    pub fn pattern(&self, pattern_id: &str) -> Option<&CorrelationPattern> {
        self.patterns.iter().find(|p| p.pattern_id == pattern_id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn network(&self) -> &NetworkMetadata {
        &self.network
    }

    /// Audit trail of every pattern synthesised by discovery, oldest first.
    pub fn discoveries(&self) -> &[DiscoveryRecord] {
        &self.discoveries
    }

    /// Patterns involving `sector`, adjusted for the current environmental stress.
    ///
    /// Confidence is boosted by `min(1.2, 1 + stress * 0.2)` and capped at 1.0,
    /// network effects are rescaled to the current network size, and the
    /// result is ranked by correlation strength. The library is not modified.
    pub fn detect_cross_sector_patterns(
        &self,
        sector: Sector,
        factors: &FactorBoard,
    ) -> Vec<CorrelationPattern> {
        let stress = stress_factor(factors);
        let boost = (1.0 + stress * 0.2).min(MAX_STRESS_BOOST);
        let total_occurrences: u64 = self
            .patterns
            .iter()
            .map(|p| u64::from(p.historical_occurrences))
            .sum::<u64>()
            .max(1);

        let mut matches: Vec<CorrelationPattern> = self
            .patterns
            .iter()
            .filter(|p| p.involves(sector))
            .map(|p| {
                let mut adjusted = p.clone();
                adjusted.confidence = (p.confidence * boost).min(1.0);
                adjusted.network_effect = self.network_effect_for(p, total_occurrences);
                adjusted
            })
            .collect();

        matches.sort_by(|a, b| {
            b.correlation_strength
                .partial_cmp(&a.correlation_strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(%sector, stress, matches = matches.len(), "Detected cross-sector patterns");
        matches
    }

    fn network_effect_for(&self, pattern: &CorrelationPattern, total_occurrences: u64) -> NetworkEffect {
        let customers = f64::from(self.network.customer_count);
        let share = f64::from(pattern.historical_occurrences) / total_occurrences as f64;
        let scale = customers.max(1.0).log10();
        let learned = 1.0
            - (-f64::from(pattern.historical_occurrences) * self.network.learning_velocity / 10.0)
                .exp();

        NetworkEffect {
            contributing_sites: (customers * share).round() as u32,
            network_confidence: (pattern.confidence
                * (1.0 + scale * self.network.learning_velocity * 0.1))
                .min(CONFIDENCE_CEILING),
            prediction_accuracy: (0.5 + 0.5 * learned).min(CONFIDENCE_CEILING),
        }
    }

    /// Fold one observed outcome into a pattern's confidence.
    pub fn record_observation(
        &mut self,
        pattern_id: &str,
        outcome: ObservationOutcome,
    ) -> RiskResult<&CorrelationPattern> {
        let jitter = self.rng.gen_range(-OBSERVATION_JITTER..=OBSERVATION_JITTER);
        let rate = self.network.learning_velocity;
        let pattern = self
            .patterns
            .iter_mut()
            .find(|p| p.pattern_id == pattern_id)
            .ok_or_else(|| RiskError::PatternNotFound(pattern_id.to_string()))?;

        let target = match outcome {
            ObservationOutcome::Confirmed => {
                pattern.historical_occurrences = pattern.historical_occurrences.saturating_add(1);
                1.0
            }
            ObservationOutcome::Refuted => 0.0,
        };
        pattern.confidence = (pattern.confidence + rate * (target - pattern.confidence) + jitter)
            .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

        tracing::debug!(
            pattern = pattern_id,
            ?outcome,
            confidence = pattern.confidence,
            "Recorded pattern observation"
        );
        Ok(pattern)
    }

    /// Run one discovery cycle.
    ///
    /// Grows the simulated network, then, once past the discovery threshold
    /// and with the configured probability, synthesises a pattern between two
    /// distinct random sectors. Returns the audit record when one is created.
    pub fn discover_patterns(&mut self) -> Option<DiscoveryRecord> {
        let growth = self.rng.gen_range(0..=self.growth_per_cycle);
        self.network.customer_count = self.network.customer_count.saturating_add(growth);

        if self.network.customer_count < self.discovery_threshold {
            return None;
        }
        if self.rng.gen::<f64>() >= self.discovery_probability {
            return None;
        }

        let pair: Vec<Sector> = Sector::ALL
            .choose_multiple(&mut self.rng, 2)
            .copied()
            .collect();
        let (primary, secondary) = (pair[0], pair[1]);

        let pattern_id = self.next_discovered_id();
        let pattern = CorrelationPattern {
            pattern_id: pattern_id.clone(),
            sectors: vec![primary, secondary],
            correlation_strength: self.rng.gen_range(0.4..0.7),
            ripple_effect: RippleEffect {
                primary_sector: primary,
                secondary_sectors: vec![secondary],
                impact_delay_hours: self.rng.gen_range(6.0..48.0),
                amplification_factor: self.rng.gen_range(1.0..1.6),
            },
            historical_occurrences: 1,
            confidence: DISCOVERED_CONFIDENCE,
            network_effect: NetworkEffect {
                contributing_sites: 1,
                network_confidence: DISCOVERED_CONFIDENCE,
                prediction_accuracy: 0.5,
            },
        };

        let record = DiscoveryRecord {
            pattern_id,
            sectors: pattern.sectors.clone(),
            network_size: self.network.customer_count,
            discovered_at: Utc::now(),
        };

        tracing::info!(
            pattern = %record.pattern_id,
            primary = %primary,
            secondary = %secondary,
            network_size = record.network_size,
            "Discovered correlation pattern"
        );

        self.patterns.push(pattern);
        self.discoveries.push(record.clone());
        Some(record)
    }

    /// First `discovered-NNNN` id not already taken by a pattern.
    fn next_discovered_id(&self) -> String {
        (self.discoveries.len() + 1..)
            .map(|n| format!("discovered-{n:04}"))
            .find(|id| self.pattern(id).is_none())
            .unwrap_or_else(|| format!("discovered-{}", self.patterns.len() + 1))
    }

    /// Random extra delay for one predicted echo, in `[0, echo_jitter_hours)`.
    pub(crate) fn echo_jitter(&mut self) -> f64 {
        if self.echo_jitter_hours <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(0.0..self.echo_jitter_hours)
    }
}

/// Weighted sum of environmental threshold breaches, capped at 1.0.
///
/// Missing readings contribute nothing.
pub fn stress_factor(factors: &FactorBoard) -> f64 {
    let mut stress = 0.0;
    if factors.value(PM25).is_some_and(|v| v > 25.0) {
        stress += 0.3;
    }
    if factors.value(CO2).is_some_and(|v| v > 800.0) {
        stress += 0.2;
    }
    if factors.value(TEMPERATURE).is_some_and(|v| (v - 21.0).abs() > 3.0) {
        stress += 0.2;
    }
    if factors
        .value(HUMIDITY)
        .is_some_and(|v| !(30.0..=60.0).contains(&v))
    {
        stress += 0.1;
    }
    f64::min(stress, 1.0)
}

#[allow(clippy::too_many_arguments)]
fn seed(
    id: &str,
    sectors: &[Sector],
    strength: f64,
    primary: Sector,
    secondary: &[Sector],
    delay_hours: f64,
    amplification: f64,
    occurrences: u32,
    confidence: f64,
) -> CorrelationPattern {
    CorrelationPattern {
        pattern_id: id.to_string(),
        sectors: sectors.to_vec(),
        correlation_strength: strength,
        ripple_effect: RippleEffect {
            primary_sector: primary,
            secondary_sectors: secondary.to_vec(),
            impact_delay_hours: delay_hours,
            amplification_factor: amplification,
        },
        historical_occurrences: occurrences,
        confidence,
        network_effect: NetworkEffect::default(),
    }
}

/// The built-in seed patterns.
pub fn default_patterns() -> Vec<CorrelationPattern> {
    use Sector::*;

    vec![
        seed(
            "education_healthcare_respiratory",
            &[Education, Healthcare],
            0.82,
            Education,
            &[Healthcare],
            48.0,
            1.4,
            37,
            0.81,
        ),
        seed(
            "office_hospitality_air_quality",
            &[Office, Hospitality, Retail],
            0.71,
            Office,
            &[Hospitality, Retail],
            24.0,
            1.2,
            22,
            0.74,
        ),
        seed(
            "manufacturing_logistics_thermal",
            &[Manufacturing, Logistics, Transportation],
            0.77,
            Manufacturing,
            &[Logistics, Transportation],
            12.0,
            1.6,
            29,
            0.79,
        ),
        seed(
            "transportation_commute_fatigue",
            &[Transportation, Office, Education],
            0.64,
            Transportation,
            &[Office, Education],
            6.0,
            1.1,
            18,
            0.68,
        ),
        seed(
            "healthcare_absence_wave",
            &[Healthcare, Office, Retail],
            0.69,
            Healthcare,
            &[Office, Retail],
            72.0,
            1.3,
            25,
            0.72,
        ),
        seed(
            "retail_hospitality_footfall",
            &[Retail, Hospitality],
            0.58,
            Retail,
            &[Hospitality],
            18.0,
            1.15,
            14,
            0.63,
        ),
    ]
}
