//! Engine configuration: window sizing, classification thresholds, the
//! compound-rule catalogue, correlation library seeding, and tick cadence.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::ParameterThresholds;
use crate::compound::{default_rules, validate_rules, CompoundRule};
use crate::derivative::DerivativeMode;
use crate::library::{LibraryConfig, Sector};
use crate::types::factor_ids::*;
use crate::types::{RiskError, RiskResult};
use crate::window::DEFAULT_WINDOW_CAPACITY;

/// Tick loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub tick_interval_ms: u64,
    /// Sector in which compound alerts are treated as echo source events.
    pub home_sector: Sector,
    /// How long a collaborator fetch may take before the tick goes without it.
    pub fetch_timeout_ms: u64,
    /// Run a pattern discovery cycle every this many ticks. 0 disables discovery.
    pub discovery_interval_ticks: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            home_sector: Sector::Office,
            fetch_timeout_ms: 1500,
            discovery_interval_ticks: 10,
        }
    }
}

/// Complete engine configuration. Every section has defaults, so a file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window_capacity: usize,
    pub derivative_mode: DerivativeMode,
    pub thresholds: BTreeMap<String, ParameterThresholds>,
    pub rules: Vec<CompoundRule>,
    pub library: LibraryConfig,
    pub aggregator: AggregatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            derivative_mode: DerivativeMode::default(),
            thresholds: default_thresholds(),
            rules: default_rules(),
            library: LibraryConfig::default(),
            aggregator: AggregatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file(path: &Path) -> RiskResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(raw: &str) -> RiskResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> RiskResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.window_capacity == 0 {
            return Err(RiskError::InvalidConfig(
                "window_capacity must be at least 1".to_string(),
            ));
        }
        if self.aggregator.tick_interval_ms == 0 {
            return Err(RiskError::InvalidConfig(
                "aggregator.tick_interval_ms must be positive".to_string(),
            ));
        }
        for (parameter, limits) in &self.thresholds {
            limits
                .validate()
                .map_err(|e| RiskError::InvalidConfig(format!("thresholds.{parameter}: {e}")))?;
        }
        validate_rules(&self.rules).map_err(RiskError::InvalidConfig)?;
        self.library
            .validate()
            .map_err(|e| RiskError::InvalidConfig(format!("library: {e}")))?;
        Ok(())
    }
}

/// Built-in classification thresholds for every derivative-tracked stream.
pub fn default_thresholds() -> BTreeMap<String, ParameterThresholds> {
    [
        (CO2, ParameterThresholds::new(50.0, 20.0, 10.0, 15.0)),
        (PM25, ParameterThresholds::new(10.0, 5.0, 2.0, 4.0)),
        (TEMPERATURE, ParameterThresholds::new(2.0, 1.0, 0.5, 0.8)),
        (LIGHT, ParameterThresholds::new(200.0, 100.0, 50.0, 80.0)),
        (NOISE, ParameterThresholds::new(15.0, 8.0, 4.0, 6.0)),
        (HUMIDITY, ParameterThresholds::new(10.0, 5.0, 2.5, 4.0)),
        (KP_INDEX, ParameterThresholds::new(3.0, 2.0, 1.0, 1.5)),
        (SUNSPOT_NUMBER, ParameterThresholds::new(40.0, 20.0, 10.0, 15.0)),
    ]
    .into_iter()
    .map(|(id, limits)| (id.to_string(), limits))
    .collect()
}
