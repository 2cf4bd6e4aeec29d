//! Core data types for parameter samples, risk factors, and derived alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known factor and parameter identifiers supplied by the collaborator sources.
pub mod factor_ids {
    pub const CO2: &str = "co2";
    pub const PM25: &str = "pm25";
    pub const TEMPERATURE: &str = "temperature";
    pub const LIGHT: &str = "light";
    pub const NOISE: &str = "noise";
    pub const HUMIDITY: &str = "humidity";

    pub const KP_INDEX: &str = "geomagnetic.kpIndex";
    pub const SUNSPOT_NUMBER: &str = "solar.sunspotNumber";
    pub const POLLEN_LEVEL: &str = "seasonal.pollenLevel";
    pub const SEISMIC_RISK: &str = "seismic.riskLevel";
    pub const LUNAR_ILLUMINATION: &str = "seasonal.lunarIllumination";

    pub const HVAC_LOAD: &str = "hvacLoad";
    pub const OCCUPANCY: &str = "occupancy";
    pub const EQUIPMENT_AGE: &str = "equipmentAge";

    /// Environmental reading fields, each an independent parameter stream.
    pub const ENVIRONMENTAL: &[&str] = &[CO2, PM25, TEMPERATURE, LIGHT, NOISE, HUMIDITY];

    /// Space-weather and seasonal fields.
    pub const COSMIC: &[&str] = &[
        KP_INDEX,
        SUNSPOT_NUMBER,
        POLLEN_LEVEL,
        SEISMIC_RISK,
        LUNAR_ILLUMINATION,
    ];

    /// Building operational context fields.
    pub const OPERATIONAL: &[&str] = &[HVAC_LOAD, OCCUPANCY, EQUIPMENT_AGE];
}

/// A single timestamped reading of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSample {
    pub parameter_id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl ParameterSample {
    pub fn new(parameter_id: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            parameter_id: parameter_id.into(),
            value,
            timestamp,
        }
    }
}

/// First, second and third finite-difference derivatives of a parameter.
///
/// Orders without enough history are reported as `0.0`, never absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivativeSet {
    pub velocity: f64,
    pub acceleration: f64,
    pub jerk: f64,
}

/// Which collaborator a risk factor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorDomain {
    Environmental,
    Cosmic,
    Operational,
}

impl FactorDomain {
    /// Infer the domain of a well-known factor id.
    pub fn of(factor_id: &str) -> Option<Self> {
        if factor_ids::ENVIRONMENTAL.contains(&factor_id) {
            Some(Self::Environmental)
        } else if factor_ids::COSMIC.contains(&factor_id) {
            Some(Self::Cosmic)
        } else if factor_ids::OPERATIONAL.contains(&factor_id) {
            Some(Self::Operational)
        } else {
            None
        }
    }

    /// Whether readings from this domain are tracked through derivative windows.
    pub fn is_derivative_tracked(self) -> bool {
        matches!(self, Self::Environmental | Self::Cosmic)
    }
}

/// The latest value of one domain-tagged measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub id: String,
    pub domain: FactorDomain,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl RiskFactor {
    pub fn new(
        id: impl Into<String>,
        domain: FactorDomain,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            domain,
            value,
            timestamp,
        }
    }
}

/// Risk tier of a classified parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

/// Which derivative drove a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SuddenShift,
    Jerk,
    Acceleration,
    Velocity,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuddenShift => "sudden_shift",
            Self::Jerk => "jerk",
            Self::Acceleration => "acceleration",
            Self::Velocity => "velocity",
        }
    }
}

/// Rate-of-change classification of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerationPattern {
    pub parameter: String,
    pub velocity: f64,
    pub acceleration: f64,
    pub jerk: f64,
    pub sudden_change: bool,
    pub risk_level: RiskLevel,
    pub alert_type: AlertType,
}

/// Ranked alert raised for a high or critical acceleration pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstDerivativeAlert {
    pub id: String,
    pub parameter: String,
    pub derivative_value: f64,
    pub alert_reason: String,
    pub risk_window: String,
    pub criticality_score: u8,
}

/// Severity of a compound alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ordinal used for ranking: critical=4, high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

/// A factor that satisfied its rule clause when a compound alert fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredFactor {
    pub factor: String,
    pub value: f64,
    pub condition: String,
}

/// Alert produced when every clause of a compound rule holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: Severity,
    pub factors: Vec<TriggeredFactor>,
    pub multiplier: f64,
    pub probability: f64,
    pub time_to_impact: String,
    pub prevention_actions: Vec<String>,
}

/// Errors that can occur in the risk engine.
#[derive(thiserror::Error, Debug)]
pub enum RiskError {
    #[error("Invalid window capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Correlation library has not been initialized")]
    LibraryUninitialized,

    #[error("Correlation pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Unknown sector: {0}")]
    UnknownSector(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type RiskResult<T> = Result<T, RiskError>;
