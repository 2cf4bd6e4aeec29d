//! Multi-factor compound risk rules.
//!
//! The catalogue is a list of declarative records. Every rule is evaluated by
//! the same engine: it fires only when all of its clauses hold against the
//! current factor board, and its consequence fields are constants of the rule.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::FactorBoard;
use crate::types::factor_ids::*;
use crate::types::{CompoundAlert, RiskError, RiskResult, Severity, TriggeredFactor};

/// Threshold comparison used by a rule clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Ge => value >= threshold,
            Self::Lt => value < threshold,
            Self::Le => value <= threshold,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// One threshold predicate over a single factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub factor: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl Clause {
    pub fn new(factor: &str, comparison: Comparison, threshold: f64) -> Self {
        Self {
            factor: factor.to_string(),
            comparison,
            threshold,
        }
    }

    /// Evaluate against the board. A missing factor makes the clause false.
    pub fn evaluate(&self, board: &FactorBoard) -> Option<TriggeredFactor> {
        let value = board.value(&self.factor)?;
        if !self.comparison.holds(value, self.threshold) {
            return None;
        }
        Some(TriggeredFactor {
            factor: self.factor.clone(),
            value,
            condition: self.to_string(),
        })
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.factor, self.comparison.symbol(), self.threshold)
    }
}

/// A conjunction of clauses plus the static consequence it raises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub clauses: Vec<Clause>,
    pub severity: Severity,
    pub probability: f64,
    pub multiplier: f64,
    pub time_to_impact: String,
    #[serde(default)]
    pub prevention_actions: Vec<String>,
}

impl CompoundRule {
    /// Evaluate every clause; returns the triggering factors only if all hold.
    pub fn evaluate(&self, board: &FactorBoard) -> Option<Vec<TriggeredFactor>> {
        self.clauses.iter().map(|c| c.evaluate(board)).collect()
    }

    fn to_alert(&self, factors: Vec<TriggeredFactor>) -> CompoundAlert {
        CompoundAlert {
            id: format!("compound-{}", self.id),
            alert_type: self.id.clone(),
            severity: self.severity,
            factors,
            multiplier: self.multiplier,
            probability: self.probability,
            time_to_impact: self.time_to_impact.clone(),
            prevention_actions: self.prevention_actions.clone(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("rule id must not be empty".to_string());
        }
        if self.clauses.is_empty() {
            return Err(format!("rule '{}' has no clauses", self.id));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(format!("rule '{}' probability must be in [0, 1]", self.id));
        }
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(format!("rule '{}' multiplier must be finite and non-negative", self.id));
        }
        if let Some(c) = self.clauses.iter().find(|c| !c.threshold.is_finite()) {
            return Err(format!("rule '{}' clause '{}' has a non-finite threshold", self.id, c.factor));
        }
        Ok(())
    }
}

/// Evaluates the compound-rule catalogue against a factor snapshot.
#[derive(Debug, Clone)]
pub struct CompoundRiskCorrelator {
    rules: Vec<CompoundRule>,
}

impl CompoundRiskCorrelator {
    /// Build a correlator from a validated catalogue. Rule ids must be unique.
    pub fn new(rules: Vec<CompoundRule>) -> RiskResult<Self> {
        validate_rules(&rules).map_err(RiskError::InvalidConfig)?;
        Ok(Self { rules })
    }

    pub fn with_default_rules() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// The catalogue in declaration order.
    pub fn rules(&self) -> &[CompoundRule] {
        &self.rules
    }

    /// Fire every rule whose clauses all hold.
    ///
    /// Alerts are ranked by severity, highest first; rules of equal severity
    /// keep their declaration order. An empty result means nothing fired.
    pub fn evaluate(&self, board: &FactorBoard) -> Vec<CompoundAlert> {
        let mut alerts: Vec<CompoundAlert> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(board).map(|factors| rule.to_alert(factors)))
            .collect();

        alerts.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));

        if !alerts.is_empty() {
            tracing::debug!(
                fired = alerts.len(),
                top = %alerts[0].alert_type,
                "Compound rules fired"
            );
        }
        alerts
    }
}

impl Default for CompoundRiskCorrelator {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// Check a catalogue for structural errors and duplicate ids.
pub fn validate_rules(rules: &[CompoundRule]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for rule in rules {
        rule.validate()?;
        if !seen.insert(rule.id.as_str()) {
            return Err(format!("duplicate rule id '{}'", rule.id));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn rule(
    id: &str,
    description: &str,
    clauses: Vec<Clause>,
    severity: Severity,
    probability: f64,
    multiplier: f64,
    time_to_impact: &str,
    prevention_actions: &[&str],
) -> CompoundRule {
    CompoundRule {
        id: id.to_string(),
        description: description.to_string(),
        clauses,
        severity,
        probability,
        multiplier,
        time_to_impact: time_to_impact.to_string(),
        prevention_actions: prevention_actions.iter().map(|s| s.to_string()).collect(),
    }
}

/// The built-in compound-rule catalogue.
pub fn default_rules() -> Vec<CompoundRule> {
    use Comparison::*;

    vec![
        rule(
            "pile_up_pattern",
            "Geomagnetic disturbance compounding fine-particulate exposure",
            vec![Clause::new(KP_INDEX, Ge, 4.0), Clause::new(PM25, Gt, 20.0)],
            Severity::Critical,
            0.78,
            8.2,
            "2–6 hours",
            &[
                "Switch air handling to maximum filtration",
                "Postpone high-exertion and safety-critical work",
                "Notify the facility health officer",
            ],
        ),
        rule(
            "cognitive_overload",
            "High indoor CO2 during a strong geomagnetic storm",
            vec![Clause::new(CO2, Gt, 1000.0), Clause::new(KP_INDEX, Ge, 5.0)],
            Severity::Critical,
            0.72,
            6.5,
            "30–90 min",
            &[
                "Increase fresh-air exchange immediately",
                "Reschedule decision-critical meetings",
            ],
        ),
        rule(
            "respiratory_cascade",
            "Particulates, pollen and humidity combining into respiratory load",
            vec![
                Clause::new(PM25, Gt, 35.0),
                Clause::new(POLLEN_LEVEL, Ge, 7.0),
                Clause::new(HUMIDITY, Gt, 60.0),
            ],
            Severity::High,
            0.68,
            4.8,
            "1–3 hours",
            &[
                "Run dehumidification alongside filtration",
                "Keep windows closed until pollen drops",
                "Brief staff with respiratory sensitivities",
            ],
        ),
        rule(
            "crowded_air_stagnation",
            "High occupancy with ventilation falling behind",
            vec![Clause::new(OCCUPANCY, Gt, 80.0), Clause::new(CO2, Gt, 800.0)],
            Severity::High,
            0.64,
            3.2,
            "30–60 min",
            &["Open additional ventilation zones", "Spread occupants across rooms"],
        ),
        rule(
            "thermal_equipment_stress",
            "Heat load on ageing HVAC equipment",
            vec![
                Clause::new(TEMPERATURE, Gt, 26.0),
                Clause::new(HVAC_LOAD, Gt, 85.0),
                Clause::new(EQUIPMENT_AGE, Gt, 10.0),
            ],
            Severity::High,
            0.58,
            3.9,
            "4–12 hours",
            &[
                "Schedule preventive HVAC inspection",
                "Shed non-essential cooling load",
            ],
        ),
        rule(
            "solar_storm_sensitivity",
            "Active solar cycle coinciding with geomagnetic unrest",
            vec![
                Clause::new(SUNSPOT_NUMBER, Gt, 150.0),
                Clause::new(KP_INDEX, Ge, 4.0),
            ],
            Severity::Medium,
            0.45,
            2.6,
            "6–24 hours",
            &["Check backups for sensitive electronics", "Monitor staff fatigue reports"],
        ),
        rule(
            "sleep_disruption",
            "Near-full moon with elevated ambient noise",
            vec![
                Clause::new(LUNAR_ILLUMINATION, Ge, 0.9),
                Clause::new(NOISE, Gt, 55.0),
            ],
            Severity::Medium,
            0.41,
            2.4,
            "overnight",
            &["Reduce night-time noise sources", "Dim lighting in rest areas"],
        ),
        rule(
            "seismic_unease",
            "Raised seismic risk with loud surroundings",
            vec![Clause::new(SEISMIC_RISK, Ge, 6.0), Clause::new(NOISE, Gt, 70.0)],
            Severity::Medium,
            0.38,
            2.1,
            "1–6 hours",
            &["Review evacuation routes", "Secure loose equipment"],
        ),
        rule(
            "static_discharge",
            "Dry, warm air raising static discharge risk",
            vec![
                Clause::new(HUMIDITY, Lt, 25.0),
                Clause::new(TEMPERATURE, Gt, 24.0),
            ],
            Severity::Low,
            0.30,
            1.6,
            "ongoing",
            &["Raise humidification set-point", "Use grounding mats near electronics"],
        ),
    ]
}
