//! Rate-of-change classification and first-derivative alert ranking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    AccelerationPattern, AlertType, DerivativeSet, FirstDerivativeAlert, RiskLevel,
};
use crate::window::WindowReading;

/// Criticality score of a critical pattern's alert.
pub const CRITICAL_SCORE: u8 = 95;

/// Criticality score of a high pattern's alert.
pub const HIGH_SCORE: u8 = 75;

/// Risk window reported for sudden shifts.
pub const SUDDEN_RISK_WINDOW: &str = "5–15 min";

/// Risk window reported for every other alert.
pub const TREND_RISK_WINDOW: &str = "15–30 min";

/// Classification thresholds for one parameter, in the parameter's own units per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterThresholds {
    pub sudden_change: f64,
    pub accel_high: f64,
    pub accel_moderate: f64,
    pub jerk: f64,
}

impl ParameterThresholds {
    pub const fn new(sudden_change: f64, accel_high: f64, accel_moderate: f64, jerk: f64) -> Self {
        Self {
            sudden_change,
            accel_high,
            accel_moderate,
            jerk,
        }
    }

    /// Check that every threshold is finite, non-negative, and the tiers are ordered.
    pub fn validate(&self) -> Result<(), String> {
        let all = [self.sudden_change, self.accel_high, self.accel_moderate, self.jerk];
        if all.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err("thresholds must be finite and non-negative".to_string());
        }
        if self.accel_moderate > self.accel_high {
            return Err(format!(
                "accel_moderate ({}) exceeds accel_high ({})",
                self.accel_moderate, self.accel_high
            ));
        }
        Ok(())
    }
}

/// Classify one parameter's derivatives.
///
/// A velocity above the sudden-change threshold is critical regardless of
/// the other orders. Otherwise the acceleration sets the tier and the alert
/// type prefers jerk, then acceleration, then velocity.
pub fn classify(
    parameter: &str,
    derivatives: DerivativeSet,
    thresholds: &ParameterThresholds,
) -> AccelerationPattern {
    let DerivativeSet {
        velocity,
        acceleration,
        jerk,
    } = derivatives;

    let sudden_change = velocity.abs() > thresholds.sudden_change;

    let (risk_level, alert_type) = if sudden_change {
        (RiskLevel::Critical, AlertType::SuddenShift)
    } else {
        let level = if acceleration.abs() > thresholds.accel_high {
            RiskLevel::High
        } else if acceleration.abs() > thresholds.accel_moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        };
        let kind = if jerk.abs() > thresholds.jerk {
            AlertType::Jerk
        } else if acceleration.abs() > thresholds.accel_moderate {
            AlertType::Acceleration
        } else {
            AlertType::Velocity
        };
        (level, kind)
    };

    AccelerationPattern {
        parameter: parameter.to_string(),
        velocity,
        acceleration,
        jerk,
        sudden_change,
        risk_level,
        alert_type,
    }
}

/// Classify every window that has thresholds configured.
///
/// Low-risk patterns are dropped. The result is ranked by risk level,
/// highest first; ties keep the input order.
pub fn classify_readings(
    readings: &[WindowReading],
    thresholds: &BTreeMap<String, ParameterThresholds>,
) -> Vec<AccelerationPattern> {
    let mut patterns: Vec<AccelerationPattern> = readings
        .iter()
        .filter_map(|reading| {
            let Some(limits) = thresholds.get(&reading.parameter) else {
                tracing::trace!(parameter = %reading.parameter, "No thresholds configured");
                return None;
            };
            Some(classify(&reading.parameter, reading.derivatives, limits))
        })
        .filter(|p| p.risk_level != RiskLevel::Low)
        .collect();

    patterns.sort_by(|a, b| b.risk_level.cmp(&a.risk_level));
    patterns
}

/// Convert high and critical patterns into ranked first-derivative alerts.
pub fn first_derivative_alerts(patterns: &[AccelerationPattern]) -> Vec<FirstDerivativeAlert> {
    let mut alerts: Vec<FirstDerivativeAlert> = patterns
        .iter()
        .filter_map(|pattern| {
            let criticality_score = match pattern.risk_level {
                RiskLevel::Critical => CRITICAL_SCORE,
                RiskLevel::High => HIGH_SCORE,
                _ => return None,
            };
            let risk_window = if pattern.sudden_change {
                SUDDEN_RISK_WINDOW
            } else {
                TREND_RISK_WINDOW
            };
            Some(FirstDerivativeAlert {
                id: format!("fda-{}", pattern.parameter),
                parameter: pattern.parameter.clone(),
                derivative_value: pattern.velocity,
                alert_reason: alert_reason(pattern),
                risk_window: risk_window.to_string(),
                criticality_score,
            })
        })
        .collect();

    alerts.sort_by(|a, b| b.criticality_score.cmp(&a.criticality_score));
    alerts
}

fn alert_reason(pattern: &AccelerationPattern) -> String {
    let p = &pattern.parameter;
    match pattern.alert_type {
        AlertType::SuddenShift => format!(
            "Sudden shift in {p}: changed by {:.2} in one tick",
            pattern.velocity
        ),
        AlertType::Jerk => format!(
            "Erratic change in {p}: jerk {:.2}, acceleration {:.2}",
            pattern.jerk, pattern.acceleration
        ),
        AlertType::Acceleration => format!(
            "Accelerating change in {p}: acceleration {:.2}",
            pattern.acceleration
        ),
        AlertType::Velocity => format!("Sustained drift in {p}: velocity {:.2}", pattern.velocity),
    }
}
