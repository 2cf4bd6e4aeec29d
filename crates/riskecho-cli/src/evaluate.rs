//! One-shot evaluation of a fixed set of readings.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use riskecho::{
    AlertSnapshot, EngineConfig, FactorDomain, ParameterSample, RiskAggregator, RiskFactor,
    TickOutcome,
};

/// One reading or an oldest-first series of readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Readings {
    Single(f64),
    Series(Vec<f64>),
}

impl Readings {
    fn values(&self) -> &[f64] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Series(vs) => vs,
        }
    }
}

/// Input document for `evaluate --input`: factor id to readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub factors: BTreeMap<String, Readings>,
}

impl EvaluationInput {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid input {}", path.display()))
    }

    /// Build from repeated `id=value` arguments. Repeating an id appends to its series.
    pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
        let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for arg in args {
            let (id, value) = parse_factor_arg(arg)?;
            series.entry(id).or_default().push(value);
        }
        Ok(Self {
            factors: series
                .into_iter()
                .map(|(id, values)| (id, Readings::Series(values)))
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// Parse `id=value`.
pub fn parse_factor_arg(arg: &str) -> anyhow::Result<(String, f64)> {
    let Some((id, value)) = arg.split_once('=') else {
        bail!("expected id=value, got '{arg}'");
    };
    let id = id.trim();
    if id.is_empty() {
        bail!("missing factor id in '{arg}'");
    }
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid value in '{arg}'"))?;
    Ok((id.to_string(), value))
}

/// Ingest every reading, tick once and return the snapshot.
///
/// Series are stamped one second apart, ending now.
pub fn evaluate(config: &EngineConfig, input: &EvaluationInput) -> anyhow::Result<Arc<AlertSnapshot>> {
    let aggregator = RiskAggregator::from_config(config)?;
    let now = Utc::now();

    for (id, readings) in &input.factors {
        let values = readings.values();
        for (i, value) in values.iter().enumerate() {
            let offset = (values.len() - 1 - i) as i64;
            let timestamp = now - Duration::seconds(offset);
            match FactorDomain::of(id) {
                Some(domain) => {
                    aggregator.ingest_factor(RiskFactor::new(id.as_str(), domain, *value, timestamp))?;
                }
                None => {
                    aggregator.ingest_sample(ParameterSample::new(id.as_str(), *value, timestamp))?;
                }
            }
        }
    }

    match aggregator.tick()? {
        TickOutcome::Completed(snapshot) => Ok(snapshot),
        TickOutcome::Paused => bail!("aggregator unexpectedly paused"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskecho::{AlertType, RiskLevel};

    #[test]
    fn test_parse_factor_arg() {
        assert_eq!(parse_factor_arg("co2=900").unwrap(), ("co2".to_string(), 900.0));
        assert_eq!(
            parse_factor_arg(" geomagnetic.kpIndex = 4.5 ").unwrap(),
            ("geomagnetic.kpIndex".to_string(), 4.5)
        );
        assert!(parse_factor_arg("co2").is_err());
        assert!(parse_factor_arg("=4").is_err());
        assert!(parse_factor_arg("co2=high").is_err());
    }

    #[test]
    fn test_repeated_args_form_series() {
        let args: Vec<String> = ["co2=700", "co2=710", "co2=715", "co2=900"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let input = EvaluationInput::from_args(&args).unwrap();
        assert_eq!(
            input.factors["co2"],
            Readings::Series(vec![700.0, 710.0, 715.0, 900.0])
        );
    }

    #[test]
    fn test_evaluate_sudden_co2() {
        let args: Vec<String> = ["co2=700", "co2=710", "co2=715", "co2=900"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let input = EvaluationInput::from_args(&args).unwrap();
        let snapshot = evaluate(&EngineConfig::default(), &input).unwrap();
        let top = &snapshot.acceleration_patterns[0];
        assert_eq!(top.parameter, "co2");
        assert_eq!(top.risk_level, RiskLevel::Critical);
        assert_eq!(top.alert_type, AlertType::SuddenShift);
    }

    #[test]
    fn test_input_accepts_single_values() {
        let input: EvaluationInput = serde_json::from_str(
            r#"{"factors": {"geomagnetic.kpIndex": 4, "pm25": [18, 22]}}"#,
        )
        .unwrap();
        let snapshot = evaluate(&EngineConfig::default(), &input).unwrap();
        assert_eq!(snapshot.compound_alerts[0].alert_type, "pile_up_pattern");
    }
}
