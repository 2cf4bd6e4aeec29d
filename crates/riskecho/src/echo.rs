//! Echo propagation: predicts how a source event in one sector ripples into others.

use serde::{Deserialize, Serialize};

use crate::library::{CorrelationLibrary, Sector};

/// Share of a pattern's confidence carried into each predicted echo.
pub const ECHO_CONFIDENCE_DECAY: f64 = 0.9;

/// Share of the impact delay available for mitigation.
pub const MITIGATION_WINDOW_RATIO: f64 = 0.7;

/// Upper bound of the cascade risk score.
pub const MAX_CASCADE_RISK: f64 = 100.0;

/// An observed risk event used as the origin of an echo prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    pub id: String,
    pub kind: String,
    pub magnitude: f64,
}

impl SourceEvent {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, magnitude: f64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            magnitude,
        }
    }
}

/// A delayed, amplified impact predicted in another sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedEcho {
    pub target_sector: Sector,
    pub pattern_id: String,
    pub delay_hours: f64,
    pub expected_impact: f64,
    pub confidence: f64,
    pub mitigation_window_hours: f64,
}

/// Result of one echo prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoDetection {
    pub source_event: SourceEvent,
    pub source_sector: Sector,
    pub predicted_echoes: Vec<PredictedEcho>,
    pub cascade_risk: f64,
}

/// Predict the echoes of `event` originating in `sector`.
///
/// Every pattern whose ripple starts in `sector` contributes one echo per
/// secondary sector. Confidence comes from the stored pattern, without the
/// stress boost that `detect_cross_sector_patterns` applies. Delays carry
/// random jitter drawn from the library's random source; everything else is
/// deterministic.
pub fn predict_echo_effects(
    library: &mut CorrelationLibrary,
    event: &SourceEvent,
    sector: Sector,
) -> EchoDetection {
    let relevant: Vec<_> = library
        .patterns()
        .iter()
        .filter(|p| p.ripple_effect.primary_sector == sector)
        .cloned()
        .collect();

    let mut predicted_echoes = Vec::new();
    for pattern in &relevant {
        let ripple = &pattern.ripple_effect;
        for target in &ripple.secondary_sectors {
            predicted_echoes.push(PredictedEcho {
                target_sector: *target,
                pattern_id: pattern.pattern_id.clone(),
                delay_hours: ripple.impact_delay_hours + library.echo_jitter(),
                expected_impact: event.magnitude * ripple.amplification_factor,
                confidence: pattern.confidence * ECHO_CONFIDENCE_DECAY,
                mitigation_window_hours: ripple.impact_delay_hours * MITIGATION_WINDOW_RATIO,
            });
        }
    }

    let cascade_risk = cascade_risk(&predicted_echoes);
    tracing::debug!(
        event = %event.id,
        %sector,
        echoes = predicted_echoes.len(),
        cascade_risk,
        "Predicted echo effects"
    );

    EchoDetection {
        source_event: event.clone(),
        source_sector: sector,
        predicted_echoes,
        cascade_risk,
    }
}

/// Mean of `expected_impact * confidence` across echoes, clamped to `[0, 100]`.
///
/// No echoes, or a mean that is not a number, yields 0.
pub fn cascade_risk(echoes: &[PredictedEcho]) -> f64 {
    if echoes.is_empty() {
        return 0.0;
    }
    let total: f64 = echoes
        .iter()
        .map(|e| e.expected_impact * e.confidence)
        .sum();
    let mean = total / echoes.len() as f64;
    if mean.is_nan() {
        return 0.0;
    }
    mean.clamp(0.0, MAX_CASCADE_RISK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{default_patterns, LibraryConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn library() -> CorrelationLibrary {
        CorrelationLibrary::initialize_with_rng(LibraryConfig::default(), StdRng::seed_from_u64(11))
            .unwrap()
    }

    fn echo(impact: f64, confidence: f64) -> PredictedEcho {
        PredictedEcho {
            target_sector: Sector::Retail,
            pattern_id: "p".to_string(),
            delay_hours: 1.0,
            expected_impact: impact,
            confidence,
            mitigation_window_hours: 0.7,
        }
    }

    #[test]
    fn test_echo_fields_follow_pattern() {
        let mut library = library();
        let event = SourceEvent::new("evt-1", "pile_up_pattern", 10.0);
        let detection = predict_echo_effects(&mut library, &event, Sector::Office);

        let pattern = default_patterns()
            .into_iter()
            .find(|p| p.pattern_id == "office_hospitality_air_quality")
            .unwrap();
        assert_eq!(detection.predicted_echoes.len(), 2);
        for e in &detection.predicted_echoes {
            assert!(pattern.ripple_effect.secondary_sectors.contains(&e.target_sector));
            assert!((e.expected_impact - 12.0).abs() < 1e-9);
            assert!((e.confidence - 0.74 * 0.9).abs() < 1e-9);
            assert!((e.mitigation_window_hours - 24.0 * 0.7).abs() < 1e-9);
            assert!(e.delay_hours >= 24.0 && e.delay_hours < 30.0);
        }
        let expected_risk = 12.0 * 0.74 * 0.9;
        assert!((detection.cascade_risk - expected_risk).abs() < 1e-9);
    }

    #[test]
    fn test_zero_magnitude_yields_zero_impact() {
        let mut library = library();
        let event = SourceEvent::new("evt-0", "calm", 0.0);
        for sector in Sector::ALL {
            let detection = predict_echo_effects(&mut library, &event, sector);
            assert!(detection.predicted_echoes.iter().all(|e| e.expected_impact == 0.0));
            assert_eq!(detection.cascade_risk, 0.0);
        }
    }

    #[test]
    fn test_sector_without_ripples_has_no_echoes() {
        let mut library = library();
        let event = SourceEvent::new("evt-2", "heat", 50.0);
        let detection = predict_echo_effects(&mut library, &event, Sector::Logistics);
        assert!(detection.predicted_echoes.is_empty());
        assert_eq!(detection.cascade_risk, 0.0);
    }

    #[test]
    fn test_cascade_risk_is_clamped() {
        assert_eq!(cascade_risk(&[]), 0.0);
        assert_eq!(cascade_risk(&[echo(1e9, 0.9)]), MAX_CASCADE_RISK);
        assert_eq!(cascade_risk(&[echo(-500.0, 0.9)]), 0.0);
        assert_eq!(cascade_risk(&[echo(f64::MAX, 1.0), echo(f64::MAX, 1.0)]), MAX_CASCADE_RISK);
        assert_eq!(cascade_risk(&[echo(f64::MAX, 1.0), echo(-f64::MAX, 1.0), echo(f64::MAX, 1.0)]), MAX_CASCADE_RISK);

        let magnitudes = [-1e300, -42.0, 0.0, 3.5, 77.0, 1e300];
        let confidences = [0.0, 0.25, 1.0, 2.0];
        for m in magnitudes {
            for c in confidences {
                let risk = cascade_risk(&[echo(m, c), echo(m / 2.0, c)]);
                assert!((0.0..=MAX_CASCADE_RISK).contains(&risk), "m={m} c={c} risk={risk}");
            }
        }
    }
}
