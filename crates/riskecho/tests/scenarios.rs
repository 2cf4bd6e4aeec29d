//! End-to-end scenarios for the risk aggregator.
//!
//! Drives ingestion, ticking, compound rules and echo prediction through the
//! public API only.

use chrono::{DateTime, Duration, TimeZone, Utc};

use riskecho::factor_ids::*;
use riskecho::*;

// ─────────────────────── helpers ───────────────────────

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
}

fn seeded_config(seed: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.library.seed = Some(seed);
    config
}

fn aggregator() -> RiskAggregator {
    RiskAggregator::from_config(&seeded_config(17)).unwrap()
}

fn factor(id: &str, value: f64, t: i64) -> RiskFactor {
    let domain = FactorDomain::of(id).expect("well-known factor");
    RiskFactor::new(id, domain, value, at(t))
}

fn completed(outcome: TickOutcome) -> std::sync::Arc<AlertSnapshot> {
    match outcome {
        TickOutcome::Completed(snapshot) => snapshot,
        TickOutcome::Paused => panic!("expected a completed tick"),
    }
}

// ═══════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════

#[test]
fn test_spike_classified_as_sudden_shift() {
    let agg = aggregator();
    for (i, v) in [700.0, 710.0, 715.0, 900.0].into_iter().enumerate() {
        agg.ingest_sample(ParameterSample::new(CO2, v, at(i as i64))).unwrap();
    }

    let derivatives = agg.window(CO2).unwrap().derivatives();
    assert_eq!(derivatives.velocity, 185.0);
    assert_eq!(derivatives.acceleration, 180.0);

    let snapshot = completed(agg.tick().unwrap());
    let pattern = &snapshot.acceleration_patterns[0];
    assert_eq!(pattern.parameter, CO2);
    assert_eq!(pattern.risk_level, RiskLevel::Critical);
    assert_eq!(pattern.alert_type, AlertType::SuddenShift);

    let alert = &snapshot.first_derivative_alerts[0];
    assert_eq!(alert.criticality_score, 95);
    assert_eq!(alert.risk_window, "5–15 min");
    assert_eq!(alert.derivative_value, 185.0);
    assert_eq!(snapshot.status(), SnapshotStatus::Anomalies);
}

#[test]
fn test_pile_up_pattern_fires_and_echoes() {
    let agg = aggregator();
    agg.ingest_factor(factor(PM25, 22.0, 0)).unwrap();
    agg.ingest_factor(factor(KP_INDEX, 4.0, 0)).unwrap();

    let snapshot = completed(agg.tick().unwrap());
    assert_eq!(snapshot.compound_alerts.len(), 1);
    let alert = &snapshot.compound_alerts[0];
    assert_eq!(alert.alert_type, "pile_up_pattern");
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.multiplier, 8.2);

    let echo = snapshot.echo.as_ref().expect("compound alert should seed an echo");
    assert_eq!(echo.source_sector, agg.home_sector());
    assert_eq!(echo.source_event.kind, "pile_up_pattern");
    assert!(!echo.predicted_echoes.is_empty());
    assert!((0.0..=100.0).contains(&echo.cascade_risk));
}

#[test]
fn test_pile_up_pattern_from_collaborator_field_names() {
    let agg = aggregator();
    agg.ingest_factor(RiskFactor::new("pm25", FactorDomain::Environmental, 22.0, at(0)))
        .unwrap();
    agg.ingest_factor(RiskFactor::new("geomagnetic.kpIndex", FactorDomain::Cosmic, 4.0, at(0)))
        .unwrap();

    let snapshot = completed(agg.tick().unwrap());
    assert_eq!(snapshot.compound_alerts.len(), 1);
    assert_eq!(snapshot.compound_alerts[0].alert_type, "pile_up_pattern");
    assert_eq!(FactorDomain::of("hvacLoad"), Some(FactorDomain::Operational));
    assert_eq!(FactorDomain::of("equipmentAge"), Some(FactorDomain::Operational));
    assert_eq!(FactorDomain::of("seasonal.lunarIllumination"), Some(FactorDomain::Cosmic));
}

#[test]
fn test_custom_rule_fires_on_raw_samples() {
    let mut config = seeded_config(5);
    config.rules = vec![CompoundRule {
        id: "radon_exposure".to_string(),
        description: "Radon above action level".to_string(),
        clauses: vec![Clause::new("radon", Comparison::Gt, 100.0)],
        severity: Severity::High,
        probability: 0.5,
        multiplier: 2.0,
        time_to_impact: "hours".to_string(),
        prevention_actions: vec!["Ventilate".to_string()],
    }];
    let agg = RiskAggregator::from_config(&config).unwrap();

    agg.ingest_sample(ParameterSample::new("radon", 500.0, at(0))).unwrap();
    assert_eq!(agg.factor_snapshot().value("radon"), Some(500.0));

    let snapshot = completed(agg.tick().unwrap());
    assert_eq!(snapshot.compound_alerts.len(), 1);
    assert_eq!(snapshot.compound_alerts[0].alert_type, "radon_exposure");

    agg.ingest_sample(ParameterSample::new("radon", 40.0, at(1))).unwrap();
    assert!(completed(agg.tick().unwrap()).compound_alerts.is_empty());
}

#[test]
fn test_concurrent_ticks_publish_latest_snapshot() {
    let agg = aggregator();
    agg.ingest_factor(factor(PM25, 22.0, 0)).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let agg = &agg;
            scope.spawn(move || {
                for _ in 0..25 {
                    agg.tick().unwrap();
                }
            });
        }
    });

    assert_eq!(agg.tick_count(), 100);
    assert_eq!(agg.snapshot().tick, 100);
}

#[test]
fn test_calm_state_is_stable() {
    let agg = aggregator();
    let calm = [
        (CO2, 450.0),
        (PM25, 8.0),
        (TEMPERATURE, 21.0),
        (HUMIDITY, 45.0),
        (NOISE, 40.0),
        (LIGHT, 300.0),
        (KP_INDEX, 1.0),
        (SUNSPOT_NUMBER, 50.0),
        (POLLEN_LEVEL, 2.0),
        (SEISMIC_RISK, 1.0),
        (LUNAR_ILLUMINATION, 0.3),
        (HVAC_LOAD, 40.0),
        (OCCUPANCY, 20.0),
        (EQUIPMENT_AGE, 3.0),
    ];
    for (id, v) in calm {
        agg.ingest_factor(factor(id, v, 0)).unwrap();
    }

    let snapshot = completed(agg.tick().unwrap());
    assert!(snapshot.compound_alerts.is_empty());
    assert!(snapshot.acceleration_patterns.is_empty());
    assert!(snapshot.echo.is_none());
    assert_eq!(snapshot.status(), SnapshotStatus::Stable);

    let event = SourceEvent::new("evt-calm", "none", 0.0);
    let detection = agg.predict_echo_effects(&event, Sector::Office).unwrap();
    assert!(!detection.predicted_echoes.is_empty());
    assert!(detection.predicted_echoes.iter().all(|e| e.expected_impact == 0.0));
    assert_eq!(agg.latest_echo(), Some(detection));
}

// ═══════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════

#[test]
fn test_uninitialized_library_fails_fast() {
    let agg = RiskAggregator::new(&EngineConfig::default()).unwrap();
    assert!(!agg.is_library_initialized());

    assert!(matches!(agg.tick(), Err(RiskError::LibraryUninitialized)));
    assert!(matches!(
        agg.detect_cross_sector_patterns(Sector::Office),
        Err(RiskError::LibraryUninitialized)
    ));
    assert!(matches!(
        agg.predict_echo_effects(&SourceEvent::new("e", "k", 1.0), Sector::Office),
        Err(RiskError::LibraryUninitialized)
    ));
    assert!(matches!(agg.discover_patterns(), Err(RiskError::LibraryUninitialized)));

    agg.initialize_library(CorrelationLibrary::initialize(seeded_config(1).library).unwrap());
    assert!(agg.tick().is_ok());
    assert!(!agg.detect_cross_sector_patterns(Sector::Office).unwrap().is_empty());
}

#[test]
fn test_pause_keeps_history() {
    let agg = aggregator();
    agg.ingest_sample(ParameterSample::new(NOISE, 40.0, at(0))).unwrap();

    agg.pause();
    assert!(matches!(agg.tick().unwrap(), TickOutcome::Paused));
    assert_eq!(agg.tick_count(), 0);

    agg.ingest_sample(ParameterSample::new(NOISE, 42.0, at(1))).unwrap();
    assert_eq!(agg.window(NOISE).unwrap().len(), 2);

    agg.resume();
    let snapshot = completed(agg.tick().unwrap());
    assert_eq!(snapshot.tick, 1);
    assert_eq!(agg.window(NOISE).unwrap().len(), 2);
    assert_eq!(agg.snapshot().tick, 1);
}

#[test]
fn test_alert_does_not_survive_false_trigger() {
    let agg = aggregator();
    agg.ingest_factor(factor(PM25, 22.0, 0)).unwrap();
    agg.ingest_factor(factor(KP_INDEX, 4.0, 0)).unwrap();
    let first = completed(agg.tick().unwrap());
    assert_eq!(first.compound_alerts.len(), 1);

    agg.ingest_factor(factor(PM25, 12.0, 1)).unwrap();
    let second = completed(agg.tick().unwrap());
    assert!(second.compound_alerts.is_empty());
    // The last echo stays visible as the most recent prediction.
    assert_eq!(second.echo, first.echo);
}

#[test]
fn test_cosmic_streams_are_derivative_tracked() {
    let agg = aggregator();
    for (i, kp) in [2.0, 2.0, 2.0, 6.0].into_iter().enumerate() {
        let derivatives = agg.ingest_factor(factor(KP_INDEX, kp, i as i64)).unwrap();
        assert!(derivatives.is_some());
    }
    let snapshot = completed(agg.tick().unwrap());
    let kp = snapshot
        .acceleration_patterns
        .iter()
        .find(|p| p.parameter == KP_INDEX)
        .expect("kp pattern");
    assert_eq!(kp.alert_type, AlertType::SuddenShift);
}

#[test]
fn test_operational_factors_only_update_board() {
    let agg = aggregator();
    let derivatives = agg.ingest_factor(factor(OCCUPANCY, 55.0, 0)).unwrap();
    assert!(derivatives.is_none());
    assert!(agg.window(OCCUPANCY).is_none());
    assert_eq!(agg.factor_snapshot().value(OCCUPANCY), Some(55.0));
}

#[test]
fn test_non_finite_readings_are_dropped() {
    let agg = aggregator();
    agg.ingest_sample(ParameterSample::new(CO2, 500.0, at(0))).unwrap();
    let result = agg.ingest_sample(ParameterSample::new(CO2, f64::NAN, at(1)));
    assert!(matches!(result, Err(RiskError::InvalidInput(_))));
    assert_eq!(agg.window(CO2).unwrap().len(), 1);
    assert_eq!(agg.factor_snapshot().value(CO2), Some(500.0));
}

#[test]
fn test_steady_state_clears_patterns() {
    let agg = aggregator();
    let values = [21.0, 25.0, 21.5, 22.0, 22.0, 22.0, 22.0];
    for (i, v) in values.into_iter().enumerate() {
        agg.ingest_sample(ParameterSample::new(TEMPERATURE, v, at(i as i64))).unwrap();
    }
    let snapshot = completed(agg.tick().unwrap());
    assert!(snapshot.acceleration_patterns.is_empty());
    assert_eq!(agg.window(TEMPERATURE).unwrap().derivatives(), DerivativeSet::default());
}

#[test]
fn test_concurrent_ingestion_across_parameters() {
    let agg = aggregator();
    let parameters = [CO2, PM25, TEMPERATURE, LIGHT, NOISE, HUMIDITY];

    std::thread::scope(|scope| {
        for parameter in parameters {
            let agg = &agg;
            scope.spawn(move || {
                for i in 0..200 {
                    agg.ingest_sample(ParameterSample::new(parameter, i as f64, at(i)))
                        .unwrap();
                }
            });
        }
    });

    for parameter in parameters {
        let window = agg.window(parameter).unwrap();
        assert_eq!(window.len(), DEFAULT_WINDOW_CAPACITY);
        assert_eq!(window.newest().unwrap().value, 199.0);
        assert_eq!(window.oldest().unwrap().value, 175.0);
    }
    assert!(agg.tick().is_ok());
}

#[test]
fn test_same_seed_gives_same_echoes() {
    let run = || {
        let agg = RiskAggregator::from_config(&seeded_config(99)).unwrap();
        let event = SourceEvent::new("evt", "heat", 30.0);
        agg.predict_echo_effects(&event, Sector::Manufacturing).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_observations_and_discovery_through_aggregator() {
    let mut config = seeded_config(5);
    config.library.discovery_probability = 1.0;
    let agg = RiskAggregator::from_config(&config).unwrap();

    let updated = agg
        .record_observation("healthcare_absence_wave", ObservationOutcome::Confirmed)
        .unwrap();
    assert_eq!(updated.historical_occurrences, 26);

    let record = agg.discover_patterns().unwrap().expect("discovery at probability 1");
    let known = agg
        .with_library(|lib| lib.pattern(&record.pattern_id).is_some())
        .unwrap();
    assert!(known);
}
