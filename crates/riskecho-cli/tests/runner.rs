//! Tick runner integration tests with scripted telemetry sources.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use riskecho::factor_ids::{CO2, KP_INDEX, PM25};
use riskecho::{
    AggregatorConfig, AlertType, EngineConfig, FactorDomain, RiskAggregator, RiskFactor,
    RiskLevel, Sector,
};
use riskecho_cli::runner::TickRunner;
use riskecho_cli::sources::{RandomWalkSource, TelemetrySource};

// ─────────────────────── helpers ───────────────────────

/// Emits one queued value per fetch, then repeats the last one.
struct ScriptedSource {
    id: &'static str,
    domain: FactorDomain,
    values: VecDeque<f64>,
    last: f64,
}

impl ScriptedSource {
    fn new(id: &'static str, domain: FactorDomain, values: &[f64]) -> Self {
        Self {
            id,
            domain,
            values: values.iter().copied().collect(),
            last: values.last().copied().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    fn name(&self) -> &str {
        self.id
    }

    async fn fetch(&mut self) -> anyhow::Result<Vec<RiskFactor>> {
        let value = self.values.pop_front().unwrap_or(self.last);
        Ok(vec![RiskFactor::new(self.id, self.domain, value, Utc::now())])
    }
}

/// Never answers within the runner's timeout.
struct StalledSource;

#[async_trait]
impl TelemetrySource for StalledSource {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn fetch(&mut self) -> anyhow::Result<Vec<RiskFactor>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }
}

struct FailingSource;

#[async_trait]
impl TelemetrySource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch(&mut self) -> anyhow::Result<Vec<RiskFactor>> {
        anyhow::bail!("upstream unavailable")
    }
}

fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.library.seed = Some(11);
    config.aggregator = AggregatorConfig {
        tick_interval_ms: 5,
        home_sector: Sector::Office,
        fetch_timeout_ms: 30,
        discovery_interval_ticks: 0,
    };
    config
}

fn runner(config: &EngineConfig) -> TickRunner {
    let aggregator = Arc::new(RiskAggregator::from_config(config).unwrap());
    TickRunner::new(aggregator, &config.aggregator)
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_runner_flags_sudden_co2_shift() {
    let config = fast_config();
    let runner = runner(&config).with_source(Box::new(ScriptedSource::new(
        CO2,
        FactorDomain::Environmental,
        &[700.0, 710.0, 715.0, 900.0],
    )));

    let mut snapshots = Vec::new();
    let summary = runner
        .run(Some(4), |snapshot| {
            snapshots.push(snapshot.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.samples, 4);
    assert_eq!(snapshots.len(), 4);

    let last = snapshots.last().unwrap();
    assert_eq!(last.tick, 4);
    let co2 = &last.acceleration_patterns[0];
    assert_eq!(co2.parameter, CO2);
    assert_eq!(co2.risk_level, RiskLevel::Critical);
    assert_eq!(co2.alert_type, AlertType::SuddenShift);
    assert!((co2.velocity - 185.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_stalled_source_does_not_block_ticks() {
    let config = fast_config();
    let runner = runner(&config)
        .with_source(Box::new(StalledSource))
        .with_source(Box::new(ScriptedSource::new(
            PM25,
            FactorDomain::Environmental,
            &[10.0],
        )));

    let summary = runner.run(Some(3), |_| Ok(())).await.unwrap();

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.timeouts, 3);
    assert_eq!(summary.samples, 3);
}

#[tokio::test]
async fn test_fetch_errors_are_counted_not_fatal() {
    let config = fast_config();
    let runner = runner(&config).with_source(Box::new(FailingSource));

    let summary = runner.run(Some(2), |_| Ok(())).await.unwrap();

    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.fetch_errors, 2);
    assert_eq!(summary.samples, 0);
}

#[tokio::test]
async fn test_paused_runner_keeps_ingesting() {
    let config = fast_config();
    let runner = runner(&config).with_source(Box::new(ScriptedSource::new(
        KP_INDEX,
        FactorDomain::Cosmic,
        &[2.0, 3.0, 4.0],
    )));
    let aggregator = Arc::clone(runner.aggregator());
    aggregator.pause();

    let mut emitted = 0;
    let summary = runner
        .run(Some(3), |_| {
            emitted += 1;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(emitted, 0);
    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.paused_ticks, 3);
    assert_eq!(aggregator.window(KP_INDEX).unwrap().len(), 3);
    assert_eq!(aggregator.tick_count(), 0);
}

#[tokio::test]
async fn test_discovery_runs_on_schedule() {
    let mut config = fast_config();
    config.library.discovery_probability = 1.0;
    config.library.discovery_threshold = 0;
    config.aggregator.discovery_interval_ticks = 2;
    let runner = runner(&config);
    let aggregator = Arc::clone(runner.aggregator());

    let summary = runner.run(Some(5), |_| Ok(())).await.unwrap();

    assert_eq!(summary.ticks, 5);
    assert_eq!(summary.discoveries, 2);
    let recorded = aggregator
        .with_library(|library| library.discoveries().len())
        .unwrap();
    assert_eq!(recorded, 2);
}

#[tokio::test]
async fn test_uninitialized_library_stops_the_run() {
    let config = fast_config();
    let aggregator = Arc::new(RiskAggregator::new(&config).unwrap());
    let runner = TickRunner::new(aggregator, &config.aggregator);

    assert!(runner.run(Some(1), |_| Ok(())).await.is_err());
}

#[tokio::test]
async fn test_simulated_sources_drive_every_domain() {
    let config = fast_config();
    let runner = runner(&config)
        .with_source(Box::new(RandomWalkSource::environmental(1)))
        .with_source(Box::new(RandomWalkSource::cosmic(2)))
        .with_source(Box::new(RandomWalkSource::operational(3)));
    let aggregator = Arc::clone(runner.aggregator());

    let summary = runner.run(Some(3), |_| Ok(())).await.unwrap();

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.samples, 3 * (6 + 5 + 3));
    assert_eq!(aggregator.factor_snapshot().len(), 14);
    assert_eq!(aggregator.window(CO2).unwrap().len(), 3);
    assert!(aggregator.window("hvacLoad").is_none());
}
