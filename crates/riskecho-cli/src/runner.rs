//! Tick loop: polls the telemetry sources, ingests what arrives in time and
//! publishes one alert snapshot per tick.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use riskecho::{AggregatorConfig, AlertSnapshot, RiskAggregator, TickOutcome};

use crate::sources::TelemetrySource;

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub paused_ticks: u64,
    pub samples: u64,
    pub rejected_samples: u64,
    pub timeouts: u64,
    pub fetch_errors: u64,
    pub discoveries: u64,
}

/// Drives a [`RiskAggregator`] on a fixed interval.
pub struct TickRunner {
    run_id: Uuid,
    aggregator: Arc<RiskAggregator>,
    sources: Vec<Box<dyn TelemetrySource>>,
    tick_interval: Duration,
    fetch_timeout: Duration,
    discovery_interval: u64,
}

impl TickRunner {
    pub fn new(aggregator: Arc<RiskAggregator>, config: &AggregatorConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            aggregator,
            sources: Vec::new(),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms),
            discovery_interval: config.discovery_interval_ticks,
        }
    }

    pub fn with_source(mut self, source: Box<dyn TelemetrySource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn aggregator(&self) -> &Arc<RiskAggregator> {
        &self.aggregator
    }

    /// Fetch from every source once and ingest the readings.
    ///
    /// A source that errors or exceeds the fetch timeout contributes nothing.
    pub async fn poll_sources(&mut self, summary: &mut RunSummary) {
        for source in &mut self.sources {
            match tokio::time::timeout(self.fetch_timeout, source.fetch()).await {
                Ok(Ok(factors)) => {
                    for factor in factors {
                        match self.aggregator.ingest_factor(factor) {
                            Ok(_) => summary.samples += 1,
                            Err(e) => {
                                summary.rejected_samples += 1;
                                tracing::debug!(source = source.name(), "Sample rejected: {e}");
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    summary.fetch_errors += 1;
                    tracing::warn!(source = source.name(), "Fetch failed: {e}");
                }
                Err(_) => {
                    summary.timeouts += 1;
                    tracing::warn!(
                        source = source.name(),
                        timeout_ms = self.fetch_timeout.as_millis() as u64,
                        "Fetch timed out, skipping this tick"
                    );
                }
            }
        }
    }

    /// Run until `max_ticks` iterations have elapsed (paused ones included)
    /// or Ctrl-C is received. Every completed snapshot is handed to
    /// `on_snapshot`.
    pub async fn run<F>(
        mut self,
        max_ticks: Option<u64>,
        mut on_snapshot: F,
    ) -> anyhow::Result<RunSummary>
    where
        F: FnMut(&AlertSnapshot) -> anyhow::Result<()>,
    {
        let mut summary = RunSummary::default();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            run_id = %self.run_id,
            sources = self.sources.len(),
            interval_ms = self.tick_interval.as_millis() as u64,
            "Tick runner started"
        );

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut iterations = 0u64;
        loop {
            if max_ticks.is_some_and(|max| iterations >= max) {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => {
                    tracing::info!(run_id = %self.run_id, "Interrupted, shutting down");
                    break;
                }
            }
            iterations += 1;

            self.poll_sources(&mut summary).await;

            match self.aggregator.tick()? {
                TickOutcome::Paused => {
                    summary.paused_ticks += 1;
                    tracing::debug!("Aggregator paused, tick skipped");
                }
                TickOutcome::Completed(snapshot) => {
                    summary.ticks += 1;
                    on_snapshot(snapshot.as_ref())?;

                    if self.discovery_interval > 0
                        && summary.ticks % self.discovery_interval == 0
                        && self.aggregator.discover_patterns()?.is_some()
                    {
                        summary.discoveries += 1;
                    }
                }
            }
        }

        tracing::info!(
            run_id = %self.run_id,
            ticks = summary.ticks,
            paused = summary.paused_ticks,
            samples = summary.samples,
            timeouts = summary.timeouts,
            "Tick runner stopped"
        );

        Ok(summary)
    }
}
