//! Telemetry collaborators that feed the aggregator.

pub mod simulated;

use async_trait::async_trait;

use riskecho::RiskFactor;

pub use simulated::RandomWalkSource;

/// A source of risk factor readings, polled once per tick.
///
/// A fetch that errors or outlives the runner's timeout means "no sample
/// this tick" for this source; the tick still runs.
#[async_trait]
pub trait TelemetrySource: Send {
    fn name(&self) -> &str;

    async fn fetch(&mut self) -> anyhow::Result<Vec<RiskFactor>>;
}
