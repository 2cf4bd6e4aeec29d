//! Seeded random-walk stand-ins for the environmental, space-weather and
//! operational collaborators.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use riskecho::factor_ids::*;
use riskecho::{FactorDomain, RiskFactor};

use super::TelemetrySource;

/// One simulated stream.
#[derive(Debug, Clone)]
struct Stream {
    id: &'static str,
    value: f64,
    step: f64,
    min: f64,
    max: f64,
}

impl Stream {
    fn new(id: &'static str, start: f64, step: f64, min: f64, max: f64) -> Self {
        Self {
            id,
            value: start,
            step,
            min,
            max,
        }
    }
}

/// Bounded random walk over a fixed set of streams, with occasional spikes.
pub struct RandomWalkSource {
    name: String,
    domain: FactorDomain,
    streams: Vec<Stream>,
    spike_probability: f64,
    rng: StdRng,
}

impl RandomWalkSource {
    /// `{co2, pm25, temperature, light, noise, humidity}`.
    pub fn environmental(seed: u64) -> Self {
        Self::build(
            "environmental",
            FactorDomain::Environmental,
            vec![
                Stream::new(CO2, 650.0, 15.0, 380.0, 2500.0),
                Stream::new(PM25, 12.0, 1.5, 0.0, 250.0),
                Stream::new(TEMPERATURE, 21.5, 0.2, 10.0, 40.0),
                Stream::new(LIGHT, 450.0, 20.0, 0.0, 2000.0),
                Stream::new(NOISE, 48.0, 2.0, 20.0, 110.0),
                Stream::new(HUMIDITY, 45.0, 1.0, 5.0, 95.0),
            ],
            seed,
        )
    }

    /// `{kpIndex, sunspotNumber, pollenLevel, seismic riskLevel, lunarIllumination}`.
    pub fn cosmic(seed: u64) -> Self {
        Self::build(
            "cosmic",
            FactorDomain::Cosmic,
            vec![
                Stream::new(KP_INDEX, 2.0, 0.3, 0.0, 9.0),
                Stream::new(SUNSPOT_NUMBER, 110.0, 4.0, 0.0, 400.0),
                Stream::new(POLLEN_LEVEL, 3.0, 0.4, 0.0, 12.0),
                Stream::new(SEISMIC_RISK, 2.0, 0.2, 0.0, 10.0),
                Stream::new(LUNAR_ILLUMINATION, 0.5, 0.03, 0.0, 1.0),
            ],
            seed,
        )
    }

    /// `{hvacLoad, occupancy, equipmentAge}`.
    pub fn operational(seed: u64) -> Self {
        Self::build(
            "operational",
            FactorDomain::Operational,
            vec![
                Stream::new(HVAC_LOAD, 55.0, 3.0, 0.0, 100.0),
                Stream::new(OCCUPANCY, 45.0, 4.0, 0.0, 100.0),
                Stream::new(EQUIPMENT_AGE, 8.0, 0.0, 0.0, 40.0),
            ],
            seed,
        )
    }

    fn build(name: &str, domain: FactorDomain, streams: Vec<Stream>, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            domain,
            streams,
            spike_probability: 0.03,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Override the per-stream chance of a spike on each step.
    pub fn with_spike_probability(mut self, probability: f64) -> Self {
        self.spike_probability = probability.clamp(0.0, 1.0);
        self
    }

    fn step(&mut self) -> Vec<RiskFactor> {
        let now = Utc::now();
        let mut readings = Vec::with_capacity(self.streams.len());
        for stream in &mut self.streams {
            let mut delta = if stream.step > 0.0 {
                self.rng.gen_range(-stream.step..=stream.step)
            } else {
                0.0
            };
            if self.rng.gen_bool(self.spike_probability) {
                delta += stream.step * self.rng.gen_range(5.0..15.0);
            }
            stream.value = (stream.value + delta).clamp(stream.min, stream.max);
            readings.push(RiskFactor::new(stream.id, self.domain, stream.value, now));
        }
        readings
    }
}

#[async_trait]
impl TelemetrySource for RandomWalkSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self) -> anyhow::Result<Vec<RiskFactor>> {
        Ok(self.step())
    }
}
