//! Finite-difference derivatives over a parameter's sample window.

use serde::{Deserialize, Serialize};

use crate::types::{DerivativeSet, ParameterSample};

/// Number of trailing samples needed for the highest derivative order (jerk).
pub const DERIVATIVE_SPAN: usize = 4;

/// How a difference between consecutive samples is scaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeMode {
    /// Each sample is one unit of time. Assumes a constant sampling cadence.
    #[default]
    PerTick,
    /// Divide each difference by the elapsed seconds between the two samples.
    /// Falls back to the per-tick difference when the gap is zero or negative.
    PerSecond,
}

impl DerivativeMode {
    fn scale(self, delta: f64, earlier: &ParameterSample, later: &ParameterSample) -> f64 {
        match self {
            Self::PerTick => delta,
            Self::PerSecond => {
                let dt = (later.timestamp - earlier.timestamp).num_milliseconds() as f64 / 1000.0;
                if dt > 0.0 {
                    delta / dt
                } else {
                    delta
                }
            }
        }
    }
}

/// Compute velocity, acceleration and jerk at the newest sample.
///
/// `samples` is ordered oldest first. Orders that lack history (fewer than
/// 2, 3 or 4 samples respectively) are left at `0.0`.
pub fn compute_derivatives(samples: &[ParameterSample], mode: DerivativeMode) -> DerivativeSet {
    let tail = &samples[samples.len().saturating_sub(DERIVATIVE_SPAN)..];
    let mut series: Vec<f64> = tail.iter().map(|s| s.value).collect();
    let mut orders = [0.0f64; 3];

    for (k, slot) in orders.iter_mut().enumerate() {
        if series.len() < 2 {
            break;
        }
        // Element i of the order-k series sits at tail index i + k.
        series = series
            .windows(2)
            .enumerate()
            .map(|(i, pair)| mode.scale(pair[1] - pair[0], &tail[i + k], &tail[i + k + 1]))
            .collect();
        if let Some(newest) = series.last() {
            *slot = *newest;
        }
    }

    DerivativeSet {
        velocity: orders[0],
        acceleration: orders[1],
        jerk: orders[2],
    }
}
