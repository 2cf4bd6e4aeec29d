//! Bounded per-parameter sample windows and the ingestion path that feeds them.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::derivative::{compute_derivatives, DerivativeMode, DERIVATIVE_SPAN};
use crate::types::{DerivativeSet, ParameterSample, RiskError, RiskResult};

/// Default number of samples retained per parameter.
pub const DEFAULT_WINDOW_CAPACITY: usize = 25;

/// Fixed-capacity FIFO of samples for one parameter.
///
/// Samples are appended in arrival order. Out-of-order timestamps are kept
/// where they land; nothing is re-sorted.
#[derive(Debug, Clone)]
pub struct ParameterWindow {
    capacity: usize,
    samples: VecDeque<ParameterSample>,
    latest: DerivativeSet,
}

impl ParameterWindow {
    /// Create an empty window. A capacity of zero is a programming error.
    pub fn new(capacity: usize) -> RiskResult<Self> {
        if capacity == 0 {
            return Err(RiskError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            latest: DerivativeSet::default(),
        })
    }

    /// Append a sample, evicting the oldest one past capacity, and recompute
    /// the derivatives attached to the newest sample.
    pub fn push(&mut self, sample: ParameterSample, mode: DerivativeMode) -> DerivativeSet {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        let tail: Vec<ParameterSample> = self
            .samples
            .iter()
            .skip(self.samples.len().saturating_sub(DERIVATIVE_SPAN))
            .cloned()
            .collect();
        self.latest = compute_derivatives(&tail, mode);
        self.latest
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Derivatives of the newest sample.
    pub fn derivatives(&self) -> DerivativeSet {
        self.latest
    }

    pub fn newest(&self) -> Option<&ParameterSample> {
        self.samples.back()
    }

    pub fn oldest(&self) -> Option<&ParameterSample> {
        self.samples.front()
    }
}

/// Point-in-time copy of one window's state, safe to hold across a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReading {
    pub parameter: String,
    pub newest: ParameterSample,
    pub derivatives: DerivativeSet,
    pub len: usize,
}

/// Routes samples into their parameter's window.
///
/// Windows are sharded in a concurrent map, so two streams for different
/// parameters never contend on a single lock.
pub struct SampleIngestor {
    capacity: usize,
    mode: DerivativeMode,
    windows: DashMap<String, ParameterWindow>,
}

impl SampleIngestor {
    pub fn new(capacity: usize, mode: DerivativeMode) -> RiskResult<Self> {
        if capacity == 0 {
            return Err(RiskError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            mode,
            windows: DashMap::new(),
        })
    }

    /// Append a sample to its parameter's window and return the fresh derivatives.
    ///
    /// Only the affected parameter is recomputed.
    pub fn ingest(&self, sample: ParameterSample) -> RiskResult<DerivativeSet> {
        let parameter = sample.parameter_id.clone();
        let mut window = match self.windows.entry(parameter.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => entry.into_ref(),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(ParameterWindow::new(self.capacity)?)
            }
        };
        let derivatives = window.push(sample, self.mode);
        tracing::debug!(
            parameter = %parameter,
            velocity = derivatives.velocity,
            acceleration = derivatives.acceleration,
            jerk = derivatives.jerk,
            "Ingested sample"
        );
        Ok(derivatives)
    }

    /// Snapshot every non-empty window, sorted by parameter id.
    pub fn readings(&self) -> Vec<WindowReading> {
        let mut readings: Vec<WindowReading> = self
            .windows
            .iter()
            .filter_map(|entry| {
                let window = entry.value();
                window.newest().map(|newest| WindowReading {
                    parameter: entry.key().clone(),
                    newest: newest.clone(),
                    derivatives: window.derivatives(),
                    len: window.len(),
                })
            })
            .collect();
        readings.sort_by(|a, b| a.parameter.cmp(&b.parameter));
        readings
    }

    /// Copy of one parameter's window.
    pub fn window(&self, parameter: &str) -> Option<ParameterWindow> {
        self.windows.get(parameter).map(|w| w.value().clone())
    }
}
