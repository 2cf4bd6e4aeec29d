//! Periodic alert aggregation over the latest ingested state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::FactorBoard;
use crate::classifier::{classify_readings, first_derivative_alerts, ParameterThresholds};
use crate::compound::{CompoundRiskCorrelator, CompoundRule};
use crate::config::EngineConfig;
use crate::echo::{predict_echo_effects, EchoDetection, SourceEvent};
use crate::library::{
    CorrelationLibrary, CorrelationPattern, DiscoveryRecord, ObservationOutcome, Sector,
};
use crate::types::{
    AccelerationPattern, CompoundAlert, DerivativeSet, FactorDomain, FirstDerivativeAlert,
    ParameterSample, RiskError, RiskFactor, RiskResult,
};
use crate::window::{ParameterWindow, SampleIngestor};

/// Scale from a compound alert's `multiplier * probability` to echo magnitude.
pub const ECHO_MAGNITUDE_SCALE: f64 = 10.0;

/// Whether a snapshot carries anything worth surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// No anomalies; stability maintained.
    Stable,
    Anomalies,
}

/// Consolidated, read-only result of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub tick: u64,
    pub generated_at: DateTime<Utc>,
    pub acceleration_patterns: Vec<AccelerationPattern>,
    pub first_derivative_alerts: Vec<FirstDerivativeAlert>,
    pub compound_alerts: Vec<CompoundAlert>,
    pub sector_patterns: Vec<CorrelationPattern>,
    pub echo: Option<EchoDetection>,
}

impl AlertSnapshot {
    fn empty() -> Self {
        Self {
            tick: 0,
            generated_at: Utc::now(),
            acceleration_patterns: Vec::new(),
            first_derivative_alerts: Vec::new(),
            compound_alerts: Vec::new(),
            sector_patterns: Vec::new(),
            echo: None,
        }
    }

    pub fn status(&self) -> SnapshotStatus {
        if self.acceleration_patterns.is_empty()
            && self.first_derivative_alerts.is_empty()
            && self.compound_alerts.is_empty()
        {
            SnapshotStatus::Stable
        } else {
            SnapshotStatus::Anomalies
        }
    }
}

/// What a call to [`RiskAggregator::tick`] did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// The aggregator is paused; nothing was evaluated.
    Paused,
    Completed(Arc<AlertSnapshot>),
}

/// Owns the ingestion state and re-runs classification, compound rules and
/// echo prediction on every tick.
pub struct RiskAggregator {
    thresholds: BTreeMap<String, ParameterThresholds>,
    home_sector: Sector,
    ingestor: SampleIngestor,
    correlator: CompoundRiskCorrelator,
    factors: RwLock<FactorBoard>,
    library: Mutex<Option<CorrelationLibrary>>,
    last_echo: Mutex<Option<EchoDetection>>,
    latest: RwLock<Arc<AlertSnapshot>>,
    paused: AtomicBool,
    ticks: AtomicU64,
}

impl RiskAggregator {
    /// Build an aggregator without a correlation library.
    ///
    /// Ticks and correlation queries fail with
    /// [`RiskError::LibraryUninitialized`] until
    /// [`initialize_library`](Self::initialize_library) is called.
    pub fn new(config: &EngineConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self {
            thresholds: config.thresholds.clone(),
            home_sector: config.aggregator.home_sector,
            ingestor: SampleIngestor::new(config.window_capacity, config.derivative_mode)?,
            correlator: CompoundRiskCorrelator::new(config.rules.clone())?,
            factors: RwLock::new(FactorBoard::new()),
            library: Mutex::new(None),
            last_echo: Mutex::new(None),
            latest: RwLock::new(Arc::new(AlertSnapshot::empty())),
            paused: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        })
    }

    /// Build an aggregator and seed its library from the same configuration.
    pub fn from_config(config: &EngineConfig) -> RiskResult<Self> {
        let aggregator = Self::new(config)?;
        aggregator.initialize_library(CorrelationLibrary::initialize(config.library.clone())?);
        Ok(aggregator)
    }

    /// Install (or replace) the correlation library.
    pub fn initialize_library(&self, library: CorrelationLibrary) {
        *lock(&self.library) = Some(library);
    }

    pub fn is_library_initialized(&self) -> bool {
        lock(&self.library).is_some()
    }

    /// Append a raw parameter sample and record it on the factor board.
    ///
    /// Ids outside the well-known set are filed as environmental factors, so
    /// configured rules over custom parameters see them.
    pub fn ingest_sample(&self, sample: ParameterSample) -> RiskResult<DerivativeSet> {
        check_finite(&sample.parameter_id, sample.value)?;
        let domain = FactorDomain::of(&sample.parameter_id).unwrap_or(FactorDomain::Environmental);
        self.write_factor(RiskFactor::new(
            sample.parameter_id.clone(),
            domain,
            sample.value,
            sample.timestamp,
        ));
        self.ingestor.ingest(sample)
    }

    /// Record a risk factor.
    ///
    /// Environmental and cosmic factors are also derivative-tracked; the
    /// fresh derivatives are returned for those. Operational factors only
    /// update the board.
    pub fn ingest_factor(&self, factor: RiskFactor) -> RiskResult<Option<DerivativeSet>> {
        check_finite(&factor.id, factor.value)?;
        let sample = factor
            .domain
            .is_derivative_tracked()
            .then(|| ParameterSample::new(factor.id.clone(), factor.value, factor.timestamp));
        self.write_factor(factor);
        sample.map(|s| self.ingestor.ingest(s)).transpose()
    }

    fn write_factor(&self, factor: RiskFactor) {
        self.factors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(factor);
    }

    /// Consistent copy of the current factor board.
    pub fn factor_snapshot(&self) -> FactorBoard {
        self.factors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of one parameter's sample window.
    pub fn window(&self, parameter: &str) -> Option<ParameterWindow> {
        self.ingestor.window(parameter)
    }

    pub fn rules(&self) -> &[CompoundRule] {
        self.correlator.rules()
    }

    pub fn home_sector(&self) -> Sector {
        self.home_sector
    }

    /// Stop evaluating ticks. Window history is kept and ingestion continues.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        tracing::info!("Aggregator paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        tracing::info!("Aggregator resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Number of completed ticks.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Evaluate the latest state and publish a new snapshot.
    pub fn tick(&self) -> RiskResult<TickOutcome> {
        if self.is_paused() {
            return Ok(TickOutcome::Paused);
        }

        let mut library_guard = lock(&self.library);
        let library = library_guard
            .as_mut()
            .ok_or(RiskError::LibraryUninitialized)?;

        let factors = self.factor_snapshot();
        let readings = self.ingestor.readings();

        let acceleration_patterns = classify_readings(&readings, &self.thresholds);
        let first_derivative_alerts = first_derivative_alerts(&acceleration_patterns);
        let compound_alerts = self.correlator.evaluate(&factors);
        let sector_patterns = library.detect_cross_sector_patterns(self.home_sector, &factors);

        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;

        let mut last_echo = lock(&self.last_echo);
        if let Some(top) = compound_alerts.first() {
            let event = SourceEvent::new(
                format!("tick-{tick}-{}", top.alert_type),
                top.alert_type.clone(),
                top.multiplier * top.probability * ECHO_MAGNITUDE_SCALE,
            );
            *last_echo = Some(predict_echo_effects(library, &event, self.home_sector));
        }

        let snapshot = Arc::new(AlertSnapshot {
            tick,
            generated_at: Utc::now(),
            acceleration_patterns,
            first_derivative_alerts,
            compound_alerts,
            sector_patterns,
            echo: last_echo.clone(),
        });
        drop(last_echo);

        // Published under the library lock so snapshots land in tick order.
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        drop(library_guard);

        tracing::debug!(
            tick,
            parameters = readings.len(),
            patterns = snapshot.acceleration_patterns.len(),
            alerts = snapshot.first_derivative_alerts.len(),
            compound = snapshot.compound_alerts.len(),
            "Tick complete"
        );

        Ok(TickOutcome::Completed(snapshot))
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<AlertSnapshot> {
        Arc::clone(&self.latest.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The most recent echo prediction, from a tick or an explicit query.
    pub fn latest_echo(&self) -> Option<EchoDetection> {
        lock(&self.last_echo).clone()
    }

    /// Patterns involving `sector`, adjusted for the current factors.
    pub fn detect_cross_sector_patterns(&self, sector: Sector) -> RiskResult<Vec<CorrelationPattern>> {
        let factors = self.factor_snapshot();
        self.with_library(|library| library.detect_cross_sector_patterns(sector, &factors))
    }

    /// Predict echoes of `event` in `sector` and keep the result as the latest echo.
    pub fn predict_echo_effects(
        &self,
        event: &SourceEvent,
        sector: Sector,
    ) -> RiskResult<EchoDetection> {
        let detection =
            self.with_library_mut(|library| predict_echo_effects(library, event, sector))?;
        *lock(&self.last_echo) = Some(detection.clone());
        Ok(detection)
    }

    /// Run one explicit pattern discovery cycle.
    pub fn discover_patterns(&self) -> RiskResult<Option<DiscoveryRecord>> {
        self.with_library_mut(CorrelationLibrary::discover_patterns)
    }

    /// Fold an observed outcome into a pattern and return its updated state.
    pub fn record_observation(
        &self,
        pattern_id: &str,
        outcome: ObservationOutcome,
    ) -> RiskResult<CorrelationPattern> {
        self.with_library_mut(|library| {
            library
                .record_observation(pattern_id, outcome)
                .map(Clone::clone)
        })?
    }

    /// Read access to the library; fails fast when it has not been initialized.
    pub fn with_library<T>(&self, f: impl FnOnce(&CorrelationLibrary) -> T) -> RiskResult<T> {
        let guard = lock(&self.library);
        guard.as_ref().map(f).ok_or(RiskError::LibraryUninitialized)
    }

    fn with_library_mut<T>(&self, f: impl FnOnce(&mut CorrelationLibrary) -> T) -> RiskResult<T> {
        let mut guard = lock(&self.library);
        guard.as_mut().map(f).ok_or(RiskError::LibraryUninitialized)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_finite(id: &str, value: f64) -> RiskResult<()> {
    if value.is_finite() {
        return Ok(());
    }
    tracing::warn!(parameter = id, value, "Dropping non-finite reading");
    Err(RiskError::InvalidInput(format!(
        "non-finite value {value} for '{id}'"
    )))
}
