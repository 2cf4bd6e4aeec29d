//! RiskEcho: streaming derivative tracking, compound risk rules, and
//! cross-sector echo prediction for environmental and contextual telemetry.

pub mod aggregator;
pub mod board;
pub mod classifier;
pub mod compound;
pub mod config;
pub mod derivative;
pub mod echo;
pub mod library;
pub mod types;
pub mod window;

pub use aggregator::{AlertSnapshot, RiskAggregator, SnapshotStatus, TickOutcome};
pub use board::FactorBoard;
pub use classifier::{classify, classify_readings, first_derivative_alerts, ParameterThresholds};
pub use compound::{default_rules, Clause, Comparison, CompoundRiskCorrelator, CompoundRule};
pub use config::{AggregatorConfig, EngineConfig};
pub use derivative::{compute_derivatives, DerivativeMode};
pub use echo::{cascade_risk, predict_echo_effects, EchoDetection, PredictedEcho, SourceEvent};
pub use library::{
    stress_factor, CorrelationLibrary, CorrelationPattern, DiscoveryRecord, LibraryConfig,
    NetworkEffect, ObservationOutcome, RippleEffect, Sector,
};
pub use types::*;
pub use window::{ParameterWindow, SampleIngestor, WindowReading, DEFAULT_WINDOW_CAPACITY};
