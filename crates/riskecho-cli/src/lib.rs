//! RiskEcho command line: simulated telemetry sources, the tick runner,
//! one-shot evaluation and the interactive REPL.

pub mod config;
pub mod evaluate;
pub mod repl;
pub mod runner;
pub mod sources;

pub use config::{load_config, resolve_config_path};
pub use evaluate::{evaluate, EvaluationInput};
pub use runner::{RunSummary, TickRunner};
pub use sources::{RandomWalkSource, TelemetrySource};
