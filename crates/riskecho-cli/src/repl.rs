//! Interactive REPL over a live aggregator.
//!
//! Launch with `riskecho repl`. Type `/help` for commands, Tab for completion.

use std::ops::ControlFlow;
use std::path::PathBuf;

use chrono::Utc;
use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use riskecho::factor_ids::{COSMIC, ENVIRONMENTAL, OPERATIONAL};
use riskecho::{
    AlertSnapshot, FactorDomain, ObservationOutcome, ParameterSample, RiskAggregator, RiskFactor,
    Sector, SnapshotStatus, SourceEvent, TickOutcome,
};

use crate::config::load_config;

/// REPL commands: name, argument synopsis, description.
const COMMANDS: &[(&str, &str, &str)] = &[
    ("/ingest", "<param> <value>", "Ingest one reading"),
    ("/tick", "", "Run one aggregation tick"),
    ("/pause", "", "Pause ticking (ingestion continues)"),
    ("/resume", "", "Resume ticking"),
    ("/alerts", "", "Show the latest snapshot"),
    ("/factors", "", "Show the current factor board by domain"),
    ("/patterns", "[sector]", "Cross-sector patterns (default: home sector)"),
    ("/echo", "<sector> <magnitude>", "Predict echoes of an event"),
    ("/discover", "", "Run one pattern discovery cycle"),
    ("/observe", "<pattern> <yes|no>", "Record an observed outcome"),
    ("/rules", "", "List compound rules"),
    ("/clear", "", "Clear the screen"),
    ("/help", "", "Show available commands"),
    ("/exit", "", "Quit the REPL"),
];

/// First-argument vocabulary for a command.
fn argument_candidates(cmd: &str) -> Vec<&'static str> {
    match cmd {
        "/ingest" => ENVIRONMENTAL
            .iter()
            .chain(COSMIC)
            .chain(OPERATIONAL)
            .copied()
            .collect(),
        "/patterns" | "/echo" => Sector::ALL.iter().map(|s| s.as_str()).collect(),
        _ => Vec::new(),
    }
}

/// Tab completion over commands, parameter ids and sectors; argument hints.
#[derive(Default)]
struct RiskHelper;

impl Completer for RiskHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        let Some((cmd, arg)) = input.split_once(' ') else {
            let matches = COMMANDS
                .iter()
                .filter(|(name, _, _)| name.starts_with(input))
                .map(|(name, synopsis, desc)| Pair {
                    display: format!("{:<30} {desc}", format!("{name} {synopsis}")),
                    replacement: format!("{name} "),
                })
                .collect();
            return Ok((0, matches));
        };

        // only the first argument has a vocabulary
        if arg.contains(' ') {
            return Ok((pos, Vec::new()));
        }
        let matches = argument_candidates(cmd)
            .into_iter()
            .filter(|c| c.starts_with(arg))
            .map(|c| Pair {
                display: c.to_string(),
                replacement: format!("{c} "),
            })
            .collect();
        Ok((cmd.len() + 1, matches))
    }
}

impl Hinter for RiskHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || !line.starts_with('/') {
            return None;
        }
        match line.strip_suffix(' ') {
            // "/echo " -> show the synopsis
            Some(cmd) if !cmd.contains(' ') => COMMANDS
                .iter()
                .find(|(name, synopsis, _)| *name == cmd && !synopsis.is_empty())
                .map(|(_, synopsis, _)| synopsis.to_string()),
            Some(_) => None,
            None if line.contains(' ') => None,
            None => COMMANDS
                .iter()
                .map(|(name, _, _)| *name)
                .find(|name| name.starts_with(line) && *name != line)
                .map(|name| name[line.len()..].to_string()),
        }
    }
}

impl Highlighter for RiskHelper {}
impl Validator for RiskHelper {}
impl Helper for RiskHelper {}

/// Tab accepts a command-name hint, otherwise completes. Synopsis hints are
/// display-only.
struct TabHandler;

impl ConditionalEventHandler for TabHandler {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        Some(if ctx.has_hint() && !ctx.line().contains(' ') {
            Cmd::CompleteHint
        } else {
            Cmd::Complete
        })
    }
}

fn history_path() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".riskecho_history")
}

/// Run the interactive REPL.
pub fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let aggregator = RiskAggregator::from_config(&config)?;

    let mut rl: Editor<RiskHelper, DefaultHistory> = Editor::with_config(
        Config::builder()
            .auto_add_history(true)
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .build(),
    )?;
    rl.set_helper(Some(RiskHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabHandler)),
    );

    let hist_path = history_path();
    if rl.load_history(&hist_path).is_err() {
        tracing::debug!("No REPL history at {}", hist_path.display());
    }

    eprintln!(
        "riskecho {} | home sector {} | {} rules | /help for commands",
        env!("CARGO_PKG_VERSION"),
        aggregator.home_sector(),
        aggregator.rules().len()
    );

    loop {
        let line = match rl.readline("risk> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                eprintln!("  (Ctrl+C) /exit quits.");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        };
        if dispatch(&aggregator, &line).is_break() {
            break;
        }
    }

    if let Err(e) = rl.save_history(&hist_path) {
        tracing::debug!("Could not save REPL history: {e}");
    }
    Ok(())
}

/// Execute one input line against the aggregator.
fn dispatch(aggregator: &RiskAggregator, line: &str) -> ControlFlow<()> {
    let line = line.trim();
    if line.is_empty() {
        return ControlFlow::Continue(());
    }
    let input = line.strip_prefix('/').unwrap_or(line);
    let (cmd, args) = input
        .split_once(' ')
        .map_or((input, ""), |(c, a)| (c, a.trim()));

    match cmd {
        "exit" | "quit" => return ControlFlow::Break(()),
        "" | "help" | "h" | "?" => cmd_help(),
        "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
        "ingest" => cmd_ingest(args, aggregator),
        "tick" => cmd_tick(aggregator),
        "pause" => {
            aggregator.pause();
            eprintln!("  Paused. Samples are still ingested.");
        }
        "resume" => {
            aggregator.resume();
            eprintln!("  Resumed.");
        }
        "alerts" => print_snapshot(&aggregator.snapshot()),
        "factors" => cmd_factors(aggregator),
        "patterns" => cmd_patterns(args, aggregator),
        "echo" => cmd_echo(args, aggregator),
        "discover" => cmd_discover(aggregator),
        "observe" => cmd_observe(args, aggregator),
        "rules" => cmd_rules(aggregator),
        _ => eprintln!("  Unknown command '/{cmd}'. Type /help for commands."),
    }
    ControlFlow::Continue(())
}

fn cmd_help() {
    eprintln!();
    for (name, synopsis, desc) in COMMANDS {
        eprintln!("  {:<30} {desc}", format!("{name} {synopsis}"));
    }
    eprintln!();
    eprintln!("  Sectors: {}", sector_list());
    eprintln!();
}

fn cmd_factors(aggregator: &RiskAggregator) {
    let board = aggregator.factor_snapshot();
    if board.is_empty() {
        eprintln!("  No factors reported yet.");
        return;
    }
    for domain in [
        FactorDomain::Environmental,
        FactorDomain::Cosmic,
        FactorDomain::Operational,
    ] {
        let factors = board.by_domain(domain);
        if factors.is_empty() {
            continue;
        }
        eprintln!("  {domain:?}:");
        for factor in factors {
            eprintln!("    {:<30} {:>10.3}", factor.id, factor.value);
        }
    }
}

fn sector_list() -> String {
    Sector::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_ingest(args: &str, aggregator: &RiskAggregator) {
    let mut parts = args.split_whitespace();
    let (Some(param), Some(raw)) = (parts.next(), parts.next()) else {
        eprintln!("  Usage: /ingest <param> <value>");
        return;
    };
    let Ok(value) = raw.parse::<f64>() else {
        eprintln!("  Not a number: {raw}");
        return;
    };

    let now = Utc::now();
    let result = match FactorDomain::of(param) {
        Some(domain) => aggregator.ingest_factor(RiskFactor::new(param, domain, value, now)),
        None => aggregator
            .ingest_sample(ParameterSample::new(param, value, now))
            .map(Some),
    };

    match result {
        Ok(Some(d)) => eprintln!(
            "  {param} = {value}  v={:.3} a={:.3} j={:.3}",
            d.velocity, d.acceleration, d.jerk
        ),
        Ok(None) => eprintln!("  {param} = {value}  (context factor)"),
        Err(e) => eprintln!("  Rejected: {e}"),
    }
}

fn cmd_tick(aggregator: &RiskAggregator) {
    match aggregator.tick() {
        Ok(TickOutcome::Completed(snapshot)) => print_snapshot(&snapshot),
        Ok(TickOutcome::Paused) => eprintln!("  Paused; use /resume first."),
        Err(e) => eprintln!("  Tick failed: {e}"),
    }
}

fn print_snapshot(snapshot: &AlertSnapshot) {
    eprintln!();
    let status = match snapshot.status() {
        SnapshotStatus::Stable => "stable",
        SnapshotStatus::Anomalies => "anomalies",
    };
    eprintln!("  Tick {} ({status})", snapshot.tick);

    if !snapshot.acceleration_patterns.is_empty() {
        eprintln!("    Parameters:");
        for p in &snapshot.acceleration_patterns {
            eprintln!(
                "      {:<30} {:?} {:?}  v={:.2} a={:.2} j={:.2}",
                p.parameter, p.risk_level, p.alert_type, p.velocity, p.acceleration, p.jerk
            );
        }
    }
    if !snapshot.compound_alerts.is_empty() {
        eprintln!("    Compound alerts:");
        for a in &snapshot.compound_alerts {
            eprintln!(
                "      {:<30} {:?}  p={:.2} x{:.1}  {}",
                a.alert_type, a.severity, a.probability, a.multiplier, a.time_to_impact
            );
        }
    }
    if !snapshot.sector_patterns.is_empty() {
        eprintln!("    Sector patterns:");
        for p in &snapshot.sector_patterns {
            eprintln!(
                "      {:<36} strength {:.2} confidence {:.2}",
                p.pattern_id, p.correlation_strength, p.confidence
            );
        }
    }
    if let Some(echo) = &snapshot.echo {
        eprintln!(
            "    Echo of {} ({}): cascade risk {:.1}",
            echo.source_event.id, echo.source_sector, echo.cascade_risk
        );
    }
    eprintln!();
}

fn cmd_patterns(args: &str, aggregator: &RiskAggregator) {
    let sector = if args.is_empty() {
        aggregator.home_sector()
    } else {
        match args.parse::<Sector>() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("  {e}. Sectors: {}", sector_list());
                return;
            }
        }
    };

    match aggregator.detect_cross_sector_patterns(sector) {
        Ok(patterns) if patterns.is_empty() => eprintln!("  No patterns involve {sector}."),
        Ok(patterns) => {
            eprintln!();
            for p in &patterns {
                let sectors: Vec<&str> = p.sectors.iter().map(|s| s.as_str()).collect();
                eprintln!(
                    "    {:<36} {:<40} strength {:.2} confidence {:.2}",
                    p.pattern_id,
                    sectors.join(" + "),
                    p.correlation_strength,
                    p.confidence
                );
            }
            eprintln!();
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_echo(args: &str, aggregator: &RiskAggregator) {
    let mut parts = args.split_whitespace();
    let (Some(raw_sector), Some(raw_magnitude)) = (parts.next(), parts.next()) else {
        eprintln!("  Usage: /echo <sector> <magnitude>");
        return;
    };
    let sector = match raw_sector.parse::<Sector>() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("  {e}. Sectors: {}", sector_list());
            return;
        }
    };
    let Ok(magnitude) = raw_magnitude.parse::<f64>() else {
        eprintln!("  Not a number: {raw_magnitude}");
        return;
    };

    let event = SourceEvent::new(format!("repl-{sector}"), "manual", magnitude);
    match aggregator.predict_echo_effects(&event, sector) {
        Ok(detection) => {
            eprintln!();
            if detection.predicted_echoes.is_empty() {
                eprintln!("  No pattern starts in {sector}.");
            }
            for echo in &detection.predicted_echoes {
                eprintln!(
                    "    {:<16} +{:>5.1}h  impact {:>6.2}  confidence {:.2}  act within {:.1}h  ({})",
                    echo.target_sector.as_str(),
                    echo.delay_hours,
                    echo.expected_impact,
                    echo.confidence,
                    echo.mitigation_window_hours,
                    echo.pattern_id
                );
            }
            eprintln!("  Cascade risk: {:.1}", detection.cascade_risk);
            eprintln!();
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_discover(aggregator: &RiskAggregator) {
    match aggregator.discover_patterns() {
        Ok(Some(record)) => {
            let sectors: Vec<&str> = record.sectors.iter().map(|s| s.as_str()).collect();
            eprintln!(
                "  Discovered {} ({}) at network size {}",
                record.pattern_id,
                sectors.join(" + "),
                record.network_size
            );
        }
        Ok(None) => {
            let size = aggregator
                .with_library(|library| library.network().customer_count)
                .unwrap_or_default();
            eprintln!("  Nothing discovered this cycle (network size {size}).");
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_observe(args: &str, aggregator: &RiskAggregator) {
    let mut parts = args.split_whitespace();
    let (Some(pattern_id), Some(raw_outcome)) = (parts.next(), parts.next()) else {
        eprintln!("  Usage: /observe <pattern> <yes|no>");
        return;
    };
    let outcome = match raw_outcome {
        "yes" | "y" | "confirmed" => ObservationOutcome::Confirmed,
        "no" | "n" | "refuted" => ObservationOutcome::Refuted,
        other => {
            eprintln!("  Expected yes or no, got '{other}'");
            return;
        }
    };

    match aggregator.record_observation(pattern_id, outcome) {
        Ok(pattern) => eprintln!(
            "  {}: confidence {:.3}, {} occurrences",
            pattern.pattern_id, pattern.confidence, pattern.historical_occurrences
        ),
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_rules(aggregator: &RiskAggregator) {
    eprintln!();
    for rule in aggregator.rules() {
        let clauses: Vec<String> = rule.clauses.iter().map(|c| c.to_string()).collect();
        eprintln!(
            "    {:<26} {:?}  {}",
            rule.id,
            rule.severity,
            clauses.join(" and ")
        );
    }
    eprintln!();
}
