//! RiskEcho command line entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use riskecho::RiskAggregator;
use riskecho_cli::config::load_config;
use riskecho_cli::evaluate::{evaluate, EvaluationInput};
use riskecho_cli::runner::TickRunner;
use riskecho_cli::sources::RandomWalkSource;

#[derive(Parser)]
#[command(
    name = "riskecho",
    about = "Streaming derivative tracking, compound risk rules and cross-sector echo prediction",
    version
)]
struct Cli {
    /// Path to a JSON configuration file.
    /// Also reads from RISKECHO_CONFIG, then ./.riskecho/config.json.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tick loop against simulated telemetry (default).
    Run {
        /// Tick interval in milliseconds. Overrides the configuration.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many ticks.
        #[arg(long)]
        ticks: Option<u64>,

        /// Seed for the simulated sources and the correlation library.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Ingest readings, tick once and print the snapshot.
    ///
    /// Examples:
    ///   riskecho evaluate --factor co2=700 --factor co2=710 --factor co2=715 --factor co2=900
    ///   riskecho evaluate --input readings.json
    Evaluate {
        /// Reading as id=value. Repeat an id to build a series.
        #[arg(short, long = "factor")]
        factors: Vec<String>,

        /// JSON file of the form {"factors": {"co2": [700, 900], "pm25": 22}}.
        #[arg(short, long, conflicts_with = "factors")]
        input: Option<PathBuf>,
    },

    /// Print the compound rule catalogue as JSON.
    Rules,

    /// Print the effective configuration as JSON.
    Config,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   riskecho completions bash > ~/.local/share/bash-completion/completions/riskecho
    ///   riskecho completions zsh > ~/.zfunc/_riskecho
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Run {
        interval_ms: None,
        ticks: None,
        seed: None,
    }) {
        Commands::Run {
            interval_ms,
            ticks,
            seed,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(ms) = interval_ms {
                config.aggregator.tick_interval_ms = ms;
            }
            let base_seed = seed.unwrap_or_else(rand::random);
            config.library.seed = Some(config.library.seed.unwrap_or(base_seed));
            tracing::info!(seed = base_seed, "Simulated sources seeded");

            let aggregator = Arc::new(RiskAggregator::from_config(&config)?);
            let runner = TickRunner::new(aggregator, &config.aggregator)
                .with_source(Box::new(RandomWalkSource::environmental(base_seed)))
                .with_source(Box::new(RandomWalkSource::cosmic(base_seed.wrapping_add(1))))
                .with_source(Box::new(RandomWalkSource::operational(base_seed.wrapping_add(2))))
                .with_tick_interval(Duration::from_millis(config.aggregator.tick_interval_ms));

            runner
                .run(ticks, |snapshot| {
                    println!("{}", serde_json::to_string(snapshot)?);
                    Ok(())
                })
                .await?;
        }

        Commands::Evaluate { factors, input } => {
            let config = load_config(cli.config.as_deref())?;
            let input = match input {
                Some(path) => EvaluationInput::from_file(&path)?,
                None => EvaluationInput::from_args(&factors)?,
            };
            if input.is_empty() {
                anyhow::bail!("no readings given; use --factor id=value or --input <file>");
            }
            let snapshot = evaluate(&config, &input)?;
            println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        }

        Commands::Rules => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config.rules)?);
        }

        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", config.to_json_pretty()?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "riskecho", &mut std::io::stdout());
        }

        Commands::Repl => {
            riskecho_cli::repl::run(cli.config.as_deref())?;
        }
    }

    Ok(())
}
