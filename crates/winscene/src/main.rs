//! wsc: replay window-session scenarios against the winscene core.

mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use winscene_core::config::{LogFormat, SessionConfig};
use winscene_core::logging::init_logging;
use winscene_core::state::SessionState;
use winscene_core::{SessionRegistry, VERSION};

use crate::scenario::{Runner, Scenario};

#[derive(Parser, Debug)]
#[command(name = "wsc")]
#[command(about = "Replay window-session lifecycle scenarios")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE", env = "WSC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log format: pretty or json
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario file and print a JSON report
    Run {
        /// Scenario file (.toml or .json)
        scenario: PathBuf,

        /// Exit non-zero when any step's result differs from its expectation
        #[arg(long)]
        strict: bool,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },
    /// Validate the configuration and print the effective values
    CheckConfig,
    /// Print the lifecycle transition table
    States,
}

fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("invalid configuration {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn print_states() {
    for from in SessionState::ALL {
        let targets: Vec<String> = SessionState::ALL
            .into_iter()
            .filter(|to| from.can_transition_to(*to))
            .map(|to| to.to_string())
            .collect();
        println!("{:<10} -> {}", from.to_string(), targets.join(", "));
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    init_logging(&config.log).context("failed to initialize logging")?;
    tracing::debug!(version = VERSION, "wsc starting");

    match cli.command {
        Command::Run {
            scenario,
            strict,
            pretty,
        } => {
            let parsed = Scenario::load(&scenario)?;
            tracing::info!(
                scenario = %scenario.display(),
                windows = parsed.windows.len(),
                steps = parsed.steps.len(),
                "running scenario"
            );
            let registry = SessionRegistry::new(config);
            let report = Runner::new(registry, &parsed).await?.run(&parsed).await?;
            let text = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{text}");
            if strict && !report.passed {
                return Ok(ExitCode::from(2));
            }
        }
        Command::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Command::States => print_states(),
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("wsc: {err:#}");
            ExitCode::FAILURE
        }
    }
}
