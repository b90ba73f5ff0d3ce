//! Tandem CLI tool
//!
//! Runs built-in workloads on the cooperative scheduler and prints the order
//! in which tasks held the permit.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tandem_cli::{CliConfig, Scenario};
use tracing::info;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Cooperative priority scheduler workbench", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a built-in scenario and print its dispatch journal
    Run {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: Scenario,
        /// Steps a task may take before it is preempted
        #[arg(short, long)]
        quantum: Option<u32>,
        /// Number of event ids
        #[arg(short, long)]
        events: Option<u32>,
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the built-in scenarios
    Scenarios,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            quantum,
            events,
            config,
        } => {
            let file = CliConfig::load(config.as_deref())?;
            let config = file.resolve(quantum, events)?;
            info!(
                scenario = scenario.name(),
                quantum = config.quantum,
                event_space = config.event_space,
                "running scenario"
            );

            let report = scenario.run(&config)?;
            println!("{}", report);
        }

        Commands::Scenarios => {
            for scenario in Scenario::ALL {
                println!("{:<12} {}", scenario.name(), scenario.description());
            }
        }
    }

    Ok(())
}
