//! ChainSieve CLI: inspect and exercise datasource filters offline.
//!
//! # Commands
//! ```
//! chainsieve topic    <event signature>
//! chainsieve selector <function signature>
//! chainsieve validate --config <project.yaml>
//! chainsieve query    --config <project.yaml>
//! chainsieve run      --config <project.yaml> --datasource <i> --handler <j> --input <record.json>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chainsieve_core::{event_signature_to_topic, function_signature_to_selector, CollectingDiagnostics};
use chainsieve_observability::{init_tracing, LogConfig, MeteredDiagnostics, SieveMetrics};

mod cmd_run;
mod config;
mod plugins;

use config::ProjectConfig;

#[derive(Parser)]
#[command(
    name = "chainsieve",
    about = "Filter and normalize EVM and WASM contract activity on Substrate and Cosmos chains",
    version
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Topic hash of an event signature, e.g. "Transfer(address,address,uint256)"
    Topic {
        signature: String,
    },

    /// 4-byte selector of a function signature or hex token
    Selector {
        signature: String,
    },

    /// Validate every datasource in a project config
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the dictionary query of every handler
    Query {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Filter then transform one raw record with one handler
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Datasource position in the config
        #[arg(long, default_value_t = 0)]
        datasource: usize,
        /// Handler position within the datasource
        #[arg(long, default_value_t = 0)]
        handler: usize,
        /// Raw host record (JSON file)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Topic { signature } => {
            setup_logging(&LogConfig::default(), cli.verbose);
            println!("{}", event_signature_to_topic(&signature).context("derive topic")?);
            Ok(())
        }

        Commands::Selector { signature } => {
            setup_logging(&LogConfig::default(), cli.verbose);
            println!("{}", function_signature_to_selector(&signature).context("derive selector")?);
            Ok(())
        }

        Commands::Validate { config } => {
            let loaded = ProjectConfig::load(&config)?;
            setup_logging(&loaded.config.log, cli.verbose);
            cmd_run::validate(&loaded)
        }

        Commands::Query { config } => {
            let loaded = ProjectConfig::load(&config)?;
            setup_logging(&loaded.config.log, cli.verbose);
            let diagnostics = metered();
            let result = cmd_run::query(&loaded, &diagnostics);
            report(&diagnostics);
            result
        }

        Commands::Run {
            config,
            datasource,
            handler,
            input,
        } => {
            let loaded = ProjectConfig::load(&config)?;
            setup_logging(&loaded.config.log, cli.verbose);
            let diagnostics = metered();
            let result = cmd_run::run(&loaded, datasource, handler, &input, &diagnostics);
            report(&diagnostics);
            result
        }
    }
}

fn setup_logging(config: &LogConfig, verbose: bool) {
    let mut config = config.clone();
    if verbose {
        config.level = "debug".into();
    }
    if let Err(e) = init_tracing(&config) {
        eprintln!("logging disabled: {e}");
    }
}

fn metered() -> MeteredDiagnostics<CollectingDiagnostics> {
    MeteredDiagnostics::new(CollectingDiagnostics::new(), SieveMetrics::global())
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn report(diagnostics: &MeteredDiagnostics<CollectingDiagnostics>) {
    for d in diagnostics.inner().entries() {
        eprintln!("warning[{}]: {}", d.kind, d.message);
    }
}
