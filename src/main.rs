//! CLI entry point for labshell.
//!
//! # Usage
//!
//! Run the startup plugins and list every instrument:
//! ```bash
//! labshell run shell_plugins
//! ```
//!
//! Read one value:
//! ```bash
//! labshell get shell_plugins --instrument combined --parameter magnet
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labshell::logging::{self, OutputFormat, TracingConfig};
use labshell::{run_path, InstrumentHandle, InstrumentRegistry, ShellConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labshell")]
#[command(about = "Instrument shell with simulated and virtual instruments", long_about = None)]
struct Cli {
    /// Shell config file (default: labshell.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format override
    #[arg(long, global = true, value_enum)]
    log_format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run shell plugins, then list all instruments and their values
    Run {
        /// Plugin files or directories (default: plugin_paths from config)
        paths: Vec<PathBuf>,
    },

    /// Run shell plugins, then print one parameter
    Get {
        /// Plugin files or directories (default: plugin_paths from config)
        paths: Vec<PathBuf>,

        /// Instrument name
        #[arg(long)]
        instrument: String,

        /// Parameter name
        #[arg(long)]
        parameter: String,
    },

    /// List registered instrument types
    Types,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ShellConfig::load_from(path),
        None => ShellConfig::load(),
    }
    .context("Failed to load shell configuration")?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    config.validate()?;
    logging::init(TracingConfig::from_shell_config(&config)?)?;

    let registry = InstrumentRegistry::with_default_factories();

    match cli.command {
        Commands::Run { paths } => {
            run_plugins(&registry, paths, &config).await?;
            print_instruments(&registry).await;
        }
        Commands::Get {
            paths,
            instrument,
            parameter,
        } => {
            run_plugins(&registry, paths, &config).await?;
            let handle = registry
                .get(&instrument)
                .with_context(|| format!("no instrument named '{}'", instrument))?;
            println!("{}", handle.format_value(&parameter).await?);
        }
        Commands::Types => {
            for info in registry.types() {
                println!("{:<24} {}", info.instrument_type, info.name);
            }
        }
    }

    Ok(())
}

async fn run_plugins(
    registry: &InstrumentRegistry,
    paths: Vec<PathBuf>,
    config: &ShellConfig,
) -> Result<()> {
    let paths = if paths.is_empty() {
        config.plugin_paths.clone()
    } else {
        paths
    };
    for path in &paths {
        run_path(path, registry).await?;
    }
    Ok(())
}

async fn print_instruments(registry: &InstrumentRegistry) {
    for name in registry.names() {
        if let Some(handle) = registry.get(&name) {
            print_instrument(&handle).await;
        }
    }
}

async fn print_instrument(handle: &InstrumentHandle) {
    println!("{} ({})", handle.name(), handle.instrument_type());
    for info in handle.parameters() {
        let value = if !info.access.is_readable() {
            "-".to_string()
        } else {
            match handle.format_value(&info.name).await {
                Ok(value) => value,
                Err(e) => format!("<{}>", e),
            }
        };
        println!("  {:<14} {:<8} {}", info.name, info.access.label(), value);
    }
}
