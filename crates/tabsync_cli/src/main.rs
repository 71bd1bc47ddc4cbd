//! tabsync CLI
//!
//! Command-line tools for tabsync.
//!
//! # Commands
//!
//! - `schema` - Print the materialized ClickHouse schema of the sample tables
//! - `scopes` - Print the scopes each root table fans out to
//! - `sync` - Run the sample tables into an in-memory ClickHouse destination

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tabsync command-line tools.
#[derive(Parser)]
#[command(name = "tabsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a scope catalog (JSON)
    #[arg(global = true, short, long)]
    catalog: Option<PathBuf>,

    /// Path to a sync configuration (JSON)
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print materialized table schemas
    Schema {
        /// Output format (text, json, sql)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the scopes every root table runs in
    Scopes,

    /// Run a sync into an in-memory destination
    Sync {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let catalog = commands::load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Commands::Schema { format } => {
            commands::schema::run(&config, &format)?;
        }
        Commands::Scopes => {
            commands::scopes::run(&config, &catalog)?;
        }
        Commands::Sync { format } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::sync::run(config, catalog, &format))?;
        }
        Commands::Version => {
            println!("tabsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
