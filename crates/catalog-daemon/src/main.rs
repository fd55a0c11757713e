//! Index Catalog Daemon
//!
//! Keeps a registry of search indices consistent with the search engine and
//! exposes index and document operations on the command line.
//!
//! # Usage
//!
//! ```bash
//! catalog-daemon start [--interval SECS]
//! catalog-daemon reconcile
//! catalog-daemon index list|create|delete|update|search|forget ...
//! catalog-daemon doc add|get|update|delete|delete-by-query|list|search ...
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/index-catalog/config.toml)
//! 3. Environment variables (CATALOG_*, e.g. CATALOG_ENGINE__URL)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use catalog_daemon::{handle_doc, handle_index, run_reconcile, start_daemon, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Start { interval } => {
            start_daemon(&cli, *interval).await?;
        }
        Commands::Reconcile => {
            run_reconcile(&cli).await?;
        }
        Commands::Index(cmd) => {
            handle_index(&cli, cmd.clone()).await?;
        }
        Commands::Doc(cmd) => {
            handle_doc(&cli, cmd.clone()).await?;
        }
    }

    Ok(())
}
