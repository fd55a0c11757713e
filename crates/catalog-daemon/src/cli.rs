//! CLI argument parsing for the catalog daemon.
//!
//! CLI flags override every other configuration source.

use clap::{Args, Parser, Subcommand};

/// Index Catalog Daemon
///
/// Keeps a registry of search indices consistent with the search engine.
#[derive(Parser, Debug)]
#[command(name = "catalog-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/index-catalog/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override registry database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Override engine base URL
    #[arg(long, global = true)]
    pub engine_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile, then keep reconciling periodically until interrupted
    Start {
        /// Override seconds between reconciliation passes (0 disables)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run one reconciliation pass and print the report
    Reconcile,

    /// Index lifecycle commands
    #[command(subcommand)]
    Index(IndexCommands),

    /// Document commands
    #[command(subcommand)]
    Doc(DocCommands),
}

/// Page selection shared by listing and search commands
#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    /// 1-based page number
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Hits per page (1-50)
    #[arg(long, default_value = "20")]
    pub size: u32,
}

/// Index subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommands {
    /// List engine indices with their registry metadata
    List,

    /// Create an index
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Delete an index from the engine and the registry
    Delete { name: String },

    /// Update the description and/or alias of an index
    Update {
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        alias: Option<String>,
    },

    /// Match one field of an index or alias
    Search {
        name: String,
        field: String,
        query: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Remove a registry row whose engine index is gone
    Forget { name: String },
}

/// Document subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DocCommands {
    /// Add a document (JSON object)
    Add {
        index: String,
        body: String,

        /// Document id; generated when omitted
        #[arg(long)]
        id: Option<String>,
    },

    /// Fetch a document by id
    Get { index: String, id: String },

    /// Merge a partial JSON object into a document
    Update {
        index: String,
        id: String,
        partial: String,
    },

    /// Delete a document by id
    Delete { index: String, id: String },

    /// Delete every document whose field matches the query
    DeleteByQuery {
        index: String,
        field: String,
        query: String,
    },

    /// List documents
    List {
        index: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Free-text search over one or more fields
    Search {
        index: String,
        text: String,

        /// Field to search; repeat for several
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,

        #[command(flatten)]
        page: PageArgs,
    },
}
