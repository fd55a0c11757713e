//! Catalog daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, reconcile, index, doc)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, DocCommands, IndexCommands, PageArgs};
pub use commands::{
    catalog_failure, handle_doc, handle_index, load_settings, run_reconcile, start_daemon,
    startup, wait_for_engine,
};
