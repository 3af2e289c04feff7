//! # NeuraFlix CLI Module
//!
//! ## Available Commands
//!
//! - `serve` - Run the MCP tool server (stdio, or HTTP with `--http`)
//! - `insert` - Run the pipeline for one or more titles
//! - `prompt` - Extract titles from free text and insert them
//! - `status` - Show vertex and edge counts
//! - `check` - Report missing or invalid configuration

mod commands;

use crate::config::Config;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// NeuraFlix - movie metadata into a knowledge graph
///
/// Fetches movie details from OMDb, stores posters in blob storage, and
/// upserts movies, directors and actors into a graph database.
#[derive(Parser, Debug)]
#[command(name = "neuraflix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file (environment variables override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP tool server
    Serve {
        /// Serve streamable HTTP on this address instead of stdio
        #[arg(long, value_name = "ADDR")]
        http: Option<String>,
    },

    /// Insert movies by title
    Insert {
        /// Movie titles
        #[arg(required = true)]
        titles: Vec<String>,
    },

    /// Extract titles from a free-text request and insert them
    Prompt {
        /// The request, e.g. "add the first three Star Wars films"
        text: String,
    },

    /// Show graph status
    Status,

    /// Validate configuration
    Check,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Serve { http }) => cmd_serve(&config, http.as_deref()).await,
        Some(Commands::Insert { titles }) => cmd_insert(&config, json_mode, &titles).await,
        Some(Commands::Prompt { text }) => cmd_prompt(&config, json_mode, &text).await,
        Some(Commands::Status) => cmd_status(&config, json_mode).await,
        Some(Commands::Check) => cmd_check(&config, json_mode),
        None => {
            // No subcommand - serve over stdio by default
            cmd_serve(&config, None).await
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
