//! # NeuraFlix - Movie Graph Tool Server
//!
//! The binary for the NeuraFlix pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    apps/neuraflix (THE BINARY)                   │
//! │                                                                  │
//! │  ┌─────────────┐    ┌──────────────────┐    ┌────────────────┐  │
//! │  │   CLI       │    │  MCP tools       │    │  Title         │  │
//! │  │  (clap)     │    │  (rmcp + axum)   │    │  extractor     │  │
//! │  └──────┬──────┘    └────────┬─────────┘    └───────┬────────┘  │
//! │         └────────────────────┼──────────────────────┘           │
//! │                              ▼                                  │
//! │              pipeline: OMDb ─▶ poster ─▶ graph                  │
//! │                              │                                  │
//! │                    ┌─────────▼────────┐                         │
//! │                    │  neuraflix-core  │                         │
//! │                    │   (THE LOGIC)    │                         │
//! │                    └──────────────────┘                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # MCP over stdio (what desktop MCP clients launch)
//! neuraflix serve
//!
//! # MCP over streamable HTTP
//! neuraflix serve --http 0.0.0.0:8080
//!
//! # One-off inserts
//! neuraflix insert "Toy Story" "Cars"
//! neuraflix prompt "the three original Star Wars films"
//! ```

use clap::Parser;
use neuraflix::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Logs go to stderr; stdout belongs to the MCP stdio transport.
    // NEURAFLIX_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NEURAFLIX_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "neuraflix=debug,neuraflix_core=debug,tower_http=debug"
    } else {
        "neuraflix=info,neuraflix_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(false),
                )
                .init();
        }
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
