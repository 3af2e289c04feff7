//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::backend::GraphBackend;
use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::pipeline::{NO_TITLES, Outcome, render};
use crate::{build_context, mcp};

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Run the MCP tool server.
pub async fn cmd_serve(config: &Config, http: Option<&str>) -> Result<(), AppError> {
    let context = build_context(config)?;
    match http {
        Some(addr) => mcp::serve_http(context, addr).await,
        None => mcp::serve_stdio(context).await,
    }
}

// =============================================================================
// INSERT / PROMPT COMMANDS
// =============================================================================

fn print_outcomes(outcomes: &[Outcome], json_mode: bool) {
    if json_mode {
        let rows: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|o| {
                serde_json::json!({
                    "status": o.label(),
                    "message": o.to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(rows));
    } else if outcomes.is_empty() {
        println!("{NO_TITLES}");
    } else {
        println!("{}", render(outcomes));
    }
}

/// Run the pipeline for each title, in order.
pub async fn cmd_insert(config: &Config, json_mode: bool, titles: &[String]) -> Result<(), AppError> {
    let context = build_context(config)?;
    let outcomes = context.process_many(titles).await;
    print_outcomes(&outcomes, json_mode);
    Ok(())
}

/// Extract titles from `text`, then insert them.
pub async fn cmd_prompt(config: &Config, json_mode: bool, text: &str) -> Result<(), AppError> {
    let context = build_context(config)?;
    let outcomes = context.process_prompt(text).await?;
    print_outcomes(&outcomes, json_mode);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show vertex and edge counts of the configured graph.
pub async fn cmd_status(config: &Config, json_mode: bool) -> Result<(), AppError> {
    let backend = GraphBackend::from_config(config)?;
    let stats = backend
        .stats(config.title_timeout())
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    if json_mode {
        let output = serde_json::json!({
            "backend": format!("{:?}", config.graph_backend).to_lowercase(),
            "vertices": stats.vertices,
            "edges": stats.edges,
        });
        println!("{output}");
    } else {
        println!("Graph Status:");
        println!("  Backend:  {:?}", config.graph_backend);
        println!("  Vertices: {}", stats.vertices);
        println!("  Edges:    {}", stats.edges);
    }
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Report missing credentials and invalid settings.
pub fn cmd_check(config: &Config, json_mode: bool) -> Result<(), AppError> {
    let result = config.validate();

    if json_mode {
        let output = serde_json::json!({
            "valid": result.is_ok(),
            "missing": config.missing(),
            "error": result.as_ref().err().map(ToString::to_string),
            "summary": config.summary(),
        });
        println!("{output}");
    } else {
        println!("Configuration: {}", config.summary());
        match &result {
            Ok(()) => println!("  OK"),
            Err(ConfigError::Missing(_)) => {
                for key in config.missing() {
                    println!("  missing: {key}");
                }
            }
            Err(e) => println!("  error: {e}"),
        }
    }
    result.map_err(AppError::from)
}
