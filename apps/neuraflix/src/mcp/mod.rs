//! # MCP Transports
//!
//! The same [`NeuraflixMcp`] handler served two ways:
//!
//! - stdio (default): stdout carries protocol frames only, logs go to stderr
//! - streamable HTTP: `POST/GET /mcp` plus `GET /health`, behind axum

mod server;

pub use server::NeuraflixMcp;

use crate::error::AppError;
use crate::pipeline::Context;
use axum::{Json, Router, routing::get};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn serve_stdio(context: Context) -> Result<(), AppError> {
    tracing::info!("MCP server starting on stdio");
    let service = NeuraflixMcp::new(context)
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP serve error: {:?}", e))
        .map_err(|e| AppError::Server(e.to_string()))?;

    service
        .waiting()
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;
    Ok(())
}

/// Axum router exposing the MCP endpoint and a liveness check.
pub fn router(context: Context) -> Router {
    let mcp_service = StreamableHttpService::new(
        move || Ok(NeuraflixMcp::new(context.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .route("/mcp", axum::routing::any_service(mcp_service))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
}

/// Serve MCP over streamable HTTP until Ctrl-C.
pub async fn serve_http(context: Context, addr: &str) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "MCP server listening on /mcp");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
