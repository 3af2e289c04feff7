//! # NeuraFlix MCP Server
//!
//! Implements `ServerHandler` with three tools over the shared pipeline
//! [`Context`].

use crate::pipeline::Context;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP front end for the insert pipeline.
#[derive(Clone)]
pub struct NeuraflixMcp {
    context: Context,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InsertMovieParams {
    /// The title of the movie to fetch and insert.
    #[schemars(description = "The title of the movie to fetch and insert")]
    pub title: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InsertFromPromptParams {
    /// Free-text request naming or describing movies.
    #[schemars(description = "Free-text request naming or describing one or more movies")]
    pub prompt: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EchoParams {
    /// Text to send back.
    #[schemars(description = "Text to send back")]
    pub message: String,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl NeuraflixMcp {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Insert a movie and its metadata into the NeuraFlix knowledge graph. \
        Fetches details from OMDb, copies the poster into blob storage, and upserts the movie, \
        its directors (Directed edges to the movie) and its actors (ActedIn edges from the movie). \
        Returns a status line."
    )]
    async fn insert_movie_with_details(
        &self,
        params: Parameters<InsertMovieParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.context.process_one(&params.0.title).await;
        Ok(CallToolResult::success(vec![Content::text(outcome.to_string())]))
    }

    #[tool(
        description = "Extract movie titles from a free-text request with a language model and \
        insert each one. Returns one status line per title, in order."
    )]
    async fn insert_movies_from_prompt(
        &self,
        params: Parameters<InsertFromPromptParams>,
    ) -> Result<CallToolResult, McpError> {
        let text = self.context.prompt_status(&params.0.prompt).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Diagnostic echo; answers `ok: <message>`")]
    async fn echo(&self, params: Parameters<EchoParams>) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(echo_text(
            &params.0.message,
        ))]))
    }
}

fn echo_text(message: &str) -> String {
    format!("ok: {message}")
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for NeuraflixMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "NeuraFlix movie graph server. Use insert_movie_with_details for a known title, \
                 insert_movies_from_prompt for a free-text request, echo to check the connection."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
