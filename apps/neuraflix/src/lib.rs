//! # NeuraFlix
//!
//! Tool server that turns movie titles into graph data:
//!
//! ```text
//! title(s) ─▶ OMDb ─▶ {record | miss} ─▶ poster ─▶ blob URL ─▶ graph upsert ─▶ status line
//!                                                                   │
//!                                              neuraflix-core (model, protocol, stores)
//! ```
//!
//! The graph model and upsert protocol live in `neuraflix-core`; this crate
//! adds everything that touches the network or the runtime.

pub mod backend;
pub mod blob;
pub mod cli;
pub mod config;
pub mod error;
pub mod gremlin_client;
pub mod llm;
pub mod mcp;
pub mod omdb;
pub mod pipeline;
pub mod stager;

use backend::{GraphBackend, UpsertWriter};
use blob::{AzureBlobStore, AzureConnection, BlobStore, LocalBlobStore};
use config::{BlobBackendKind, Config};
use error::{AppError, ConfigError};
use llm::{ChatCompletionsClient, TitleExtractor};
use neuraflix_core::Upserter;
use omdb::OmdbClient;
use pipeline::Context;
use stager::PosterStager;
use std::sync::Arc;

/// Build the blob store selected by `config`.
pub fn blob_store(config: &Config) -> Result<Arc<dyn BlobStore>, ConfigError> {
    Ok(match config.blob_backend {
        BlobBackendKind::Azure => {
            let raw = config.azure_connection_string.as_deref().ok_or_else(|| {
                ConfigError::Missing(config::AZURE_STORAGE_CONNECTION_STRING.to_string())
            })?;
            let container = config.azure_container.clone().ok_or_else(|| {
                ConfigError::Missing(config::AZURE_STORAGE_CONTAINER_NAME.to_string())
            })?;
            Arc::new(AzureBlobStore::new(
                AzureConnection::parse(raw)?,
                container,
                config.http_timeout(),
            ))
        }
        BlobBackendKind::Local => Arc::new(LocalBlobStore::new(
            config.blob_dir.clone(),
            config.blob_base_url.clone(),
        )),
    })
}

/// Wire a pipeline context from a validated configuration.
pub fn build_context(config: &Config) -> Result<Context, AppError> {
    config.validate()?;
    build_context_with(config, GraphBackend::from_config(config)?)
}

/// Like [`build_context`], writing to an already opened graph backend.
pub fn build_context_with(config: &Config, backend: GraphBackend) -> Result<Context, AppError> {
    config.validate()?;

    let api_key = config
        .omdb_api_key
        .clone()
        .ok_or_else(|| ConfigError::Missing(config::OMDB_API_KEY.to_string()))?;
    let metadata = Arc::new(OmdbClient::new(
        config.omdb_url.clone(),
        api_key,
        config.http_timeout(),
    ));

    let stager = Arc::new(PosterStager::new(
        blob_store(config)?,
        config.staging_dir.clone(),
        config.http_timeout(),
    ));

    let writer = Arc::new(UpsertWriter::new(
        backend,
        Upserter::new(config.edge_policy),
        config.title_timeout(),
    ));

    let mut context = Context::new(metadata, stager, writer)
        .with_title_timeout(config.title_timeout())
        .with_concurrency(config.concurrency);

    match &config.llm_api_key {
        Some(key) => {
            let client = ChatCompletionsClient::new(
                config.llm_base_url.clone(),
                config.llm_model.clone(),
                key.clone(),
            );
            context = context.with_extractor(TitleExtractor::new(
                Arc::new(client),
                config.title_timeout(),
            ));
        }
        None => tracing::info!("{} not set; prompt extraction disabled", config::GROQ_API_KEY),
    }

    tracing::info!(config = %config.summary(), "pipeline ready");
    Ok(context)
}
