//! # Error Types
//!
//! One enum per pipeline boundary. All of them are caught at the single-title
//! boundary in [`crate::pipeline`] and turned into a status line; only
//! [`ConfigError`] and [`AppError`] ever reach the process exit code.

use neuraflix_core::{NeuraflixError, UpsertFailure};
use thiserror::Error;

/// Invalid or missing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing configuration: {0}")]
    Missing(String),

    /// A variable is set but cannot be used.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// The TOML config file could not be read or parsed.
    #[error("config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// The metadata source could not be asked or did not answer usefully.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("metadata request failed: {0}")]
    Transport(String),

    #[error("metadata request timed out after {0}s")]
    Timeout(u64),

    #[error("metadata source answered HTTP {status}")]
    Status { status: u16 },

    #[error("metadata payload unreadable: {0}")]
    Payload(#[from] NeuraflixError),
}

/// The poster could not be copied into blob storage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("no poster")]
    NoPoster,

    #[error("poster download failed: {0}")]
    Download(String),

    #[error("poster upload failed: {0}")]
    Upload(String),

    #[error("staging file error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Whether the failure happened before anything reached blob storage.
    #[must_use]
    pub fn is_download(&self) -> bool {
        matches!(self, Self::Download(_) | Self::Io(_))
    }
}

/// A graph write failed for one title. Earlier writes stay in place.
#[derive(Debug, Error)]
pub enum GraphWriteError {
    #[error(transparent)]
    Upsert(#[from] UpsertFailure),

    #[error("graph session failed: {0}")]
    Session(#[from] NeuraflixError),

    #[error("graph worker stopped: {0}")]
    Worker(String),

    #[error("graph write timed out after {0}s")]
    Timeout(u64),
}

/// Title extraction from free text failed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("title extraction is not configured: {0}")]
    NotConfigured(String),

    #[error("language model request failed: {0}")]
    Transport(String),

    #[error("language model answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model reply unreadable: {0}")]
    Reply(String),

    #[error("title extraction timed out after {0}s")]
    Timeout(u64),
}

/// Top-level error for the CLI and server startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] NeuraflixError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}
