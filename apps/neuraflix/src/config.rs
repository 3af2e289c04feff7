//! # Configuration
//!
//! Layered, last one wins:
//!
//! 1. built-in defaults
//! 2. optional TOML file (`--config neuraflix.toml`)
//! 3. `.env` in the working directory (absent is fine)
//! 4. process environment
//!
//! Credentials keep the variable names the deployment already uses
//! (`OMDB_API_KEY`, `GREMLIN_*`, `AZURE_STORAGE_*`, `GROQ_API_KEY`); knobs
//! specific to this server are prefixed with `NEURAFLIX_`.

use crate::blob::AzureConnection;
use crate::error::ConfigError;
use crate::gremlin_client::Transport;
use neuraflix_core::EdgePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// VARIABLE NAMES
// =============================================================================

pub const OMDB_API_KEY: &str = "OMDB_API_KEY";
pub const AZURE_STORAGE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const AZURE_STORAGE_CONTAINER_NAME: &str = "AZURE_STORAGE_CONTAINER_NAME";
pub const GREMLIN_ENDPOINT: &str = "GREMLIN_ENDPOINT";
pub const GREMLIN_DB_NAME: &str = "GREMLIN_DB_NAME";
pub const GREMLIN_COLLECTION: &str = "GREMLIN_COLLECTION";
pub const GREMLIN_PK: &str = "GREMLIN_PK";
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";

const OMDB_URL: &str = "NEURAFLIX_OMDB_URL";
const GRAPH_BACKEND: &str = "NEURAFLIX_GRAPH_BACKEND";
const GRAPH_PATH: &str = "NEURAFLIX_GRAPH_PATH";
const BLOB_BACKEND: &str = "NEURAFLIX_BLOB_BACKEND";
const BLOB_DIR: &str = "NEURAFLIX_BLOB_DIR";
const BLOB_BASE_URL: &str = "NEURAFLIX_BLOB_BASE_URL";
const EDGE_POLICY: &str = "NEURAFLIX_EDGE_POLICY";
const LLM_BASE_URL: &str = "NEURAFLIX_LLM_BASE_URL";
const LLM_MODEL: &str = "NEURAFLIX_LLM_MODEL";
const HTTP_TIMEOUT_SECS: &str = "NEURAFLIX_HTTP_TIMEOUT_SECS";
const TITLE_TIMEOUT_SECS: &str = "NEURAFLIX_TITLE_TIMEOUT_SECS";
const CONCURRENCY: &str = "NEURAFLIX_CONCURRENCY";
const STAGING_DIR: &str = "NEURAFLIX_STAGING_DIR";

// =============================================================================
// DEFAULTS
// =============================================================================

const DEFAULT_OMDB_URL: &str = "http://www.omdbapi.com";
const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL: &str = "qwen/qwen3-32b";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_TITLE_TIMEOUT_SECS: u64 = 120;

/// Upper bound on parallel titles in one batch.
pub const MAX_CONCURRENCY: usize = 16;

// =============================================================================
// BACKEND SELECTORS
// =============================================================================

/// Where vertices and edges are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackendKind {
    /// Remote Gremlin Server / Cosmos DB over HTTP.
    #[default]
    Gremlin,
    /// Embedded redb file.
    Redb,
    /// Process memory, lost on exit.
    Memory,
}

impl FromStr for GraphBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gremlin" => Ok(Self::Gremlin),
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                key: GRAPH_BACKEND.to_string(),
                reason: format!("{other:?} is not one of gremlin, redb, memory"),
            }),
        }
    }
}

/// Where posters are copied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackendKind {
    /// Azure Blob Storage container.
    #[default]
    Azure,
    /// A local directory.
    Local,
}

impl FromStr for BlobBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::Invalid {
                key: BLOB_BACKEND.to_string(),
                reason: format!("{other:?} is not one of azure, local"),
            }),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Full server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub omdb_url: String,
    pub omdb_api_key: Option<String>,

    pub graph_backend: GraphBackendKind,
    pub gremlin_endpoint: Option<String>,
    pub gremlin_db_name: Option<String>,
    pub gremlin_collection: Option<String>,
    pub gremlin_pk: Option<String>,
    pub graph_path: PathBuf,
    pub edge_policy: EdgePolicy,

    pub blob_backend: BlobBackendKind,
    pub azure_connection_string: Option<String>,
    pub azure_container: Option<String>,
    pub blob_dir: PathBuf,
    pub blob_base_url: Option<String>,

    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,

    /// Per-request bound for metadata, poster and graph calls.
    pub http_timeout_secs: u64,
    /// Bound on one whole title (fetch, stage, upsert).
    pub title_timeout_secs: u64,
    /// Titles processed at once in a batch; 1 is sequential.
    pub concurrency: usize,
    /// Directory for transient poster copies; system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            omdb_url: DEFAULT_OMDB_URL.to_string(),
            omdb_api_key: None,
            graph_backend: GraphBackendKind::default(),
            gremlin_endpoint: None,
            gremlin_db_name: None,
            gremlin_collection: None,
            gremlin_pk: None,
            graph_path: PathBuf::from("neuraflix.redb"),
            edge_policy: EdgePolicy::default(),
            blob_backend: BlobBackendKind::default(),
            azure_connection_string: None,
            azure_container: None,
            blob_dir: PathBuf::from("posters"),
            blob_base_url: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            title_timeout_secs: DEFAULT_TITLE_TIMEOUT_SECS,
            concurrency: 1,
            staging_dir: None,
        }
    }
}

/// Read a non-empty variable through `lookup`.
fn read(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        reason: format!("{raw:?} is not a non-negative integer"),
    })
}

impl Config {
    /// Load all layers from the real environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        // A missing .env is normal.
        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file; unset fields keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::File { reason, .. } => ConfigError::File {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::File {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Override fields from variables returned by `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = read(&lookup, key) {
                *slot = Some(value);
            }
        };
        set(&mut self.omdb_api_key, OMDB_API_KEY);
        set(&mut self.azure_connection_string, AZURE_STORAGE_CONNECTION_STRING);
        set(&mut self.azure_container, AZURE_STORAGE_CONTAINER_NAME);
        set(&mut self.gremlin_endpoint, GREMLIN_ENDPOINT);
        set(&mut self.gremlin_db_name, GREMLIN_DB_NAME);
        set(&mut self.gremlin_collection, GREMLIN_COLLECTION);
        set(&mut self.gremlin_pk, GREMLIN_PK);
        set(&mut self.llm_api_key, GROQ_API_KEY);
        set(&mut self.blob_base_url, BLOB_BASE_URL);

        if let Some(v) = read(&lookup, OMDB_URL) {
            self.omdb_url = v;
        }
        if let Some(v) = read(&lookup, LLM_BASE_URL) {
            self.llm_base_url = v;
        }
        if let Some(v) = read(&lookup, LLM_MODEL) {
            self.llm_model = v;
        }
        if let Some(v) = read(&lookup, GRAPH_PATH) {
            self.graph_path = PathBuf::from(v);
        }
        if let Some(v) = read(&lookup, BLOB_DIR) {
            self.blob_dir = PathBuf::from(v);
        }
        if let Some(v) = read(&lookup, STAGING_DIR) {
            self.staging_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = read(&lookup, GRAPH_BACKEND) {
            self.graph_backend = v.parse()?;
        }
        if let Some(v) = read(&lookup, BLOB_BACKEND) {
            self.blob_backend = v.parse()?;
        }
        if let Some(v) = read(&lookup, EDGE_POLICY) {
            self.edge_policy = v.parse().map_err(|e: neuraflix_core::NeuraflixError| {
                ConfigError::Invalid {
                    key: EDGE_POLICY.to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = read(&lookup, HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = parse_number(HTTP_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = read(&lookup, TITLE_TIMEOUT_SECS) {
            self.title_timeout_secs = parse_number(TITLE_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = read(&lookup, CONCURRENCY) {
            self.concurrency = parse_number(CONCURRENCY, &v)?;
        }
        Ok(())
    }

    /// Names of required credentials that are unset for the selected backends.
    ///
    /// The language-model key is not listed: without it only prompt
    /// extraction is unavailable.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.omdb_api_key.is_none() {
            missing.push(OMDB_API_KEY);
        }
        if self.graph_backend == GraphBackendKind::Gremlin {
            for (value, key) in [
                (&self.gremlin_endpoint, GREMLIN_ENDPOINT),
                (&self.gremlin_db_name, GREMLIN_DB_NAME),
                (&self.gremlin_collection, GREMLIN_COLLECTION),
                (&self.gremlin_pk, GREMLIN_PK),
            ] {
                if value.is_none() {
                    missing.push(key);
                }
            }
        }
        if self.blob_backend == BlobBackendKind::Azure {
            if self.azure_connection_string.is_none() {
                missing.push(AZURE_STORAGE_CONNECTION_STRING);
            }
            if self.azure_container.is_none() {
                missing.push(AZURE_STORAGE_CONTAINER_NAME);
            }
        }
        missing
    }

    /// Refuse configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }
        if self.blob_backend == BlobBackendKind::Azure {
            if let Some(raw) = &self.azure_connection_string {
                AzureConnection::parse(raw)?;
            }
        }
        if self.graph_backend == GraphBackendKind::Gremlin {
            if let Some(endpoint) = &self.gremlin_endpoint {
                Transport::for_endpoint(endpoint)?;
            }
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: HTTP_TIMEOUT_SECS.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.title_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: TITLE_TIMEOUT_SECS.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid {
                key: CONCURRENCY.to_string(),
                reason: format!("must be between 1 and {MAX_CONCURRENCY}"),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.title_timeout_secs)
    }

    /// Redacted one-line summary for startup logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "graph={:?} blob={:?} edges={} concurrency={} llm={}",
            self.graph_backend,
            self.blob_backend,
            self.edge_policy,
            self.concurrency,
            if self.llm_api_key.is_some() { "configured" } else { "off" }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (OMDB_API_KEY, "omdb-key"),
            (AZURE_STORAGE_CONNECTION_STRING, "BlobEndpoint=https://a.blob.core.windows.net;SharedAccessSignature=sv=1"),
            (AZURE_STORAGE_CONTAINER_NAME, "posters"),
            (GREMLIN_ENDPOINT, "wss://g.example:443/"),
            (GREMLIN_DB_NAME, "movies"),
            (GREMLIN_COLLECTION, "graph"),
            (GREMLIN_PK, "secret"),
        ]
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.omdb_url, "http://www.omdbapi.com");
        assert_eq!(config.http_timeout_secs, 15);
        assert_eq!(config.llm_model, "qwen/qwen3-32b");
        assert_eq!(config.edge_policy, EdgePolicy::Unique);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn empty_environment_lists_every_credential() {
        let mut config = Config::default();
        config.apply_env(env(&[])).expect("apply");
        let missing = config.missing();
        assert_eq!(missing.len(), 7);
        assert!(missing.contains(&GREMLIN_PK));
        assert!(!missing.contains(&GROQ_API_KEY));
        assert!(matches!(config.validate(), Err(ConfigError::Missing(m)) if m.contains(OMDB_API_KEY)));
    }

    #[test]
    fn full_environment_validates() {
        let mut config = Config::default();
        config.apply_env(env(&full_env())).expect("apply");
        config.validate().expect("valid");
        assert_eq!(config.gremlin_db_name.as_deref(), Some("movies"));
    }

    #[test]
    fn account_key_connection_string_validates() {
        let mut config = Config::default();
        config.apply_env(env(&full_env())).expect("apply");
        config.azure_connection_string = Some(
            "DefaultEndpointsProtocol=https;AccountName=neuraflix;AccountKey=abc123==;EndpointSuffix=core.windows.net"
                .to_string(),
        );
        config.validate().expect("account key accepted");
    }

    #[test]
    fn unusable_connection_string_fails_validation() {
        let mut config = Config::default();
        config.apply_env(env(&full_env())).expect("apply");
        config.azure_connection_string = Some("AccountName=neuraflix".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == AZURE_STORAGE_CONNECTION_STRING
        ));

        // Not consulted when posters go to a local directory.
        config.blob_backend = BlobBackendKind::Local;
        config.validate().expect("local blobs");
    }

    #[test]
    fn gremlin_endpoint_needs_a_known_scheme() {
        let mut config = Config::default();
        config.apply_env(env(&full_env())).expect("apply");
        config.gremlin_endpoint = Some("https://g.example:443/".to_string());
        config.validate().expect("http endpoint");
        config.gremlin_endpoint = Some("g.example:443".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == GREMLIN_ENDPOINT
        ));
    }

    #[test]
    fn local_backends_need_only_omdb() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                (OMDB_API_KEY, "k"),
                (GRAPH_BACKEND, "redb"),
                (BLOB_BACKEND, "Local"),
                (GRAPH_PATH, "/tmp/g.redb"),
            ]))
            .expect("apply");
        assert!(config.missing().is_empty());
        assert_eq!(config.graph_backend, GraphBackendKind::Redb);
        assert_eq!(config.blob_backend, BlobBackendKind::Local);
        assert_eq!(config.graph_path, PathBuf::from("/tmp/g.redb"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let mut config = Config::default();
        config.apply_env(env(&[(OMDB_API_KEY, "   ")])).expect("apply");
        assert!(config.omdb_api_key.is_none());
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[(GRAPH_BACKEND, "neo4j")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[(HTTP_TIMEOUT_SECS, "-3")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[(EDGE_POLICY, "maybe")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn concurrency_bounds() {
        let mut config = Config::default();
        config.apply_env(env(&full_env())).expect("apply");
        config.concurrency = 0;
        assert!(config.validate().is_err());
        config.concurrency = MAX_CONCURRENCY + 1;
        assert!(config.validate().is_err());
        config.concurrency = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::from_toml_str(
            r#"
            omdb_api_key = "from-file"
            graph_backend = "memory"
            edge_policy = "duplicate"
            concurrency = 3
            "#,
        )
        .expect("toml");
        assert_eq!(config.graph_backend, GraphBackendKind::Memory);
        assert_eq!(config.edge_policy, EdgePolicy::Duplicate);
        assert_eq!(config.omdb_url, "http://www.omdbapi.com");

        config.apply_env(env(&[(OMDB_API_KEY, "from-env")])).expect("apply");
        assert_eq!(config.omdb_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn unknown_file_keys_are_errors() {
        assert!(matches!(
            Config::from_toml_str("omdb_apikey = \"typo\""),
            Err(ConfigError::File { .. })
        ));
    }

    #[test]
    fn toml_file_on_disk() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("neuraflix.toml");
        std::fs::write(&path, "blob_backend = \"local\"\nblob_dir = \"/srv/posters\"\n").expect("write");
        let config = Config::from_toml_file(&path).expect("load");
        assert_eq!(config.blob_backend, BlobBackendKind::Local);
        assert_eq!(config.blob_dir, PathBuf::from("/srv/posters"));

        let err = Config::from_toml_file(&dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::File { ref path, .. } if path.ends_with("absent.toml")));
    }

    #[test]
    fn summary_never_prints_secrets() {
        let mut config = Config::default();
        config.apply_env(env(&full_env())).expect("apply");
        config.llm_api_key = Some("gsk-secret".to_string());
        let summary = config.summary();
        assert!(!summary.contains("secret"));
        assert!(summary.contains("llm=configured"));
    }
}
