//! # Metadata Fetcher
//!
//! Looks a title up in OMDb (`GET ?t=<title>&apikey=<key>`) and normalizes
//! the answer with [`neuraflix_core::metadata`].
//!
//! A `"Response": "False"` body is a miss, not a failure. Transport errors,
//! timeouts and non-2xx answers are [`FetchError`]s.

use crate::error::FetchError;
use async_trait::async_trait;
use neuraflix_core::Lookup;
use neuraflix_core::metadata::parse_payload;
use std::time::Duration;

/// Anything that can resolve a title to a movie record.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, title: &str) -> Result<Lookup, FetchError>;
}

/// OMDb HTTP client.
#[derive(Clone)]
pub struct OmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OmdbClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MetadataSource for OmdbClient {
    async fn fetch(&self, title: &str) -> Result<Lookup, FetchError> {
        tracing::debug!(title, url = %self.base_url, "metadata lookup");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("t", title), ("apikey", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout.as_secs())
                } else {
                    FetchError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout.as_secs())
            } else {
                FetchError::Transport(e.without_url().to_string())
            }
        })?;

        Ok(parse_payload(&body, title)?)
    }
}
