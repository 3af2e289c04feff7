//! # Poster Stager
//!
//! Download → transient file → blob store → URL.
//!
//! The body is streamed into the transient file as it arrives; a poster is
//! never held in memory whole.
//!
//! The transient copy is a [`tempfile::NamedTempFile`]; it is removed when it
//! goes out of scope, so every exit path (download failure, upload failure,
//! success, cancellation) leaves nothing behind.

use crate::blob::BlobStore;
use crate::error::StageError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Filename used when the poster URL has no usable last segment.
const FALLBACK_FILENAME: &str = "poster.jpg";

/// Longest filename kept from the poster URL.
const MAX_FILENAME_LENGTH: usize = 100;

/// Copies a remote poster into durable storage.
#[async_trait]
pub trait AssetStager: Send + Sync {
    /// Returns the durable URL. `None` or an empty URL is [`StageError::NoPoster`].
    async fn stage(&self, poster_url: Option<&str>) -> Result<String, StageError>;
}

/// Keep `[A-Za-z0-9._-]`, replace the rest, so blob names need no escaping.
fn sanitize(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_LENGTH)
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Original filename of a poster URL, sanitized.
pub fn poster_filename(url: &reqwest::Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    sanitize(last)
}

/// `{random-id}-{original-filename}`. Uniqueness rests on the random id alone.
pub fn blob_name(url: &reqwest::Url) -> String {
    format!("{}-{}", uuid::Uuid::new_v4(), poster_filename(url))
}

/// Stager backed by HTTP download and a [`BlobStore`].
#[derive(Clone)]
pub struct PosterStager {
    http: reqwest::Client,
    blobs: Arc<dyn BlobStore>,
    staging_dir: Option<PathBuf>,
    timeout: Duration,
}

impl PosterStager {
    pub fn new(blobs: Arc<dyn BlobStore>, staging_dir: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            blobs,
            staging_dir,
            timeout,
        }
    }

    fn transient_file(&self) -> Result<tempfile::NamedTempFile, StageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("neuraflix-poster-");
        let file = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    /// Start the poster request; fails on transport errors and non-2xx.
    async fn request(&self, url: &reqwest::Url) -> Result<reqwest::Response, StageError> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StageError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Download(format!("HTTP {}", status.as_u16())));
        }
        Ok(response)
    }

    /// Stream the response body into `transient` chunk by chunk.
    async fn download_into(
        mut response: reqwest::Response,
        transient: &tempfile::NamedTempFile,
    ) -> Result<u64, StageError> {
        let mut file = tokio::fs::File::from_std(transient.as_file().try_clone()?);
        let mut size = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StageError::Download(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(size)
    }
}

#[async_trait]
impl AssetStager for PosterStager {
    async fn stage(&self, poster_url: Option<&str>) -> Result<String, StageError> {
        let raw = poster_url.map(str::trim).filter(|u| !u.is_empty()).ok_or(StageError::NoPoster)?;
        let url = reqwest::Url::parse(raw).map_err(|e| StageError::Download(format!("{raw}: {e}")))?;
        let name = blob_name(&url);

        let response = self.request(&url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Dropping `transient` on an early return removes it.
        let transient = self.transient_file()?;
        let size = Self::download_into(response, &transient).await?;
        tracing::debug!(path = %transient.path().display(), size, "poster staged");

        let uploaded = self
            .blobs
            .upload(&name, transient.path(), content_type.as_deref())
            .await;

        // Removal errors are logged; the upload result stands.
        if let Err(e) = transient.close() {
            tracing::warn!(error = %e, "could not remove transient poster");
        }

        let blob_url = uploaded?;
        tracing::info!(blob = %name, store = %self.blobs.describe(), "poster uploaded");
        Ok(blob_url)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> reqwest::Url {
        reqwest::Url::parse(s).expect("url")
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            poster_filename(&url("https://m.media-amazon.com/images/M/MV5B@._V1_SX300.jpg?x=1")),
            "MV5B_._V1_SX300.jpg"
        );
        assert_eq!(poster_filename(&url("https://example.com/")), "poster.jpg");
        assert_eq!(poster_filename(&url("https://example.com/a%20b.png")), "a_20b.png");
    }

    #[test]
    fn blob_names_are_prefixed_and_distinct() {
        let poster = url("https://example.com/toy.jpg");
        let a = blob_name(&poster);
        let b = blob_name(&poster);
        assert!(a.ends_with("-toy.jpg"));
        assert_eq!(a.len(), 36 + 1 + "toy.jpg".len());
        assert_ne!(a, b);
    }

    #[test]
    fn long_filenames_are_capped() {
        let long = format!("https://example.com/{}.jpg", "x".repeat(300));
        assert_eq!(poster_filename(&url(&long)).len(), MAX_FILENAME_LENGTH);
    }
}
