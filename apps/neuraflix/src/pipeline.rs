//! # Pipeline
//!
//! Fetch → Stage → Upsert for one title, and the batch wrapper around it.
//!
//! Every error is caught at the single-title boundary and becomes an
//! [`Outcome`]; a batch always yields one outcome per input title, in input
//! order, whatever happened to its siblings.

use crate::backend::GraphWriter;
use crate::error::{ExtractionError, StageError};
use crate::llm::TitleExtractor;
use crate::omdb::MetadataSource;
use crate::stager::AssetStager;
use neuraflix_core::metadata::validate_title;
use neuraflix_core::{Lookup, UpsertReport};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Status line when a prompt names no movies.
pub const NO_TITLES: &str = "No movie titles found in the request.";

// =============================================================================
// OUTCOME
// =============================================================================

/// Terminal result for one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted { title: String, report: UpsertReport },
    NotFound { title: String },
    FetchFailed { title: String, error: String },
    InvalidTitle { title: String, reason: String },
    NoPoster { title: String },
    PosterDownloadFailed { title: String, error: String },
    PosterUploadFailed { title: String, error: String },
    GraphWriteFailed { title: String, error: String },
    TimedOut { title: String, secs: u64 },
    /// The title's task panicked or was cancelled before it produced a result.
    Stopped { title: String, error: String },
}

impl Outcome {
    #[must_use]
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    /// Short machine label, used as the `status` log field.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::NotFound { .. } => "not_found",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::InvalidTitle { .. } => "invalid_title",
            Self::NoPoster { .. } => "no_poster",
            Self::PosterDownloadFailed { .. } => "poster_download_failed",
            Self::PosterUploadFailed { .. } => "poster_upload_failed",
            Self::GraphWriteFailed { .. } => "graph_write_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Stopped { .. } => "stopped",
        }
    }
}

/// The status string returned to tool callers.
///
/// A fetch failure reads like a miss; the difference is only in the logs.
impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted { title, .. } => write!(f, "Inserted: {title}"),
            Self::NotFound { title } | Self::FetchFailed { title, .. } => {
                write!(f, "Movie not found: {title}")
            }
            Self::InvalidTitle { title, reason } => write!(f, "Invalid title {title:?}: {reason}"),
            Self::NoPoster { .. } => f.write_str("Metadata fetched, poster download failed: no poster."),
            Self::PosterDownloadFailed { .. } => f.write_str("Metadata fetched, poster download failed."),
            Self::PosterUploadFailed { .. } => f.write_str("Metadata fetched, poster upload failed."),
            Self::GraphWriteFailed { title, error } => {
                write!(f, "Metadata fetched, graph write failed for {title}: {error}")
            }
            Self::TimedOut { title, secs } => write!(f, "Timed out after {secs}s: {title}"),
            Self::Stopped { title, error } => write!(f, "Processing stopped for {title}: {error}"),
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Everything the pipeline talks to. Built once, shared by all invocations.
#[derive(Clone)]
pub struct Context {
    pub metadata: Arc<dyn MetadataSource>,
    pub stager: Arc<dyn AssetStager>,
    pub graph: Arc<dyn GraphWriter>,
    /// `None` when no language model is configured.
    pub extractor: Option<TitleExtractor>,
    /// Bound on one whole title.
    pub title_timeout: Duration,
    /// Titles in flight at once during a batch.
    pub concurrency: usize,
}

impl Context {
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        stager: Arc<dyn AssetStager>,
        graph: Arc<dyn GraphWriter>,
    ) -> Self {
        Self {
            metadata,
            stager,
            graph,
            extractor: None,
            title_timeout: Duration::from_secs(120),
            concurrency: 1,
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: TitleExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn with_title_timeout(mut self, timeout: Duration) -> Self {
        self.title_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    // =========================================================================
    // ONE TITLE
    // =========================================================================

    /// Run the pipeline for one title. Never fails; see [`Outcome`].
    pub async fn process_one(&self, title: &str) -> Outcome {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.title_timeout, self.steps(title)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::TimedOut {
                title: title.trim().to_string(),
                secs: self.title_timeout.as_secs(),
            },
        };
        log_outcome(&outcome, started.elapsed());
        outcome
    }

    async fn steps(&self, requested: &str) -> Outcome {
        let title = match validate_title(requested) {
            Ok(title) => title,
            Err(e) => {
                return Outcome::InvalidTitle {
                    title: requested.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        let record = match self.metadata.fetch(title).await {
            Ok(Lookup::Found(record)) => record,
            Ok(Lookup::NotFound(message)) => {
                tracing::info!(title, reason = message.as_deref().unwrap_or(""), "metadata miss");
                return Outcome::NotFound {
                    title: title.to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(title, error = %e, "metadata fetch failed");
                return Outcome::FetchFailed {
                    title: title.to_string(),
                    error: e.to_string(),
                };
            }
        };

        let thumbnail = match self.stager.stage(record.poster_url.as_deref()).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(title = %record.title, error = %e, "poster staging failed");
                let title = record.title;
                return match e {
                    StageError::NoPoster => Outcome::NoPoster { title },
                    e if e.is_download() => Outcome::PosterDownloadFailed {
                        title,
                        error: e.to_string(),
                    },
                    e => Outcome::PosterUploadFailed {
                        title,
                        error: e.to_string(),
                    },
                };
            }
        };

        let title = record.title.clone();
        match self.graph.write(record, thumbnail).await {
            Ok(report) => Outcome::Inserted { title, report },
            Err(e) => {
                tracing::error!(title = %title, error = ?e, "graph write failed");
                Outcome::GraphWriteFailed {
                    title,
                    error: e.to_string(),
                }
            }
        }
    }

    // =========================================================================
    // BATCHES
    // =========================================================================

    /// Run every title; outcomes come back in input order.
    pub async fn process_many(&self, titles: &[String]) -> Vec<Outcome> {
        if self.concurrency <= 1 || titles.len() <= 1 {
            let mut outcomes = Vec::with_capacity(titles.len());
            for title in titles {
                outcomes.push(self.process_one(title).await);
            }
            return outcomes;
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut positions = HashMap::with_capacity(titles.len());
        for (index, title) in titles.iter().enumerate() {
            let context = self.clone();
            let title = title.clone();
            let permits = Arc::clone(&permits);
            let handle = tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                context.process_one(&title).await
            });
            positions.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<Outcome>> = vec![None; titles.len()];
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => {
                    let id = e.id();
                    let title = positions
                        .get(&id)
                        .map(|&index| titles[index].trim().to_string())
                        .unwrap_or_default();
                    tracing::error!(title = %title, error = %e, "pipeline task stopped");
                    let stopped = Outcome::Stopped {
                        title,
                        error: e.to_string(),
                    };
                    (id, stopped)
                }
            };
            if let Some(&index) = positions.get(&id) {
                slots[index] = Some(outcome);
            }
        }

        slots
            .into_iter()
            .zip(titles)
            .map(|(slot, title)| {
                slot.unwrap_or_else(|| Outcome::Stopped {
                    title: title.trim().to_string(),
                    error: "task produced no result".to_string(),
                })
            })
            .collect()
    }

    /// Extract titles from free text, then insert them.
    pub async fn process_prompt(&self, prompt: &str) -> Result<Vec<Outcome>, ExtractionError> {
        let extractor = self.extractor.as_ref().ok_or_else(|| {
            ExtractionError::NotConfigured(format!("{} is not set", crate::config::GROQ_API_KEY))
        })?;
        let titles = extractor.extract(prompt).await?;
        Ok(self.process_many(&titles).await)
    }

    /// Multi-line status for a prompt. Extraction errors become the text.
    pub async fn prompt_status(&self, prompt: &str) -> String {
        match self.process_prompt(prompt).await {
            Ok(outcomes) if outcomes.is_empty() => NO_TITLES.to_string(),
            Ok(outcomes) => render(&outcomes),
            Err(e) => {
                tracing::warn!(error = %e, "title extraction failed");
                format!("Could not extract movie titles: {e}")
            }
        }
    }
}

/// One status line per outcome.
#[must_use]
pub fn render(outcomes: &[Outcome]) -> String {
    outcomes
        .iter()
        .map(Outcome::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn log_outcome(outcome: &Outcome, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    let status = outcome.label();
    match outcome {
        Outcome::Inserted { title, report } => {
            tracing::info!(title = %title, status, elapsed_ms, %report, "title processed");
        }
        Outcome::NotFound { title } => {
            tracing::info!(title = %title, status, elapsed_ms, "title processed");
        }
        other => {
            tracing::warn!(status, elapsed_ms, outcome = %other, "title not inserted");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        let report = UpsertReport::default();
        assert_eq!(
            Outcome::Inserted { title: "Toy Story".into(), report }.to_string(),
            "Inserted: Toy Story"
        );
        assert_eq!(
            Outcome::NotFound { title: "X".into() }.to_string(),
            "Movie not found: X"
        );
        assert_eq!(
            Outcome::FetchFailed { title: "X".into(), error: "dns".into() }.to_string(),
            "Movie not found: X"
        );
        assert_eq!(
            Outcome::PosterDownloadFailed { title: "X".into(), error: "404".into() }.to_string(),
            "Metadata fetched, poster download failed."
        );
        assert_eq!(
            Outcome::PosterUploadFailed { title: "X".into(), error: "403".into() }.to_string(),
            "Metadata fetched, poster upload failed."
        );
        assert!(Outcome::NoPoster { title: "X".into() }.to_string().starts_with("Metadata fetched"));
    }

    #[test]
    fn labels_are_distinct_for_miss_and_failure() {
        assert_ne!(
            Outcome::NotFound { title: "X".into() }.label(),
            Outcome::FetchFailed { title: "X".into(), error: String::new() }.label()
        );
    }

    #[test]
    fn render_joins_lines() {
        let outcomes = vec![
            Outcome::NotFound { title: "A".into() },
            Outcome::TimedOut { title: "B".into(), secs: 3 },
        ];
        assert_eq!(render(&outcomes), "Movie not found: A\nTimed out after 3s: B");
    }
}
