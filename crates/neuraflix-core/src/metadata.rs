//! # Metadata Normalization
//!
//! Turns the raw metadata-source payload into a [`MovieRecord`].
//!
//! - `Response == "False"` means the title is unknown: [`Lookup::NotFound`]
//! - `Director` / `Actors` are comma-joined; tokens are trimmed, empty and
//!   `N/A` tokens are dropped, order is kept, duplicates are kept
//! - `Poster == "N/A"` means no poster

use crate::primitives::{MAX_TITLE_LENGTH, NOT_AVAILABLE, PEOPLE_SEPARATOR, UNKNOWN};
use crate::{MovieRecord, NeuraflixError};
use serde::Deserialize;

/// Raw payload as returned by the metadata API.
///
/// Only the fields the pipeline uses are declared; everything else in the
/// response is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataPayload {
    pub response: Option<String>,
    pub error: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub poster: Option<String>,
}

/// Result of a successful round-trip to the metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The title resolved to a movie.
    Found(MovieRecord),
    /// The source has no entry for the title. Carries the source's message.
    NotFound(Option<String>),
}

/// Check a user-supplied title before it leaves the process.
pub fn validate_title(title: &str) -> Result<&str, NeuraflixError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(NeuraflixError::InvalidInput("title is empty".to_string()));
    }
    if trimmed.len() > MAX_TITLE_LENGTH {
        return Err(NeuraflixError::InvalidInput(format!(
            "title exceeds {} bytes",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(trimmed)
}

/// Split a comma-joined people field.
///
/// ```
/// use neuraflix_core::metadata::split_people;
/// assert_eq!(split_people("John Lasseter, N/A, "), vec!["John Lasseter"]);
/// ```
#[must_use]
pub fn split_people(field: &str) -> Vec<String> {
    field
        .split(PEOPLE_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty() && *token != NOT_AVAILABLE)
        .map(str::to_string)
        .collect()
}

/// Treat empty strings and `N/A` as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != NOT_AVAILABLE)
}

impl MetadataPayload {
    /// Whether the source flagged this response as a miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.response
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("false"))
    }

    /// Normalize into a [`Lookup`].
    ///
    /// `requested` is the title the caller asked for; it is only used when
    /// the payload itself carries no `Title`.
    #[must_use]
    pub fn normalize(self, requested: &str) -> Lookup {
        if self.is_not_found() {
            return Lookup::NotFound(self.error);
        }

        let title = present(self.title.as_deref())
            .unwrap_or_else(|| requested.trim())
            .to_string();
        let year = present(self.year.as_deref()).unwrap_or(UNKNOWN);
        let genre = present(self.genre.as_deref()).unwrap_or(UNKNOWN);

        let mut record = MovieRecord::new(title, year, genre)
            .with_directors(split_people(self.director.as_deref().unwrap_or_default()))
            .with_actors(split_people(self.actors.as_deref().unwrap_or_default()));

        if let Some(poster) = present(self.poster.as_deref()) {
            record = record.with_poster(poster);
        }

        Lookup::Found(record)
    }
}

/// Parse and normalize a raw JSON body in one step.
pub fn parse_payload(body: &str, requested: &str) -> Result<Lookup, NeuraflixError> {
    let payload: MetadataPayload = serde_json::from_str(body)
        .map_err(|e| NeuraflixError::Deserialization(format!("metadata payload: {e}")))?;
    Ok(payload.normalize(requested))
}

// =============================================================================
// TESTS
// =============================================================================
