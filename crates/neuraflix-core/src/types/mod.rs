//! # Core Type Definitions
//!
//! This module contains all core types for the NeuraFlix movie graph:
//! - Vertex and edge identity (`VertexKind`, `VertexKey`, `EdgeKind`)
//! - Persisted shapes (`Vertex`, `Edge`)
//! - Normalized metadata records (`MovieRecord`, `PersonRecord`)
//! - Error types (`NeuraflixError`)
//!
//! ## Identity Guarantees
//!
//! - A vertex is identified by the composite `(kind, id)`, never by `id` alone.
//!   The same person appearing as director and actor yields two vertices.
//! - Ids are produced by [`slug`], a pure, length-preserving transform.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// PROPERTY KEYS
// =============================================================================

/// Property holding the slug id on every vertex.
pub const PROP_ID: &str = "id";
/// Movie title as returned by the metadata source.
pub const PROP_TITLE: &str = "title";
/// Movie genre list (comma-joined, as returned by the source).
pub const PROP_GENRE: &str = "genre";
/// Movie release year.
pub const PROP_YEAR: &str = "year";
/// Public URL of the staged poster.
pub const PROP_THUMBNAIL: &str = "thumbnail";
/// Display name of a director or actor.
pub const PROP_NAME: &str = "name";

// =============================================================================
// SLUG
// =============================================================================

/// Derive a stable identifier from a display name.
///
/// Every whitespace character becomes `_`; nothing else changes, so the
/// result has the same number of characters as the input.
///
/// ```
/// use neuraflix_core::slug;
/// assert_eq!(slug("Toy Story"), "Toy_Story");
/// ```
#[must_use]
pub fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

// =============================================================================
// VERTEX IDENTITY
// =============================================================================

/// The three vertex labels of the movie graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexKind {
    Movie,
    Director,
    Actor,
}

impl VertexKind {
    /// The graph label for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Director => "director",
            Self::Actor => "actor",
        }
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Composite vertex key. Ids are only unique within a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexKey {
    pub kind: VertexKind,
    pub id: String,
}

impl VertexKey {
    #[must_use]
    pub fn new(kind: VertexKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key of the movie vertex for a record.
    #[must_use]
    pub fn movie(id: impl Into<String>) -> Self {
        Self::new(VertexKind::Movie, id)
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// =============================================================================
// VERTEX
// =============================================================================

/// A persisted graph vertex: key plus string properties.
///
/// Properties are kept in a `BTreeMap` so that serialization and comparison
/// are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub key: VertexKey,
    pub properties: BTreeMap<String, String>,
}

impl Vertex {
    /// Create a vertex with only its `id` property set.
    #[must_use]
    pub fn new(key: VertexKey) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(PROP_ID.to_string(), key.id.clone());
        Self { key, properties }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Look up a property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Build the movie vertex for a record and its staged poster URL.
    #[must_use]
    pub fn movie(record: &MovieRecord, thumbnail: &str) -> Self {
        Self::new(VertexKey::movie(record.id.clone()))
            .with_property(PROP_TITLE, record.title.clone())
            .with_property(PROP_GENRE, record.genre.clone())
            .with_property(PROP_YEAR, record.year.clone())
            .with_property(PROP_THUMBNAIL, thumbnail)
    }

    /// Build a director or actor vertex.
    #[must_use]
    pub fn person(person: &PersonRecord) -> Self {
        Self::new(VertexKey::new(person.kind.vertex_kind(), person.id.clone()))
            .with_property(PROP_NAME, person.name.clone())
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// The two edge labels of the movie graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// director → movie
    Directed,
    /// movie → actor
    ActedIn,
}

impl EdgeKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Directed => "Directed",
            Self::ActedIn => "ActedIn",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A directed, labelled relation between two vertices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub from: VertexKey,
    pub to: VertexKey,
}

impl Edge {
    /// `Directed` edge from a director to a movie.
    #[must_use]
    pub fn directed(director: VertexKey, movie: VertexKey) -> Self {
        Self {
            kind: EdgeKind::Directed,
            from: director,
            to: movie,
        }
    }

    /// `ActedIn` edge from a movie to an actor.
    #[must_use]
    pub fn acted_in(movie: VertexKey, actor: VertexKey) -> Self {
        Self {
            kind: EdgeKind::ActedIn,
            from: movie,
            to: actor,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

// =============================================================================
// METADATA RECORDS
// =============================================================================

/// Role a person plays in a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Director,
    Actor,
}

impl PersonKind {
    #[must_use]
    pub const fn vertex_kind(self) -> VertexKind {
        match self {
            Self::Director => VertexKind::Director,
            Self::Actor => VertexKind::Actor,
        }
    }
}

/// A director or actor, identified by the slug of their name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    pub name: String,
    pub kind: PersonKind,
}

impl PersonRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PersonKind) -> Self {
        let name = name.into();
        Self {
            id: slug(&name),
            name,
            kind,
        }
    }

    /// The graph key of this person.
    #[must_use]
    pub fn key(&self) -> VertexKey {
        VertexKey::new(self.kind.vertex_kind(), self.id.clone())
    }
}

/// A normalized movie as returned by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    /// `slug(title)`.
    pub id: String,
    pub title: String,
    pub year: String,
    pub genre: String,
    /// Remote poster location; `None` when the source has no poster.
    pub poster_url: Option<String>,
    /// Director names in source order (not de-duplicated).
    pub directors: Vec<String>,
    /// Actor names in source order (not de-duplicated).
    pub actors: Vec<String>,
}

impl MovieRecord {
    /// Create a record; the id is derived from the title.
    #[must_use]
    pub fn new(title: impl Into<String>, year: impl Into<String>, genre: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: slug(&title),
            title,
            year: year.into(),
            genre: genre.into(),
            poster_url: None,
            directors: Vec::new(),
            actors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_poster(mut self, url: impl Into<String>) -> Self {
        self.poster_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_directors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directors = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_actors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actors = names.into_iter().map(Into::into).collect();
        self
    }

    /// Key of this record's movie vertex.
    #[must_use]
    pub fn key(&self) -> VertexKey {
        VertexKey::movie(self.id.clone())
    }

    /// Directors as person records, in order.
    pub fn director_records(&self) -> impl Iterator<Item = PersonRecord> + '_ {
        self.directors
            .iter()
            .map(|name| PersonRecord::new(name.clone(), PersonKind::Director))
    }

    /// Actors as person records, in order.
    pub fn actor_records(&self) -> impl Iterator<Item = PersonRecord> + '_ {
        self.actors
            .iter()
            .map(|name| PersonRecord::new(name.clone(), PersonKind::Actor))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the graph model and its stores.
///
/// - No silent failures
/// - The CORE never panics; every error is recoverable by the caller
#[derive(Debug, Error)]
pub enum NeuraflixError {
    /// A title or name was empty or too long.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An edge endpoint does not exist in the store.
    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexKey),

    /// The underlying store failed (disk, transport, remote error status).
    #[error("Storage error: {0}")]
    Storage(String),

    /// The store answered with something that could not be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_whitespace_only() {
        assert_eq!(slug("Toy Story"), "Toy_Story");
        assert_eq!(slug("Tom\tHanks"), "Tom_Hanks");
        assert_eq!(slug("L'Avventura"), "L'Avventura");
    }

    #[test]
    fn slug_preserves_length() {
        let name = "Jean-Pierre  Jeunet ";
        assert_eq!(slug(name).chars().count(), name.chars().count());
    }

    #[test]
    fn record_id_follows_title() {
        let record = MovieRecord::new("Finding Nemo", "2003", "Animation");
        assert_eq!(record.id, "Finding_Nemo");
        assert_eq!(record.key(), VertexKey::movie("Finding_Nemo"));
    }

    #[test]
    fn person_kinds_partition_keys() {
        let as_director = PersonRecord::new("Clint Eastwood", PersonKind::Director);
        let as_actor = PersonRecord::new("Clint Eastwood", PersonKind::Actor);
        assert_eq!(as_director.id, as_actor.id);
        assert_ne!(as_director.key(), as_actor.key());
    }

    #[test]
    fn movie_vertex_carries_all_properties() {
        let record = MovieRecord::new("Up", "2009", "Animation");
        let vertex = Vertex::movie(&record, "https://blob/up.jpg");
        assert_eq!(vertex.property(PROP_ID), Some("Up"));
        assert_eq!(vertex.property(PROP_TITLE), Some("Up"));
        assert_eq!(vertex.property(PROP_YEAR), Some("2009"));
        assert_eq!(vertex.property(PROP_GENRE), Some("Animation"));
        assert_eq!(vertex.property(PROP_THUMBNAIL), Some("https://blob/up.jpg"));
    }

    #[test]
    fn edge_directions() {
        let movie = VertexKey::movie("Up");
        let director = VertexKey::new(VertexKind::Director, "Pete_Docter");
        let actor = VertexKey::new(VertexKind::Actor, "Ed_Asner");

        let directed = Edge::directed(director.clone(), movie.clone());
        assert_eq!(directed.from, director);
        assert_eq!(directed.to, movie);

        let acted = Edge::acted_in(movie.clone(), actor.clone());
        assert_eq!(acted.from, movie);
        assert_eq!(acted.to, actor);
    }
}
