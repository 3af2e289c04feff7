//! # Upsert Protocol
//!
//! Writes one `MovieRecord` into any `GraphStore`, in a fixed order:
//!
//! 1. movie vertex (create-if-absent, thumbnail = staged poster URL)
//! 2. for each director: director vertex, then `Directed` director → movie
//! 3. for each actor: actor vertex, then `ActedIn` movie → actor
//!
//! Writes are not wrapped in a transaction. When a step fails, everything
//! written before it stays, and the failure reports the step and the partial
//! progress.

use crate::graph::GraphStore;
use crate::{Edge, MovieRecord, NeuraflixError, Vertex, VertexKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// EDGE POLICY
// =============================================================================

/// How edges are created when the same record is upserted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Skip an edge when one with the same kind and endpoints exists.
    #[default]
    Unique,
    /// Always append; reprocessing a title yields parallel edges.
    Duplicate,
}

impl FromStr for EdgePolicy {
    type Err = NeuraflixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unique" => Ok(Self::Unique),
            "duplicate" => Ok(Self::Duplicate),
            other => Err(NeuraflixError::InvalidInput(format!(
                "unknown edge policy {other:?} (expected unique or duplicate)"
            ))),
        }
    }
}

impl fmt::Display for EdgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique => f.write_str("unique"),
            Self::Duplicate => f.write_str("duplicate"),
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// What an upsert changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertReport {
    pub movie_created: bool,
    pub directors_created: usize,
    pub actors_created: usize,
    pub edges_added: usize,
    pub edges_skipped: usize,
}

impl fmt::Display for UpsertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "movie {}, {} director(s) and {} actor(s) created, {} edge(s) added, {} skipped",
            if self.movie_created { "created" } else { "existed" },
            self.directors_created,
            self.actors_created,
            self.edges_added,
            self.edges_skipped
        )
    }
}

/// An upsert that stopped partway.
#[derive(Debug, Error)]
#[error("upsert of {movie} failed at {step}: {source}")]
pub struct UpsertFailure {
    /// Movie vertex key.
    pub movie: VertexKey,
    /// Human-readable description of the failing step.
    pub step: String,
    /// Changes committed before the failure.
    pub partial: UpsertReport,
    #[source]
    pub source: NeuraflixError,
}

// =============================================================================
// UPSERTER
// =============================================================================

/// Runs the upsert protocol against a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upserter {
    policy: EdgePolicy,
}

impl Upserter {
    #[must_use]
    pub const fn new(policy: EdgePolicy) -> Self {
        Self { policy }
    }

    /// Upsert `record` with `thumbnail` as the movie's poster URL.
    pub fn upsert<G: GraphStore + ?Sized>(
        &self,
        graph: &mut G,
        record: &MovieRecord,
        thumbnail: &str,
    ) -> Result<UpsertReport, UpsertFailure> {
        let movie = record.key();
        let mut report = UpsertReport::default();

        let fail = |step: String, partial: UpsertReport, source: NeuraflixError| UpsertFailure {
            movie: movie.clone(),
            step,
            partial,
            source,
        };

        report.movie_created = graph
            .upsert_vertex(&Vertex::movie(record, thumbnail))
            .map_err(|e| fail("movie vertex".to_string(), report, e))?;

        for director in record.director_records() {
            if graph
                .upsert_vertex(&Vertex::person(&director))
                .map_err(|e| fail(format!("director vertex {}", director.key()), report, e))?
            {
                report.directors_created += 1;
            }
            let edge = Edge::directed(director.key(), movie.clone());
            self.link(graph, &edge, &mut report)
                .map_err(|e| fail(format!("edge {edge}"), report, e))?;
        }

        for actor in record.actor_records() {
            if graph
                .upsert_vertex(&Vertex::person(&actor))
                .map_err(|e| fail(format!("actor vertex {}", actor.key()), report, e))?
            {
                report.actors_created += 1;
            }
            let edge = Edge::acted_in(movie.clone(), actor.key());
            self.link(graph, &edge, &mut report)
                .map_err(|e| fail(format!("edge {edge}"), report, e))?;
        }

        Ok(report)
    }

    fn link<G: GraphStore + ?Sized>(
        &self,
        graph: &mut G,
        edge: &Edge,
        report: &mut UpsertReport,
    ) -> Result<(), NeuraflixError> {
        match self.policy {
            EdgePolicy::Duplicate => {
                graph.add_edge(edge)?;
                report.edges_added += 1;
            }
            EdgePolicy::Unique => {
                if graph.add_edge_if_absent(edge)? {
                    report.edges_added += 1;
                } else {
                    report.edges_skipped += 1;
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
