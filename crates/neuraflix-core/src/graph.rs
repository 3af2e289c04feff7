//! # Graph Store
//!
//! The `GraphStore` trait is the seam between the upsert protocol and the
//! backends that persist vertices and edges. `Graph` is the in-memory
//! implementation used by tests and by the `memory` backend.
//!
//! ## Contract
//!
//! - `upsert_vertex` is create-if-absent: an existing vertex with the same
//!   `(kind, id)` is never modified
//! - `add_edge` always appends; stores count parallel edges
//! - `add_edge_if_absent` appends only when no edge with the same
//!   `(kind, from, to)` exists

use crate::{Edge, NeuraflixError, Vertex, VertexKey};
use std::collections::BTreeMap;

// =============================================================================
// GRAPH STORE TRAIT
// =============================================================================

/// Persistence interface for the movie graph.
///
/// Calls may block (disk or network). Async callers dispatch them to a
/// blocking worker pool.
pub trait GraphStore {
    /// Create `vertex` unless its key already exists.
    ///
    /// Returns `true` when a vertex was created, `false` when one existed.
    fn upsert_vertex(&mut self, vertex: &Vertex) -> Result<bool, NeuraflixError>;

    /// Append an edge. Both endpoints must exist.
    fn add_edge(&mut self, edge: &Edge) -> Result<(), NeuraflixError>;

    /// Number of stored edges with the same kind and endpoints.
    fn count_edges(&self, edge: &Edge) -> Result<u64, NeuraflixError>;

    /// Fetch a vertex by key.
    fn get_vertex(&self, key: &VertexKey) -> Result<Option<Vertex>, NeuraflixError>;

    /// Total number of vertices.
    fn vertex_count(&self) -> Result<usize, NeuraflixError>;

    /// Total number of edges, parallel edges included.
    fn edge_count(&self) -> Result<usize, NeuraflixError>;

    /// Append an edge only if no identical edge exists.
    ///
    /// Returns `true` when the edge was added.
    fn add_edge_if_absent(&mut self, edge: &Edge) -> Result<bool, NeuraflixError> {
        if self.count_edges(edge)? > 0 {
            return Ok(false);
        }
        self.add_edge(edge)?;
        Ok(true)
    }
}

// =============================================================================
// IN-MEMORY GRAPH
// =============================================================================

/// In-memory graph keyed by composite vertex key.
///
/// Edges are stored with their multiplicity so that the "duplicate" edge
/// policy can be observed in tests.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: BTreeMap<VertexKey, Vertex>,
    edges: BTreeMap<Edge, u64>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Edges leaving `key`, in deterministic order.
    #[must_use]
    pub fn outgoing(&self, key: &VertexKey) -> Vec<&Edge> {
        self.edges
            .keys()
            .filter(|edge| &edge.from == key)
            .collect()
    }

    fn require(&self, key: &VertexKey) -> Result<(), NeuraflixError> {
        if self.vertices.contains_key(key) {
            Ok(())
        } else {
            Err(NeuraflixError::VertexNotFound(key.clone()))
        }
    }
}

impl GraphStore for Graph {
    fn upsert_vertex(&mut self, vertex: &Vertex) -> Result<bool, NeuraflixError> {
        if self.vertices.contains_key(&vertex.key) {
            return Ok(false);
        }
        self.vertices.insert(vertex.key.clone(), vertex.clone());
        Ok(true)
    }

    fn add_edge(&mut self, edge: &Edge) -> Result<(), NeuraflixError> {
        self.require(&edge.from)?;
        self.require(&edge.to)?;
        let count = self.edges.entry(edge.clone()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(())
    }

    fn count_edges(&self, edge: &Edge) -> Result<u64, NeuraflixError> {
        Ok(self.edges.get(edge).copied().unwrap_or(0))
    }

    fn get_vertex(&self, key: &VertexKey) -> Result<Option<Vertex>, NeuraflixError> {
        Ok(self.vertices.get(key).cloned())
    }

    fn vertex_count(&self) -> Result<usize, NeuraflixError> {
        Ok(self.vertices.len())
    }

    fn edge_count(&self) -> Result<usize, NeuraflixError> {
        Ok(self.edges.values().map(|c| *c as usize).sum())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PROP_NAME, VertexKind};

    fn director(id: &str) -> Vertex {
        Vertex::new(VertexKey::new(VertexKind::Director, id)).with_property(PROP_NAME, id)
    }

    #[test]
    fn upsert_is_create_if_absent() {
        let mut graph = Graph::new();
        assert!(graph.upsert_vertex(&director("a")).expect("first"));
        let renamed = director("a").with_property(PROP_NAME, "changed");
        assert!(!graph.upsert_vertex(&renamed).expect("second"));

        let stored = graph
            .get_vertex(&VertexKey::new(VertexKind::Director, "a"))
            .expect("get")
            .expect("present");
        assert_eq!(stored.property(PROP_NAME), Some("a"));
        assert_eq!(graph.vertex_count().expect("count"), 1);
    }

    #[test]
    fn add_edge_requires_endpoints() {
        let mut graph = Graph::new();
        graph.upsert_vertex(&director("a")).expect("insert");
        let edge = Edge::directed(
            VertexKey::new(VertexKind::Director, "a"),
            VertexKey::movie("missing"),
        );
        assert!(matches!(
            graph.add_edge(&edge),
            Err(NeuraflixError::VertexNotFound(_))
        ));
        assert_eq!(graph.edge_count().expect("count"), 0);
    }

    #[test]
    fn parallel_edges_are_counted() {
        let mut graph = Graph::new();
        graph.upsert_vertex(&director("a")).expect("insert");
        graph
            .upsert_vertex(&Vertex::new(VertexKey::movie("m")))
            .expect("insert");
        let edge = Edge::directed(
            VertexKey::new(VertexKind::Director, "a"),
            VertexKey::movie("m"),
        );

        graph.add_edge(&edge).expect("first");
        graph.add_edge(&edge).expect("second");
        assert_eq!(graph.count_edges(&edge).expect("count"), 2);
        assert_eq!(graph.edge_count().expect("count"), 2);

        assert!(!graph.add_edge_if_absent(&edge).expect("guarded"));
        assert_eq!(graph.edge_count().expect("count"), 2);
    }

    #[test]
    fn outgoing_is_deterministic() {
        let mut graph = Graph::new();
        let movie = VertexKey::movie("m");
        graph.upsert_vertex(&Vertex::new(movie.clone())).expect("insert");
        for name in ["z", "a", "m"] {
            let key = VertexKey::new(VertexKind::Actor, name);
            graph.upsert_vertex(&Vertex::new(key.clone())).expect("insert");
            graph.add_edge(&Edge::acted_in(movie.clone(), key)).expect("edge");
        }
        let targets: Vec<_> = graph.outgoing(&movie).iter().map(|e| e.to.id.as_str()).collect();
        assert_eq!(targets, vec!["a", "m", "z"]);
    }
}
