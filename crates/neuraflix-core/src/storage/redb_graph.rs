//! # redb-backed Graph Storage
//!
//! A disk-backed `GraphStore` using the redb embedded database.
//!
//! - Vertices are keyed by the composite `(label, id)`, so a director and an
//!   actor sharing a name never collide
//! - Edges are stored once per `(label, from, to)` with a multiplicity count
//! - Every mutation commits its own transaction: a failure halfway through
//!   an upsert leaves earlier writes in place

use crate::graph::GraphStore;
use crate::{Edge, NeuraflixError, Vertex, VertexKey};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

/// Table for vertices: (label, id) -> postcard-encoded properties
const VERTICES: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("vertices");

/// Table for edges: (edge label, from key, to key) -> multiplicity
const EDGES: TableDefinition<(&str, &str, &str), u64> = TableDefinition::new("edges");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Metadata key of the running edge total (parallel edges included).
const EDGE_TOTAL: &str = "edge_total";

fn storage_err(e: impl Display) -> NeuraflixError {
    NeuraflixError::Storage(e.to_string())
}

/// A disk-backed movie graph.
pub struct RedbGraph {
    db: Database,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph").finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NeuraflixError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(VERTICES).map_err(storage_err)?;
            let _ = write_txn.open_table(EDGES).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }

    fn encode(vertex: &Vertex) -> Result<Vec<u8>, NeuraflixError> {
        postcard::to_allocvec(&vertex.properties)
            .map_err(|e| NeuraflixError::Serialization(e.to_string()))
    }

    fn decode(key: &VertexKey, bytes: &[u8]) -> Result<Vertex, NeuraflixError> {
        let properties: BTreeMap<String, String> = postcard::from_bytes(bytes)
            .map_err(|e| NeuraflixError::Deserialization(e.to_string()))?;
        Ok(Vertex {
            key: key.clone(),
            properties,
        })
    }
}

impl GraphStore for RedbGraph {
    fn upsert_vertex(&mut self, vertex: &Vertex) -> Result<bool, NeuraflixError> {
        let bytes = Self::encode(vertex)?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let created = {
            let mut table = write_txn.open_table(VERTICES).map_err(storage_err)?;
            let key = (vertex.key.kind.label(), vertex.key.id.as_str());
            let exists = table.get(key).map_err(storage_err)?.is_some();
            if !exists {
                table.insert(key, bytes.as_slice()).map_err(storage_err)?;
            }
            !exists
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(created)
    }

    fn add_edge(&mut self, edge: &Edge) -> Result<(), NeuraflixError> {
        let from = edge.from.to_string();
        let to = edge.to.to_string();
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let vertices = write_txn.open_table(VERTICES).map_err(storage_err)?;
            for endpoint in [&edge.from, &edge.to] {
                let key = (endpoint.kind.label(), endpoint.id.as_str());
                if vertices.get(key).map_err(storage_err)?.is_none() {
                    return Err(NeuraflixError::VertexNotFound(endpoint.clone()));
                }
            }

            let mut edges = write_txn.open_table(EDGES).map_err(storage_err)?;
            let key = (edge.kind.label(), from.as_str(), to.as_str());
            let current = edges
                .get(key)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            edges
                .insert(key, current.saturating_add(1))
                .map_err(storage_err)?;

            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let total = meta
                .get(EDGE_TOTAL)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta.insert(EDGE_TOTAL, total.saturating_add(1))
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn count_edges(&self, edge: &Edge) -> Result<u64, NeuraflixError> {
        let from = edge.from.to_string();
        let to = edge.to.to_string();
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(EDGES).map_err(storage_err)?;
        Ok(table
            .get((edge.kind.label(), from.as_str(), to.as_str()))
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0))
    }

    fn get_vertex(&self, key: &VertexKey) -> Result<Option<Vertex>, NeuraflixError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(VERTICES).map_err(storage_err)?;
        let stored = table
            .get((key.kind.label(), key.id.as_str()))
            .map_err(storage_err)?;
        match stored {
            Some(bytes) => Ok(Some(Self::decode(key, bytes.value())?)),
            None => Ok(None),
        }
    }

    fn vertex_count(&self) -> Result<usize, NeuraflixError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(VERTICES).map_err(storage_err)?;
        Ok(table.len().map_err(storage_err)? as usize)
    }

    fn edge_count(&self) -> Result<usize, NeuraflixError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(METADATA).map_err(storage_err)?;
        Ok(table
            .get(EDGE_TOTAL)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0) as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
