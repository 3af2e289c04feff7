//! # neuraflix-core
//!
//! The movie knowledge-graph model for NeuraFlix - THE LOGIC.
//!
//! This crate owns everything that can be decided without touching the
//! network: the vertex/edge model, metadata normalization, title-list
//! parsing, the `GraphStore` seam with its in-memory and redb
//! implementations, parameterized Gremlin statements, and the upsert
//! protocol that ties them together.
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Vertices are keyed by `(kind, id)`; creation is create-if-absent
//! - User data never reaches a query string; it travels as bindings

// =============================================================================
// MODULES
// =============================================================================

pub mod graph;
pub mod graphson;
pub mod gremlin;
pub mod metadata;
pub mod primitives;
pub mod storage;
pub mod titles;
pub mod types;
pub mod upsert;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Edge, EdgeKind, MovieRecord, NeuraflixError, PROP_GENRE, PROP_ID, PROP_NAME, PROP_THUMBNAIL,
    PROP_TITLE, PROP_YEAR, PersonKind, PersonRecord, Vertex, VertexKey, VertexKind, slug,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use graph::{Graph, GraphStore};
pub use gremlin::Statement;
pub use metadata::{Lookup, MetadataPayload};
pub use storage::RedbGraph;
pub use titles::parse_titles;
pub use upsert::{EdgePolicy, UpsertFailure, UpsertReport, Upserter};
