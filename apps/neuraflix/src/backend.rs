//! # Graph Backends
//!
//! Chooses where the upsert protocol writes and runs it off the async
//! runtime.
//!
//! Every invocation opens its own session on the blocking pool
//! (`spawn_blocking`), runs, and drops the session before the worker returns,
//! whether the work succeeded or not. The embedded stores are shared behind a
//! mutex and the "session" is the lock guard.

use crate::config::{Config, GraphBackendKind};
use crate::error::{AppError, GraphWriteError};
use crate::gremlin_client::{GremlinGraph, GremlinSettings};
use async_trait::async_trait;
use neuraflix_core::{Graph, GraphStore, MovieRecord, RedbGraph, UpsertReport, Upserter};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A configured graph store.
#[derive(Clone)]
pub enum GraphBackend {
    Gremlin(GremlinSettings),
    Redb(Arc<Mutex<RedbGraph>>),
    Memory(Arc<Mutex<Graph>>),
}

impl std::fmt::Debug for GraphBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gremlin(settings) => f.debug_tuple("Gremlin").field(settings).finish(),
            Self::Redb(_) => f.write_str("Redb"),
            Self::Memory(_) => f.write_str("Memory"),
        }
    }
}

/// Vertex and edge totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
}

impl GraphBackend {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(match config.graph_backend {
            GraphBackendKind::Gremlin => Self::Gremlin(GremlinSettings::from_config(config)?),
            GraphBackendKind::Redb => {
                Self::Redb(Arc::new(Mutex::new(RedbGraph::open(&config.graph_path)?)))
            }
            GraphBackendKind::Memory => Self::memory(),
        })
    }

    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(Arc::new(Mutex::new(Graph::new())))
    }

    /// Run `op` against a fresh session on the blocking pool.
    ///
    /// The timeout bounds the wait; a worker that overruns is detached and
    /// finishes (or fails) on its own, limited by the HTTP client timeout.
    pub async fn run<T, F>(&self, timeout: Duration, op: F) -> Result<T, GraphWriteError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn GraphStore) -> Result<T, GraphWriteError> + Send + 'static,
    {
        let backend = self.clone();
        let task = tokio::task::spawn_blocking(move || backend.with_session(op));
        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(GraphWriteError::Timeout(timeout.as_secs())),
            Ok(Err(join)) => Err(GraphWriteError::Worker(join.to_string())),
            Ok(Ok(result)) => result,
        }
    }

    fn with_session<T>(
        &self,
        op: impl FnOnce(&mut dyn GraphStore) -> Result<T, GraphWriteError>,
    ) -> Result<T, GraphWriteError> {
        match self {
            Self::Gremlin(settings) => {
                let mut session = GremlinGraph::connect(settings.clone())?;
                let result = op(&mut session);
                drop(session);
                tracing::debug!("gremlin session closed");
                result
            }
            Self::Redb(db) => {
                let mut guard = db
                    .lock()
                    .map_err(|_| GraphWriteError::Worker("redb lock poisoned".to_string()))?;
                op(&mut *guard)
            }
            Self::Memory(graph) => {
                let mut guard = graph
                    .lock()
                    .map_err(|_| GraphWriteError::Worker("graph lock poisoned".to_string()))?;
                op(&mut *guard)
            }
        }
    }

    pub async fn stats(&self, timeout: Duration) -> Result<GraphStats, GraphWriteError> {
        self.run(timeout, |store| {
            Ok(GraphStats {
                vertices: store.vertex_count()?,
                edges: store.edge_count()?,
            })
        })
        .await
    }
}

// =============================================================================
// GRAPH WRITER
// =============================================================================

/// The graph step of the pipeline.
#[async_trait]
pub trait GraphWriter: Send + Sync {
    async fn write(&self, record: MovieRecord, thumbnail: String) -> Result<UpsertReport, GraphWriteError>;
}

/// [`GraphWriter`] that runs the upsert protocol against a [`GraphBackend`].
#[derive(Debug, Clone)]
pub struct UpsertWriter {
    backend: GraphBackend,
    upserter: Upserter,
    timeout: Duration,
}

impl UpsertWriter {
    pub fn new(backend: GraphBackend, upserter: Upserter, timeout: Duration) -> Self {
        Self {
            backend,
            upserter,
            timeout,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &GraphBackend {
        &self.backend
    }
}

#[async_trait]
impl GraphWriter for UpsertWriter {
    async fn write(&self, record: MovieRecord, thumbnail: String) -> Result<UpsertReport, GraphWriteError> {
        let upserter = self.upserter;
        let started = Instant::now();
        let movie_id = record.id.clone();
        let report = self
            .backend
            .run(self.timeout, move |store| {
                Ok(upserter.upsert(store, &record, &thumbnail)?)
            })
            .await?;
        tracing::info!(
            %movie_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            %report,
            "graph upsert done"
        );
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
