//! # Gremlin Client
//!
//! [`GraphStore`] over a remote Gremlin endpoint. Each call submits one
//! parameterized [`Statement`] and decodes the GraphSON answer.
//!
//! The endpoint scheme picks the transport:
//!
//! - `wss://` or `ws://`: the Gremlin driver protocol over a WebSocket, as
//!   Cosmos DB and Gremlin Server speak it
//! - `https://` or `http://`: Gremlin Server's HTTP endpoint
//!
//! Sessions are blocking. One is opened, used and dropped inside a
//! `spawn_blocking` worker per pipeline invocation.

mod http;
mod websocket;

use crate::config::{Config, GREMLIN_ENDPOINT};
use crate::error::ConfigError;
use neuraflix_core::graphson::{first_bool, first_count, vertex_from_value_map};
use neuraflix_core::{Edge, GraphStore, NeuraflixError, Statement, Vertex, VertexKey, gremlin};
use serde_json::Value;
use std::cell::RefCell;
use std::time::Duration;

const LANGUAGE: &str = "gremlin-groovy";

/// How statements reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    Http,
}

impl Transport {
    pub fn for_endpoint(endpoint: &str) -> Result<Self, ConfigError> {
        let endpoint = endpoint.trim();
        let scheme = endpoint
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("wss" | "ws") => Ok(Self::WebSocket),
            Some("https" | "http") => Ok(Self::Http),
            _ => Err(ConfigError::Invalid {
                key: GREMLIN_ENDPOINT.to_string(),
                reason: format!("{endpoint} is not a ws(s):// or http(s):// URL"),
            }),
        }
    }
}

/// Everything needed to open a session. Cheap to clone into workers.
#[derive(Clone)]
pub struct GremlinSettings {
    pub endpoint: String,
    pub username: String,
    pub key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GremlinSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GremlinSettings")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl GremlinSettings {
    /// Cosmos DB convention: user `/dbs/{db}/colls/{collection}`, password = key.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let need = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| ConfigError::Missing(key.to_string()))
        };
        let endpoint = need(&config.gremlin_endpoint, GREMLIN_ENDPOINT)?;
        let db = need(&config.gremlin_db_name, crate::config::GREMLIN_DB_NAME)?;
        let collection = need(&config.gremlin_collection, crate::config::GREMLIN_COLLECTION)?;
        let key = need(&config.gremlin_pk, crate::config::GREMLIN_PK)?;
        Transport::for_endpoint(&endpoint)?;

        Ok(Self {
            endpoint: endpoint.trim().to_string(),
            username: format!("/dbs/{db}/colls/{collection}"),
            key,
            timeout: config.http_timeout(),
        })
    }

    pub fn transport(&self) -> Result<Transport, ConfigError> {
        Transport::for_endpoint(&self.endpoint)
    }
}

enum Connection {
    Http(http::HttpSession),
    WebSocket(websocket::SocketSession),
}

/// One Gremlin session.
pub struct GremlinGraph {
    // Reads go through `&self`; the socket still needs `&mut` to send.
    connection: RefCell<Connection>,
}

impl GremlinGraph {
    pub fn connect(settings: GremlinSettings) -> Result<Self, NeuraflixError> {
        let transport = settings
            .transport()
            .map_err(|e| NeuraflixError::Storage(e.to_string()))?;
        let connection = match transport {
            Transport::Http => Connection::Http(http::HttpSession::open(settings)?),
            Transport::WebSocket => Connection::WebSocket(websocket::SocketSession::open(settings)?),
        };
        Ok(Self {
            connection: RefCell::new(connection),
        })
    }

    /// Submit one statement; return the result rows as plain JSON.
    pub fn submit(&self, statement: &Statement) -> Result<Vec<Value>, NeuraflixError> {
        match &mut *self.connection.borrow_mut() {
            Connection::Http(session) => session.submit(statement),
            Connection::WebSocket(session) => session.submit(statement),
        }
    }
}

impl GraphStore for GremlinGraph {
    fn upsert_vertex(&mut self, vertex: &Vertex) -> Result<bool, NeuraflixError> {
        let rows = self.submit(&gremlin::upsert_vertex(vertex)?)?;
        first_bool(&rows)?.ok_or_else(|| {
            NeuraflixError::Protocol(format!("upsert of {} returned no row", vertex.key))
        })
    }

    fn add_edge(&mut self, edge: &Edge) -> Result<(), NeuraflixError> {
        let rows = self.submit(&gremlin::add_edge(edge))?;
        if first_count(&rows)? == 0 {
            return Err(NeuraflixError::VertexNotFound(edge.from.clone()));
        }
        Ok(())
    }

    fn add_edge_if_absent(&mut self, edge: &Edge) -> Result<bool, NeuraflixError> {
        let rows = self.submit(&gremlin::add_edge_if_absent(edge))?;
        // No row: one of the endpoints does not exist.
        first_bool(&rows)?.ok_or_else(|| NeuraflixError::VertexNotFound(edge.to.clone()))
    }

    fn count_edges(&self, edge: &Edge) -> Result<u64, NeuraflixError> {
        first_count(&self.submit(&gremlin::count_edges(edge))?)
    }

    fn get_vertex(&self, key: &VertexKey) -> Result<Option<Vertex>, NeuraflixError> {
        let rows = self.submit(&gremlin::vertex_properties(key))?;
        rows.first()
            .map(|row| vertex_from_value_map(key, row))
            .transpose()
    }

    fn vertex_count(&self) -> Result<usize, NeuraflixError> {
        Ok(first_count(&self.submit(&gremlin::vertex_count())?)? as usize)
    }

    fn edge_count(&self) -> Result<usize, NeuraflixError> {
        Ok(first_count(&self.submit(&gremlin::edge_count())?)? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_picks_the_transport() {
        let pick = |endpoint: &str| Transport::for_endpoint(endpoint).expect("transport");
        assert_eq!(pick("wss://acct.gremlin.cosmos.azure.com:443/"), Transport::WebSocket);
        assert_eq!(pick("ws://localhost:8182/gremlin"), Transport::WebSocket);
        assert_eq!(pick(" http://localhost:8182 "), Transport::Http);
        assert_eq!(pick("HTTPS://g:443/"), Transport::Http);
        assert!(matches!(
            Transport::for_endpoint("acct.gremlin.cosmos.azure.com:443"),
            Err(ConfigError::Invalid { ref key, .. }) if key == GREMLIN_ENDPOINT
        ));
    }

    #[test]
    fn settings_follow_cosmos_convention() {
        let config = Config {
            gremlin_endpoint: Some("wss://g:443/".to_string()),
            gremlin_db_name: Some("neuraflix".to_string()),
            gremlin_collection: Some("movies".to_string()),
            gremlin_pk: Some("primary-key".to_string()),
            ..Config::default()
        };
        let settings = GremlinSettings::from_config(&config).expect("settings");
        assert_eq!(settings.username, "/dbs/neuraflix/colls/movies");
        assert_eq!(settings.endpoint, "wss://g:443/");
        assert_eq!(settings.transport().expect("transport"), Transport::WebSocket);
        assert_eq!(settings.timeout, Duration::from_secs(15));
        assert!(!format!("{settings:?}").contains("primary-key"));
    }

    #[test]
    fn settings_report_missing_pieces() {
        let config = Config {
            gremlin_endpoint: Some("http://g".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            GremlinSettings::from_config(&config),
            Err(ConfigError::Missing(ref k)) if k == "GREMLIN_DB_NAME"
        ));
    }
}
