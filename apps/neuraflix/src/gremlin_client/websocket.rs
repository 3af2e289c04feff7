//! Gremlin driver protocol over a WebSocket.
//!
//! Each request is a binary frame: one length byte, the GraphSON mime type,
//! then the JSON request message. Answers are JSON text (or binary) frames
//! that echo the `requestId`; `206` frames carry partial results and the
//! request ends on any other status. A `407` asks for SASL PLAIN
//! credentials, sent as an `authentication` op under the same id.

use super::{GremlinSettings, LANGUAGE};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use neuraflix_core::graphson::{AUTHENTICATE, PARTIAL_CONTENT, result_rows, status_code};
use neuraflix_core::{NeuraflixError, Statement};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::{TcpStream, ToSocketAddrs};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use uuid::Uuid;

const MIME_TYPE: &str = "application/vnd.gremlin-v2.0+json";

#[derive(Serialize)]
struct RequestMessage<'a, A> {
    #[serde(rename = "requestId")]
    request_id: &'a str,
    op: &'a str,
    processor: &'a str,
    args: A,
}

#[derive(Serialize)]
struct EvalArgs<'a> {
    gremlin: &'a str,
    bindings: &'a BTreeMap<String, String>,
    language: &'a str,
}

#[derive(Serialize)]
struct SaslArgs {
    #[serde(rename = "SASL")]
    sasl: String,
    #[serde(rename = "saslMechanism")]
    mechanism: &'static str,
}

/// Request frame payload: mime length, mime type, JSON body.
fn frame<A: Serialize>(message: &RequestMessage<'_, A>) -> Result<Vec<u8>, NeuraflixError> {
    let body = serde_json::to_vec(message)
        .map_err(|e| NeuraflixError::Serialization(format!("gremlin request: {e}")))?;
    let mut payload = Vec::with_capacity(1 + MIME_TYPE.len() + body.len());
    payload.push(MIME_TYPE.len() as u8);
    payload.extend_from_slice(MIME_TYPE.as_bytes());
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// SASL PLAIN: `\0username\0password`, base64.
fn sasl_plain(username: &str, password: &str) -> String {
    BASE64_STANDARD.encode(format!("\0{username}\0{password}"))
}

fn transport_error(context: &str, error: impl std::fmt::Display) -> NeuraflixError {
    NeuraflixError::Storage(format!("gremlin {context}: {error}"))
}

pub(super) struct SocketSession {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    settings: GremlinSettings,
}

impl SocketSession {
    pub(super) fn open(settings: GremlinSettings) -> Result<Self, NeuraflixError> {
        let url = reqwest::Url::parse(&settings.endpoint)
            .map_err(|e| transport_error("endpoint", e))?;
        let host = url
            .host_str()
            .ok_or_else(|| transport_error("endpoint", "no host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| transport_error("endpoint", "no port"))?;
        let address = (host, port)
            .to_socket_addrs()
            .map_err(|e| transport_error("resolve", e))?
            .next()
            .ok_or_else(|| transport_error("resolve", format!("{host} has no address")))?;

        let stream = TcpStream::connect_timeout(&address, settings.timeout)
            .map_err(|e| transport_error("connect", e))?;
        stream
            .set_read_timeout(Some(settings.timeout))
            .and_then(|()| stream.set_write_timeout(Some(settings.timeout)))
            .map_err(|e| transport_error("connect", e))?;

        let (socket, _) =
            tungstenite::client_tls_with_config(settings.endpoint.as_str(), stream, None, None)
                .map_err(|e| transport_error("handshake", e))?;
        tracing::debug!(endpoint = %settings.endpoint, "gremlin socket open");
        Ok(Self { socket, settings })
    }

    pub(super) fn submit(&mut self, statement: &Statement) -> Result<Vec<Value>, NeuraflixError> {
        let request_id = Uuid::new_v4().to_string();
        self.send(&RequestMessage {
            request_id: &request_id,
            op: "eval",
            processor: "",
            args: EvalArgs {
                gremlin: &statement.gremlin,
                bindings: &statement.bindings,
                language: LANGUAGE,
            },
        })?;

        let mut rows = Vec::new();
        let mut authenticated = false;
        loop {
            let response = self.receive(&request_id)?;
            match status_code(&response) {
                Some(AUTHENTICATE) if authenticated => {
                    return Err(NeuraflixError::Storage(
                        "gremlin server asked for credentials twice".to_string(),
                    ));
                }
                Some(AUTHENTICATE) => {
                    self.authenticate(&request_id)?;
                    authenticated = true;
                }
                Some(PARTIAL_CONTENT) => rows.extend(result_rows(response)?),
                _ => {
                    rows.extend(result_rows(response)?);
                    return Ok(rows);
                }
            }
        }
    }

    fn authenticate(&mut self, request_id: &str) -> Result<(), NeuraflixError> {
        let sasl = sasl_plain(&self.settings.username, &self.settings.key);
        self.send(&RequestMessage {
            request_id,
            op: "authentication",
            processor: "",
            args: SaslArgs {
                sasl,
                mechanism: "PLAIN",
            },
        })
    }

    fn send<A: Serialize>(&mut self, message: &RequestMessage<'_, A>) -> Result<(), NeuraflixError> {
        let payload = frame(message)?;
        self.socket
            .send(Message::binary(payload))
            .map_err(|e| transport_error("send", e))
    }

    /// Next response frame for `request_id`. Frames for other ids are skipped.
    fn receive(&mut self, request_id: &str) -> Result<Value, NeuraflixError> {
        loop {
            let message = self.socket.read().map_err(|e| transport_error("read", e))?;
            let response: Value = match message {
                Message::Text(text) => serde_json::from_str(text.as_str()),
                Message::Binary(bytes) => serde_json::from_slice(&bytes),
                Message::Close(_) => {
                    return Err(NeuraflixError::Storage(
                        "gremlin server closed the connection".to_string(),
                    ));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
            .map_err(|e| NeuraflixError::Deserialization(format!("gremlin response: {e}")))?;

            if response.get("requestId").and_then(Value::as_str) == Some(request_id) {
                return Ok(response);
            }
            tracing::debug!(expected = request_id, "skipping frame for another request");
        }
    }
}

impl Drop for SocketSession {
    fn drop(&mut self) {
        // Best effort; the server drops the session either way.
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}
