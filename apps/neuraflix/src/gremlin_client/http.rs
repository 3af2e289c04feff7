//! Gremlin Server HTTP endpoint: `POST {endpoint}` with
//! `{"gremlin", "bindings", "language"}` and Basic auth.

use super::{GremlinSettings, LANGUAGE};
use neuraflix_core::graphson::result_rows;
use neuraflix_core::{NeuraflixError, Statement};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct Request<'a> {
    gremlin: &'a str,
    bindings: &'a BTreeMap<String, String>,
    language: &'a str,
}

pub(super) struct HttpSession {
    http: reqwest::blocking::Client,
    settings: GremlinSettings,
}

impl HttpSession {
    pub(super) fn open(settings: GremlinSettings) -> Result<Self, NeuraflixError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NeuraflixError::Storage(format!("gremlin client: {e}")))?;
        Ok(Self { http, settings })
    }

    pub(super) fn submit(&mut self, statement: &Statement) -> Result<Vec<Value>, NeuraflixError> {
        let request = Request {
            gremlin: &statement.gremlin,
            bindings: &statement.bindings,
            language: LANGUAGE,
        };
        let response = self
            .http
            .post(&self.settings.endpoint)
            .basic_auth(&self.settings.username, Some(&self.settings.key))
            .json(&request)
            .send()
            .map_err(|e| NeuraflixError::Storage(format!("gremlin request: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| NeuraflixError::Storage(format!("gremlin response: {e}")))?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.pointer("/status/message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(NeuraflixError::Storage(format!(
                "gremlin HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| NeuraflixError::Deserialization(format!("gremlin response: {e}")))?;
        result_rows(value)
    }
}
