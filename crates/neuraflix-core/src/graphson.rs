//! # GraphSON Decoding
//!
//! Gremlin Server answers in GraphSON. Versions 2 and 3 wrap values as
//! `{"@type": "g:Int64", "@value": 3}`; version 1 is plain JSON. This module
//! strips the type wrappers so that callers only deal with plain JSON, then
//! extracts the few result shapes the upsert protocol needs.

use crate::{NeuraflixError, Vertex, VertexKey};
use serde_json::{Map, Value};

/// Gremlin Server status codes that carry a result.
const SUCCESS: u64 = 200;
const NO_CONTENT: u64 = 204;
/// More response frames follow for the same request.
pub const PARTIAL_CONTENT: u64 = 206;
/// The server wants SASL credentials before it runs the request.
pub const AUTHENTICATE: u64 = 407;

/// Status code of a response envelope, if it has one.
#[must_use]
pub fn status_code(body: &Value) -> Option<u64> {
    match body.pointer("/status/code")? {
        Value::Object(typed) => typed.get("@value").and_then(Value::as_u64),
        plain => plain.as_u64(),
    }
}

/// Convert typed GraphSON into plain JSON, recursively.
#[must_use]
pub fn untype(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            let typed = object.get("@type").and_then(Value::as_str).map(str::to_string);
            match (typed, object.remove("@value")) {
                (Some(kind), Some(inner)) => untype_tagged(&kind, inner),
                (_, restored) => {
                    if let Some(inner) = restored {
                        object.insert("@value".to_string(), inner);
                    }
                    Value::Object(object.into_iter().map(|(k, v)| (k, untype(v))).collect())
                }
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(untype).collect()),
        other => other,
    }
}

fn untype_tagged(kind: &str, inner: Value) -> Value {
    match kind {
        "g:Map" => {
            let Value::Array(flat) = inner else {
                return untype(inner);
            };
            let mut object = Map::new();
            let mut pairs = flat.into_iter();
            while let (Some(key), Some(value)) = (pairs.next(), pairs.next()) {
                let key = match untype(key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                object.insert(key, untype(value));
            }
            Value::Object(object)
        }
        "g:BulkSet" => {
            let Value::Array(flat) = inner else {
                return untype(inner);
            };
            let mut out = Vec::new();
            let mut pairs = flat.into_iter();
            while let (Some(value), Some(bulk)) = (pairs.next(), pairs.next()) {
                let value = untype(value);
                let times = untype(bulk).as_u64().unwrap_or(1);
                for _ in 0..times {
                    out.push(value.clone());
                }
            }
            Value::Array(out)
        }
        _ => untype(inner),
    }
}

/// Check the response status and return the result rows as plain JSON.
pub fn result_rows(body: Value) -> Result<Vec<Value>, NeuraflixError> {
    let body = untype(body);
    let code = status_code(&body)
        .ok_or_else(|| NeuraflixError::Protocol("response has no status code".to_string()))?;

    if code == NO_CONTENT {
        return Ok(Vec::new());
    }
    if code != SUCCESS && code != PARTIAL_CONTENT {
        let message = body
            .pointer("/status/message")
            .and_then(Value::as_str)
            .unwrap_or("");
        return Err(NeuraflixError::Storage(format!(
            "gremlin status {code}: {message}"
        )));
    }

    match body.pointer("/result/data") {
        Some(Value::Array(rows)) => Ok(rows.clone()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(single) => Ok(vec![single.clone()]),
    }
}

/// First row as a boolean.
pub fn first_bool(rows: &[Value]) -> Result<Option<bool>, NeuraflixError> {
    match rows.first() {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(NeuraflixError::Protocol(format!(
            "expected boolean row, got {other}"
        ))),
    }
}

/// First row as a count. An empty result counts as zero.
pub fn first_count(rows: &[Value]) -> Result<u64, NeuraflixError> {
    match rows.first() {
        None => Ok(0),
        Some(value) => value.as_u64().ok_or_else(|| {
            NeuraflixError::Protocol(format!("expected count row, got {value}"))
        }),
    }
}

/// Build a vertex from a `valueMap()` row.
///
/// Multi-properties arrive as lists; the first value wins.
pub fn vertex_from_value_map(key: &VertexKey, row: &Value) -> Result<Vertex, NeuraflixError> {
    let Value::Object(map) = row else {
        return Err(NeuraflixError::Protocol(format!(
            "expected value map, got {row}"
        )));
    };
    let mut vertex = Vertex::new(key.clone());
    for (name, value) in map {
        let scalar = match value {
            Value::Array(values) => values.first(),
            other => Some(other),
        };
        let text = match scalar {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => continue,
            Some(other) => other.to_string(),
        };
        vertex.properties.insert(name.clone(), text);
    }
    Ok(vertex)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PROP_TITLE, VertexKind};
    use serde_json::json;

    fn envelope(data: Value) -> Value {
        json!({
            "requestId": "00000000-0000-0000-0000-000000000000",
            "status": {"code": 200, "message": "", "attributes": {}},
            "result": {"data": data, "meta": {}}
        })
    }

    #[test]
    fn graphson3_list_of_longs() {
        let body = envelope(json!({"@type": "g:List", "@value": [{"@type": "g:Int64", "@value": 3}]}));
        let rows = result_rows(body).expect("rows");
        assert_eq!(first_count(&rows).expect("count"), 3);
    }

    #[test]
    fn graphson1_plain_booleans() {
        let rows = result_rows(envelope(json!([true]))).expect("rows");
        assert_eq!(first_bool(&rows).expect("bool"), Some(true));
        let rows = result_rows(envelope(json!([]))).expect("rows");
        assert_eq!(first_bool(&rows).expect("bool"), None);
    }

    #[test]
    fn graphson3_value_map() {
        let row = json!({"@type": "g:Map", "@value": [
            "id", {"@type": "g:List", "@value": ["Toy_Story"]},
            "title", {"@type": "g:List", "@value": ["Toy Story"]},
            "year", {"@type": "g:List", "@value": [{"@type": "g:Int32", "@value": 1995}]}
        ]});
        let rows = result_rows(envelope(json!({"@type": "g:List", "@value": [row]}))).expect("rows");
        let vertex = vertex_from_value_map(&VertexKey::movie("Toy_Story"), &rows[0]).expect("vertex");
        assert_eq!(vertex.property(PROP_TITLE), Some("Toy Story"));
        assert_eq!(vertex.property("year"), Some("1995"));
        assert_eq!(vertex.key.kind, VertexKind::Movie);
    }

    #[test]
    fn bulk_set_expands() {
        let value = untype(json!({"@type": "g:BulkSet", "@value": ["a", {"@type": "g:Int64", "@value": 2}]}));
        assert_eq!(value, json!(["a", "a"]));
    }

    #[test]
    fn error_status_is_storage_error() {
        let body = json!({"status": {"code": 597, "message": "boom"}, "result": {"data": null}});
        let err = result_rows(body).expect_err("error");
        assert!(matches!(err, NeuraflixError::Storage(ref m) if m.contains("597") && m.contains("boom")));
    }

    #[test]
    fn no_content_is_empty() {
        let body = json!({"status": {"code": 204, "message": ""}, "result": {"data": null}});
        assert!(result_rows(body).expect("rows").is_empty());
    }

    #[test]
    fn missing_status_is_protocol_error() {
        assert!(matches!(
            result_rows(json!({"result": {}})),
            Err(NeuraflixError::Protocol(_))
        ));
    }

    #[test]
    fn status_code_reads_plain_and_typed_codes() {
        assert_eq!(status_code(&json!({"status": {"code": 407}})), Some(AUTHENTICATE));
        assert_eq!(
            status_code(&json!({"status": {"code": {"@type": "g:Int32", "@value": 206}}})),
            Some(PARTIAL_CONTENT)
        );
        assert_eq!(status_code(&json!({"result": {}})), None);
    }
}
