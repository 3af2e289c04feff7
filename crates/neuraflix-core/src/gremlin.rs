//! # Gremlin Statements
//!
//! Builds parameterized Gremlin scripts for the upsert protocol.
//!
//! User data (titles, names, URLs, ids) never appears in script text: every
//! value travels in `bindings`. Only labels and property keys, which come
//! from fixed enums and constants, are written into the script, and property
//! keys are validated as plain identifiers before use.

use crate::{Edge, NeuraflixError, PROP_ID, Vertex, VertexKey};
use serde::Serialize;
use std::collections::BTreeMap;

/// A script plus its bound parameters, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub gremlin: String,
    pub bindings: BTreeMap<String, String>,
}

impl Statement {
    fn new(gremlin: String) -> Self {
        Self {
            gremlin,
            bindings: BTreeMap::new(),
        }
    }

    fn bind(mut self, name: &str, value: &str) -> Self {
        self.bindings.insert(name.to_string(), value.to_string());
        self
    }
}

/// Property keys are written into the script, so only identifiers pass.
fn check_property_key(key: &str) -> Result<(), NeuraflixError> {
    let valid = !key.is_empty()
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(NeuraflixError::InvalidInput(format!(
            "property key {key:?} is not an identifier"
        )))
    }
}

/// `g.V().has(label, 'id', <binding>)`
fn lookup(key: &VertexKey, binding: &str) -> String {
    format!("g.V().has('{}', '{}', {})", key.kind.label(), PROP_ID, binding)
}

/// Create-if-absent for one vertex. Yields `[true]` when created.
pub fn upsert_vertex(vertex: &Vertex) -> Result<Statement, NeuraflixError> {
    let mut create = format!("addV('{}')", vertex.key.kind.label());
    let mut bindings = Vec::with_capacity(vertex.properties.len());

    for (i, (key, value)) in vertex.properties.iter().enumerate() {
        check_property_key(key)?;
        if key == PROP_ID {
            create.push_str(&format!(".property('{PROP_ID}', vid)"));
            continue;
        }
        let name = format!("p{i}");
        create.push_str(&format!(".property('{key}', {name})"));
        bindings.push((name, value.as_str()));
    }
    if !vertex.properties.contains_key(PROP_ID) {
        create.push_str(&format!(".property('{PROP_ID}', vid)"));
    }

    let gremlin = format!(
        "{}.fold().coalesce(unfold().constant(false), {}.constant(true))",
        lookup(&vertex.key, "vid"),
        create
    );

    let mut statement = Statement::new(gremlin).bind("vid", &vertex.key.id);
    for (name, value) in bindings {
        statement = statement.bind(&name, value);
    }
    Ok(statement)
}

/// Unconditional edge creation. Yields the number of edges added.
#[must_use]
pub fn add_edge(edge: &Edge) -> Statement {
    let gremlin = format!(
        "{}.addE('{}').to({}).count()",
        lookup(&edge.from, "fromId"),
        edge.kind.label(),
        lookup(&edge.to, "toId")
    );
    Statement::new(gremlin)
        .bind("fromId", &edge.from.id)
        .bind("toId", &edge.to.id)
}

/// Edge creation guarded by an existence check. Yields `[true]` when added,
/// `[false]` when an identical edge exists, `[]` when an endpoint is missing.
#[must_use]
pub fn add_edge_if_absent(edge: &Edge) -> Statement {
    let label = edge.kind.label();
    let gremlin = format!(
        "{}.as('a').V().has('{}', '{}', toId).coalesce(\
         inE('{label}').where(outV().as('a')).constant(false), \
         addE('{label}').from('a').constant(true))",
        lookup(&edge.from, "fromId"),
        edge.to.kind.label(),
        PROP_ID,
    );
    Statement::new(gremlin)
        .bind("fromId", &edge.from.id)
        .bind("toId", &edge.to.id)
}

/// Number of edges with the same label and endpoints.
#[must_use]
pub fn count_edges(edge: &Edge) -> Statement {
    let gremlin = format!(
        "{}.outE('{}').where(inV().has('{}', '{}', toId)).count()",
        lookup(&edge.from, "fromId"),
        edge.kind.label(),
        edge.to.kind.label(),
        PROP_ID,
    );
    Statement::new(gremlin)
        .bind("fromId", &edge.from.id)
        .bind("toId", &edge.to.id)
}

/// Properties of one vertex as a value map.
#[must_use]
pub fn vertex_properties(key: &VertexKey) -> Statement {
    Statement::new(format!("{}.valueMap()", lookup(key, "vid"))).bind("vid", &key.id)
}

#[must_use]
pub fn vertex_count() -> Statement {
    Statement::new("g.V().count()".to_string())
}

#[must_use]
pub fn edge_count() -> Statement {
    Statement::new("g.E().count()".to_string())
}

// =============================================================================
// TESTS
// =============================================================================
