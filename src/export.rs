//! Cypher DUMP export — serialize a loaded graph as Cypher statements.
//!
//! The binary migrates into the in-memory store and then writes this script,
//! which applies the same run to Neo4j:
//!
//! ```text
//! MemoryBackend → export_cypher_dump() → CREATE INDEX / CREATE|MERGE / MATCH…CREATE|MERGE
//!   → cypher-shell < graph.cypher
//! ```
//!
//! The script carries the run's write semantics, not just its result:
//!
//! | | [`DumpMode::Replace`] (species run) | [`DumpMode::Merge`] (pair run) |
//! |---|---|---|
//! | existing graph | `MATCH (n) DETACH DELETE n` | kept |
//! | nodes | `CREATE` | `MERGE` on the label's key |
//! | `IN` | `CREATE` | `MERGE` |
//! | `ACTION` | `CREATE` | `MERGE` on mode, score = max(stored, new) |
//! | `ASSOCIATION` | `CREATE` | `CREATE` |
//!
//! Nodes carry a temporary `_id` so relationships can find their endpoints;
//! the last statement removes it. Null properties are left out, matching
//! how Neo4j stores a `SET p = null`.

use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::migrate::RunMode;
use crate::model::*;
use crate::records::{label, rel};
use crate::storage::GraphStore;
use crate::Result;

/// How the dump applies itself to the target graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DumpMode {
    /// Wipe the target, then create everything.
    Replace,
    /// Merge into whatever the target holds.
    Merge,
}

impl From<&RunMode> for DumpMode {
    fn from(mode: &RunMode) -> Self {
        match mode {
            RunMode::Species => DumpMode::Replace,
            RunMode::Pairs(_) => DumpMode::Merge,
        }
    }
}

/// Counts of what a dump contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub indexes: u64,
    pub nodes: u64,
    pub relationships: u64,
}

/// Export a graph as a Cypher DUMP script.
///
/// Output order is stable: indexes, nodes by id, then each node's outgoing
/// relationships by id. Properties are written in key order.
pub async fn export_cypher_dump<S>(store: &S, writer: &mut dyn Write, mode: DumpMode) -> Result<ExportSummary>
where
    S: GraphStore + ?Sized,
{
    let mut summary = ExportSummary::default();

    writeln!(writer, "// protein-graph Cypher DUMP")?;
    writeln!(writer, "// Mode: {mode:?}")?;
    writeln!(writer, "// Nodes: {}", store.node_count().await?)?;
    writeln!(writer, "// Relationships: {}", store.relationship_count().await?)?;
    writeln!(writer)?;

    if mode == DumpMode::Replace {
        writeln!(writer, "MATCH (n) DETACH DELETE n;")?;
        writeln!(writer)?;
    }

    for index in store.indexes().await? {
        writeln!(writer, "CREATE INDEX ON {index};")?;
        summary.indexes += 1;
    }
    if summary.indexes > 0 {
        writeln!(writer)?;
    }

    let mut nodes = store.all_nodes().await?;
    nodes.sort_by_key(|n| n.id);
    for node in &nodes {
        writeln!(writer, "{}", node_statement(node, mode))?;
        summary.nodes += 1;
    }

    writeln!(writer)?;
    writeln!(writer, "// Relationships")?;

    for node in &nodes {
        let mut rels = store.get_relationships(node.id, Direction::Outgoing, None).await?;
        rels.sort_by_key(|r| r.id);

        for relationship in rels {
            writeln!(
                writer,
                "MATCH (a {{_id: {}}}), (b {{_id: {}}}) {};",
                relationship.src.0,
                relationship.dst.0,
                relationship_clause(&relationship, mode),
            )?;
            summary.relationships += 1;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "MATCH (n) REMOVE n._id;")?;
    writer.flush()?;

    info!(?mode, nodes = summary.nodes, relationships = summary.relationships, "graph exported");
    Ok(summary)
}

fn node_statement(node: &Node, mode: DumpMode) -> String {
    let labels_str = if node.labels.is_empty() {
        String::new()
    } else {
        format!(":{}", node.labels.join(":"))
    };
    let props_str = format_properties(&node.properties);

    let merge_on = node
        .labels
        .iter()
        .find_map(|l| label::merge_key(l))
        .and_then(|key| node.get(key).filter(|v| !v.is_null()).map(|v| (key, v)));

    match (mode, merge_on) {
        (DumpMode::Merge, Some((key, value))) => {
            let set_props = if props_str.is_empty() {
                String::new()
            } else {
                format!("n += {{{props_str}}}, ")
            };
            format!(
                "MERGE (n{labels_str} {{{key}: {}}}) SET {set_props}n._id = {};",
                format_value(value),
                node.id.0,
            )
        }
        _ => format!(
            "CREATE (n{labels_str} {{_id: {}{}}});",
            node.id.0,
            if props_str.is_empty() { String::new() } else { format!(", {props_str}") }
        ),
    }
}

/// The write half of a relationship statement, after its endpoints are matched.
fn relationship_clause(relationship: &Relationship, mode: DumpMode) -> String {
    let create = || {
        let props_str = format_properties(&relationship.properties);
        if props_str.is_empty() {
            format!("CREATE (a)-[:{}]->(b)", relationship.rel_type)
        } else {
            format!("CREATE (a)-[:{} {{{props_str}}}]->(b)", relationship.rel_type)
        }
    };
    if mode == DumpMode::Replace {
        return create();
    }

    match relationship.rel_type.as_str() {
        rel::IN => format!("MERGE (a)-[:{}]->(b)", rel::IN),
        rel::ACTION => {
            let Some(action_mode) = relationship.get("mode").filter(|v| !v.is_null()) else {
                return create();
            };
            let merge = format!("MERGE (a)-[r:{} {{mode: {}}}]->(b)", rel::ACTION, format_value(action_mode));
            match relationship.get("score").filter(|v| !v.is_null()) {
                Some(score) => {
                    let score = format_value(score);
                    format!(
                        "{merge} ON CREATE SET r.score = {score} \
                         ON MATCH SET r.score = CASE WHEN r.score IS NULL OR {score} > r.score THEN {score} ELSE r.score END"
                    )
                }
                None => merge,
            }
        }
        _ => create(),
    }
}

/// Format a PropertyMap as Cypher property string (key: value, ...).
fn format_properties(props: &PropertyMap) -> String {
    let mut keys: Vec<&String> = props
        .iter()
        .filter(|(key, value)| !key.starts_with('_') && !value.is_null())
        .map(|(key, _)| key)
        .collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("{}: {}", key, format_value(&props[key])))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a Value as a Cypher literal.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", escape(s)),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f}"),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(m) => {
            let mut inner: Vec<String> = m.iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            inner.sort();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
