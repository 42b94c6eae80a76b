//! # Graph Write Operations
//!
//! The fixed catalog of bulk writes the migration issues. Each operation
//! takes one batch — a sequence of per-record [`PropertyMap`] entries, the
//! shape of an `UNWIND $batch AS entry` parameter — and submits it to the
//! store through its batch path.
//!
//! | Operation | Cypher equivalent | Semantics |
//! |-----------|-------------------|-----------|
//! | [`create_entity`] | `CREATE (n:L {...})` | unconditional |
//! | [`merge_entity`] | `MERGE (n:L {key: ...})` | create if absent |
//! | [`merge_hierarchy_edge`] | `MERGE (c:Class)…MERGE (c)-[:IN]->(p)` | idempotent |
//! | [`create_membership_edge`] | `MATCH (a), (b) MERGE (a)-[:IN]->(b)` | idempotent, endpoint-guarded |
//! | [`merge_scored_edge`] | `MERGE (a)-[:ACTION {mode}]->(b)` | score = max(old, new) |
//! | [`create_plain_edge`] | `MATCH (a), (b) CREATE (a)-[:ASSOCIATION]->(b)` | always a new edge |
//! | [`create_index`] | `CREATE INDEX ON :L(f)` | idempotent |
//!
//! Every operation returns a [`WriteSummary`]. Records whose endpoints are
//! not in the store write nothing; they are counted in
//! `missing_endpoints` and logged instead of failing the batch.

mod hierarchy;

use std::ops::AddAssign;

use hashbrown::{HashMap, HashSet};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::index::IndexKey;
use crate::model::{NodeId, PropertyMap, Value};
use crate::records::{label, rel, SOURCE_ID_FIELD, TARGET_ID_FIELD};
use crate::storage::GraphStore;
use crate::{Error, Result};

pub use hierarchy::{merge_hierarchy_edge, ClassRegistry};

// ============================================================================
// WriteSummary
// ============================================================================

/// Counters reported by one write operation (or accumulated over many).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub nodes_created: u64,
    pub nodes_matched: u64,
    pub relationships_created: u64,
    pub relationships_matched: u64,
    pub properties_set: u64,
    /// Records dropped because an endpoint node was not in the store.
    pub missing_endpoints: u64,
}

impl WriteSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for WriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.nodes_created += other.nodes_created;
        self.nodes_matched += other.nodes_matched;
        self.relationships_created += other.relationships_created;
        self.relationships_matched += other.relationships_matched;
        self.properties_set += other.properties_set;
        self.missing_endpoints += other.missing_endpoints;
    }
}

// ============================================================================
// Entry field helpers
// ============================================================================

/// Where an endpoint's key lives in the entry and which node property it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchField {
    pub entry_field: &'static str,
    pub node_key: &'static str,
}

impl MatchField {
    pub const fn new(entry_field: &'static str, node_key: &'static str) -> Self {
        Self { entry_field, node_key }
    }
}

/// Key fields of both ends of a membership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchFields {
    pub entity: MatchField,
    pub target: MatchField,
}

impl MatchFields {
    pub const fn new(entity: MatchField, target: MatchField) -> Self {
        Self { entity, target }
    }

    /// Build one batch entry linking `entity_key` to `target_key`.
    pub fn entry(&self, entity_key: impl Into<Value>, target_key: impl Into<Value>) -> PropertyMap {
        let mut entry = PropertyMap::with_capacity(2);
        entry.insert(self.entity.entry_field.to_string(), entity_key.into());
        entry.insert(self.target.entry_field.to_string(), target_key.into());
        entry
    }
}

fn field<'e>(entry: &'e PropertyMap, name: &str) -> Result<&'e Value> {
    match entry.get(name) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(Error::StorageError(format!("batch entry has no '{name}' field"))),
    }
}

/// A batch entry's string field.
fn text_field<'e>(entry: &'e PropertyMap, name: &str) -> Result<&'e str> {
    field(entry, name)?
        .as_str()
        .ok_or_else(|| Error::StorageError(format!("batch entry field '{name}' is not a string")))
}

fn count_properties(props: &PropertyMap) -> u64 {
    props.values().filter(|v| !v.is_null()).count() as u64
}

fn report_missing(op: &str, missing: u64) {
    if missing > 0 {
        warn!(op, missing, "edge endpoints not found; records skipped");
    }
}

// ============================================================================
// Endpoint resolution
// ============================================================================

/// Every node a key lookup matched; usually one.
type Matches = SmallVec<[NodeId; 1]>;

/// Match-by-key lookups for one (label, key) pair, memoized for one batch.
///
/// Like a Cypher `MATCH`, a key shared by several nodes resolves to all of
/// them and the caller links each one.
struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    label: &'a str,
    key: &'a str,
    cache: HashMap<IndexKey, Matches>,
}

impl<'a, S: GraphStore + ?Sized> Resolver<'a, S> {
    fn new(store: &'a S, label: &'a str, key: &'a str) -> Self {
        Self { store, label, key, cache: HashMap::new() }
    }

    async fn resolve(&mut self, value: &Value) -> Result<Matches> {
        let cache_key = IndexKey::from_value(value);
        if let Some(hit) = cache_key.as_ref().and_then(|k| self.cache.get(k)) {
            return Ok(hit.clone());
        }
        let found: Matches = self.store
            .nodes_by_property(self.label, self.key, value)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        if let Some(k) = cache_key {
            self.cache.insert(k, found.clone());
        }
        Ok(found)
    }
}

/// Every (source, target) combination of two lookups.
fn endpoint_pairs(sources: &Matches, targets: &Matches) -> Vec<(NodeId, NodeId)> {
    sources
        .iter()
        .flat_map(|&src| targets.iter().map(move |&dst| (src, dst)))
        .collect()
}

// ============================================================================
// Entities
// ============================================================================

/// Create one `label` node per entry, without checking for existing ids.
///
/// The caller guarantees the batch holds no duplicate ids and the store
/// holds none of them (the run started from a wiped store).
pub async fn create_entity<S>(store: &S, label: &str, batch: Vec<PropertyMap>) -> Result<WriteSummary>
where
    S: GraphStore + ?Sized,
{
    let properties_set = batch.iter().map(count_properties).sum();
    let nodes = batch
        .into_iter()
        .map(|entry| (vec![label.to_string()], entry))
        .collect();
    let ids = store.create_nodes_batch(nodes).await?;

    debug!(label, created = ids.len(), "create_entity");
    Ok(WriteSummary {
        nodes_created: ids.len() as u64,
        properties_set,
        ..WriteSummary::default()
    })
}

/// Create a `label` node per entry unless one with the same `key` value
/// already exists (in the store or earlier in the batch).
pub async fn merge_entity<S>(store: &S, label: &str, key: &str, batch: Vec<PropertyMap>) -> Result<WriteSummary>
where
    S: GraphStore + ?Sized,
{
    let mut summary = WriteSummary::default();
    let mut resolver = Resolver::new(store, label, key);
    let mut seen: HashSet<IndexKey> = HashSet::new();
    let mut pending = Vec::new();

    for entry in batch {
        let value = field(&entry, key)?;
        let fresh_in_batch = match IndexKey::from_value(value) {
            Some(k) => seen.insert(k),
            None => true,
        };
        if !fresh_in_batch || !resolver.resolve(value).await?.is_empty() {
            summary.nodes_matched += 1;
            continue;
        }
        summary.properties_set += count_properties(&entry);
        pending.push((vec![label.to_string()], entry));
    }

    summary.nodes_created = store.create_nodes_batch(pending).await?.len() as u64;
    debug!(label, key, created = summary.nodes_created, matched = summary.nodes_matched, "merge_entity");
    Ok(summary)
}

// ============================================================================
// Membership edges
// ============================================================================

/// Link each entry's `entity_label` node to its `target_label` node with `IN`.
///
/// Both endpoints are matched by `fields`, and every matching node is
/// linked. A record whose endpoint is absent writes nothing and counts as a
/// missing endpoint; an `IN` edge that already exists is not duplicated.
pub async fn create_membership_edge<S>(
    store: &S,
    entity_label: &str,
    target_label: &str,
    batch: Vec<PropertyMap>,
    fields: MatchFields,
) -> Result<WriteSummary>
where
    S: GraphStore + ?Sized,
{
    let mut summary = WriteSummary::default();
    let mut entities = Resolver::new(store, entity_label, fields.entity.node_key);
    let mut targets = Resolver::new(store, target_label, fields.target.node_key);
    let mut linked: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut pending = Vec::new();

    for entry in &batch {
        let entity_key = field(entry, fields.entity.entry_field)?;
        let target_key = field(entry, fields.target.entry_field)?;

        let pairs = endpoint_pairs(&entities.resolve(entity_key).await?, &targets.resolve(target_key).await?);
        if pairs.is_empty() {
            summary.missing_endpoints += 1;
            continue;
        }

        for (src, dst) in pairs {
            if !linked.insert((src, dst)) || !store.relationships_between(src, dst, rel::IN).await?.is_empty() {
                summary.relationships_matched += 1;
                continue;
            }
            pending.push((src, dst, rel::IN.to_string(), PropertyMap::new()));
        }
    }

    summary.relationships_created = store.create_relationships_batch(pending).await?.len() as u64;
    report_missing("create_membership_edge", summary.missing_endpoints);
    debug!(entity_label, target_label, created = summary.relationships_created, "create_membership_edge");
    Ok(summary)
}

// ============================================================================
// Protein–protein edges
// ============================================================================

/// Resolve the protein endpoints of a protein–protein entry; empty when
/// either side is missing.
async fn protein_endpoints<S>(
    proteins: &mut Resolver<'_, S>,
    entry: &PropertyMap,
) -> Result<Vec<(NodeId, NodeId)>>
where
    S: GraphStore + ?Sized,
{
    let src = proteins.resolve(field(entry, SOURCE_ID_FIELD)?).await?;
    let dst = proteins.resolve(field(entry, TARGET_ID_FIELD)?).await?;
    Ok(endpoint_pairs(&src, &dst))
}

/// Merge `ACTION` edges keyed by (protein1, protein2, mode).
///
/// A new key creates the edge with the entry's score. An existing key keeps
/// the higher of the stored and incoming score, so the final score is the
/// maximum ever observed regardless of submission order.
pub async fn merge_scored_edge<S>(store: &S, batch: Vec<PropertyMap>) -> Result<WriteSummary>
where
    S: GraphStore + ?Sized,
{
    let mut summary = WriteSummary::default();
    let mut proteins = Resolver::new(store, label::PROTEIN, "id");
    let mut pending: Vec<(NodeId, NodeId, String, PropertyMap)> = Vec::new();
    let mut pending_keys: HashMap<(NodeId, NodeId, String), usize> = HashMap::new();

    for entry in batch {
        let pairs = protein_endpoints(&mut proteins, &entry).await?;
        if pairs.is_empty() {
            summary.missing_endpoints += 1;
            continue;
        }
        let mode = field(&entry, "mode")?;
        let score = entry.get("score").cloned().unwrap_or(Value::Null);
        let mode_key = mode.to_string();

        for (src, dst) in pairs {
            // Same key earlier in this batch: reconcile in place.
            if let Some(&i) = pending_keys.get(&(src, dst, mode_key.clone())) {
                let props = &mut pending[i].3;
                let current = props.remove("score").unwrap_or(Value::Null);
                props.insert("score".into(), current.max_of(score.clone()));
                summary.relationships_matched += 1;
                continue;
            }

            let existing = store
                .relationships_between(src, dst, rel::ACTION)
                .await?
                .into_iter()
                .find(|r| r.get("mode") == Some(mode));

            match existing {
                Some(action) => {
                    summary.relationships_matched += 1;
                    let current = action.get("score").cloned().unwrap_or(Value::Null);
                    let merged = current.clone().max_of(score.clone());
                    if merged != current {
                        store.set_relationship_property(action.id, "score", merged).await?;
                        summary.properties_set += 1;
                    }
                }
                None => {
                    let mut props = PropertyMap::with_capacity(2);
                    props.insert("mode".into(), mode.clone());
                    props.insert("score".into(), score.clone());
                    pending_keys.insert((src, dst, mode_key.clone()), pending.len());
                    pending.push((src, dst, rel::ACTION.to_string(), props));
                }
            }
        }
    }

    summary.properties_set += pending.iter().map(|(_, _, _, p)| count_properties(p)).sum::<u64>();
    summary.relationships_created = store.create_relationships_batch(pending).await?.len() as u64;
    report_missing("merge_scored_edge", summary.missing_endpoints);
    debug!(created = summary.relationships_created, matched = summary.relationships_matched, "merge_scored_edge");
    Ok(summary)
}

/// Create one `ASSOCIATION` edge per entry. Never merges: repeated
/// observations of a pair become parallel edges, each with its own scores.
pub async fn create_plain_edge<S>(store: &S, batch: Vec<PropertyMap>) -> Result<WriteSummary>
where
    S: GraphStore + ?Sized,
{
    let mut summary = WriteSummary::default();
    let mut proteins = Resolver::new(store, label::PROTEIN, "id");
    let mut pending = Vec::with_capacity(batch.len());

    for mut entry in batch {
        let pairs = protein_endpoints(&mut proteins, &entry).await?;
        if pairs.is_empty() {
            summary.missing_endpoints += 1;
            continue;
        }
        entry.remove(SOURCE_ID_FIELD);
        entry.remove(TARGET_ID_FIELD);
        for (src, dst) in pairs {
            summary.properties_set += count_properties(&entry);
            pending.push((src, dst, rel::ASSOCIATION.to_string(), entry.clone()));
        }
    }

    summary.relationships_created = store.create_relationships_batch(pending).await?.len() as u64;
    report_missing("create_plain_edge", summary.missing_endpoints);
    debug!(created = summary.relationships_created, "create_plain_edge");
    Ok(summary)
}

// ============================================================================
// Index
// ============================================================================

/// Declare an index on `label(field)`. Re-declaring is a no-op.
pub async fn create_index<S>(store: &S, label: &str, field: &str) -> Result<()>
where
    S: GraphStore + ?Sized,
{
    store.create_index(label, field).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::props;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_summary_accumulates() {
        let mut total = WriteSummary::default();
        total += WriteSummary { nodes_created: 2, missing_endpoints: 1, ..Default::default() };
        total += WriteSummary { nodes_created: 3, relationships_created: 4, ..Default::default() };
        assert_eq!(total.nodes_created, 5);
        assert_eq!(total.relationships_created, 4);
        assert_eq!(total.missing_endpoints, 1);
        assert!(!total.is_empty());
    }

    #[test]
    fn test_match_fields_entry() {
        let fields = MatchFields::new(
            MatchField::new("protein_external_id", "external_id"),
            MatchField::new("pathway_id", "id"),
        );
        let entry = fields.entry("9606.ENSP00000292303", "path:hsa04062");
        assert_eq!(entry.get("pathway_id"), Some(&Value::from("path:hsa04062")));
    }

    #[tokio::test]
    async fn test_merge_entity_dedupes_within_batch() {
        let store = MemoryBackend::new();
        let summary = merge_entity(&store, "Compound", "id", vec![
            props([("id", "C00001"), ("name", "H2O")]),
            props([("id", "C00001"), ("name", "Water")]),
        ]).await.unwrap();

        assert_eq!(summary.nodes_created, 1);
        assert_eq!(summary.nodes_matched, 1);
        assert_eq!(store.node_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_membership_links_every_matching_node() {
        let store = MemoryBackend::new();
        create_entity(&store, "Protein", vec![
            props([("id", "1"), ("external_id", "10090.ENSMUSP00000107069")]),
            props([("id", "7"), ("external_id", "10090.ENSMUSP00000107069")]),
        ]).await.unwrap();
        create_entity(&store, "Pathway", vec![props([("id", "path:mmu04062")])]).await.unwrap();

        let fields = MatchFields::new(
            MatchField::new("protein_external_id", "external_id"),
            MatchField::new("pathway_id", "id"),
        );
        let batch = vec![fields.entry("10090.ENSMUSP00000107069", "path:mmu04062")];
        let summary = create_membership_edge(&store, "Protein", "Pathway", batch, fields).await.unwrap();

        assert_eq!(summary.relationships_created, 2);
        assert_eq!(summary.missing_endpoints, 0);
        assert_eq!(store.relationships_by_type(rel::IN).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_entry_without_key_field_is_an_error() {
        let store = MemoryBackend::new();
        let result = merge_entity(&store, "Drug", "id", vec![props([("name", "Aspirin")])]).await;
        assert!(matches!(result, Err(Error::StorageError(_))));
    }
}
