//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No transactions**: writes are applied immediately and never rolled back.
//! - **Single-writer only**: per-collection locks mean multi-step mutations
//!   are NOT atomic. Safe for the sequential migration driver.
//! - **Equality indexes only**: `create_index()` builds a value → node map;
//!   there are no range or full-text indexes.
//!
//! Use this store for:
//! - Testing the write operations, the migration driver and the search path
//! - Migrating into memory and exporting a Cypher dump afterwards

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::index::{IndexSpec, PropertyIndex};
use crate::model::*;
use crate::{Error, Result};
use super::GraphStore;

/// Hop limit for `expand`.
const UNBOUNDED_EXPAND_LIMIT: usize = 100;

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → list of relationship IDs
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label → node IDs
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    /// declared (label, property) indexes
    property_indexes: RwLock<HashMap<IndexSpec, PropertyIndex>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                property_indexes: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
            }),
        }
    }

    /// Insert one node under already-acquired locks.
    fn insert_node(
        &self,
        nodes: &mut HashMap<NodeId, Node>,
        adjacency: &mut HashMap<NodeId, Vec<RelId>>,
        label_index: &mut HashMap<String, Vec<NodeId>>,
        property_indexes: &mut HashMap<IndexSpec, PropertyIndex>,
        labels: Vec<String>,
        props: PropertyMap,
    ) -> NodeId {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node { id, labels, properties: props };

        for label in &node.labels {
            label_index.entry(label.clone()).or_default().push(id);
        }
        for (spec, idx) in property_indexes.iter_mut() {
            if node.has_label(&spec.label) {
                if let Some(value) = node.get(&spec.property) {
                    idx.insert(value, id);
                }
            }
        }

        nodes.insert(id, node);
        adjacency.insert(id, Vec::new());
        id
    }

    /// Insert one relationship under already-acquired locks.
    fn insert_relationship(
        &self,
        nodes: &HashMap<NodeId, Node>,
        relationships: &mut HashMap<RelId, Relationship>,
        adjacency: &mut HashMap<NodeId, Vec<RelId>>,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        if !nodes.contains_key(&src) {
            return Err(Error::NotFound(format!("Source node {src}")));
        }
        if !nodes.contains_key(&dst) {
            return Err(Error::NotFound(format!("Target node {dst}")));
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let mut rel = Relationship::new(id, src, dst, rel_type);
        rel.properties = props;
        relationships.insert(id, rel);

        adjacency.entry(src).or_default().push(id);
        if src != dst {
            adjacency.entry(dst).or_default().push(id);
        }
        Ok(id)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryBackend {
    async fn shutdown(&self) -> Result<()> { Ok(()) }

    /// Clears nodes and relationships. Index declarations survive, emptied,
    /// as they do in Neo4j after `DETACH DELETE`.
    async fn delete_all(&self) -> Result<()> {
        self.inner.nodes.write().clear();
        self.inner.relationships.write().clear();
        self.inner.adjacency.write().clear();
        self.inner.label_index.write().clear();
        for idx in self.inner.property_indexes.write().values_mut() {
            idx.clear();
        }
        Ok(())
    }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        let labels = labels.iter().map(|l| l.to_string()).collect();
        let mut nodes = self.inner.nodes.write();
        let mut adjacency = self.inner.adjacency.write();
        let mut label_index = self.inner.label_index.write();
        let mut property_indexes = self.inner.property_indexes.write();
        Ok(self.insert_node(
            &mut nodes, &mut adjacency, &mut label_index, &mut property_indexes, labels, props,
        ))
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        let nodes = self.inner.nodes.read();
        let mut relationships = self.inner.relationships.write();
        let mut adjacency = self.inner.adjacency.write();
        self.insert_relationship(&nodes, &mut relationships, &mut adjacency, src, dst, rel_type, props)
    }

    async fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        rel.properties.insert(key.to_string(), val);
        Ok(())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    async fn get_relationships(
        &self,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();

        let Some(rel_ids) = adj.get(&node) else {
            return Ok(Vec::new());
        };

        let result = rel_ids
            .iter()
            .filter_map(|rid| rels.get(rid))
            .filter(|rel| match dir {
                Direction::Outgoing => rel.src == node,
                Direction::Incoming => rel.dst == node,
                Direction::Both => true,
            })
            .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
            .cloned()
            .collect();

        Ok(result)
    }

    async fn expand(
        &self,
        node: NodeId,
        dir: Direction,
        rel_types: &[&str],
    ) -> Result<Vec<Path>> {
        let mut results = Vec::new();
        let start_node = self.get_node(node).await?
            .ok_or_else(|| Error::NotFound(format!("Node {node}")))?;

        // BFS expansion
        let mut queue: Vec<Path> = vec![Path::single(start_node)];

        for current_depth in 0..UNBOUNDED_EXPAND_LIMIT {
            let mut next_queue = Vec::new();

            for path in &queue {
                let tip = path.end().id;
                let rels = self.get_relationships(tip, dir, None).await?;

                for rel in rels {
                    if !rel_types.is_empty() && !rel_types.contains(&rel.rel_type.as_str()) {
                        continue;
                    }

                    let next_id = rel.other_node(tip).unwrap_or(rel.dst);
                    let Some(next_node) = self.get_node(next_id).await? else {
                        continue;
                    };

                    // Avoid cycles
                    if path.contains(&next_node) {
                        continue;
                    }

                    let mut new_path = path.clone();
                    new_path.append(rel, next_node);

                    results.push(new_path.clone());
                    if current_depth + 1 < UNBOUNDED_EXPAND_LIMIT {
                        next_queue.push(new_path);
                    }
                }
            }

            queue = next_queue;
            if queue.is_empty() { break; }
        }

        Ok(results)
    }

    // ========================================================================
    // Index
    // ========================================================================

    async fn create_index(&self, label: &str, property: &str) -> Result<()> {
        let spec = IndexSpec::new(label, property);
        let nodes = self.inner.nodes.read();
        let label_index = self.inner.label_index.read();
        let mut indexes = self.inner.property_indexes.write();
        if indexes.contains_key(&spec) {
            return Ok(());
        }

        // Backfill from nodes that already carry the label.
        let mut idx = PropertyIndex::new();
        for id in label_index.get(label).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(value) = nodes.get(id).and_then(|n| n.get(property)) {
                idx.insert(value, *id);
            }
        }

        tracing::debug!(index = %spec, entries = idx.len(), "index created");
        indexes.insert(spec, idx);
        Ok(())
    }

    async fn indexes(&self) -> Result<Vec<IndexSpec>> {
        let mut specs: Vec<IndexSpec> = self.inner.property_indexes.read().keys().cloned().collect();
        specs.sort();
        Ok(specs)
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn node_count(&self) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self) -> Result<u64> {
        Ok(self.inner.relationships.read().len() as u64)
    }

    // ========================================================================
    // Scan
    // ========================================================================

    async fn all_nodes(&self) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self.inner.nodes.read().values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        Ok(idx.get(label)
            .map(|ids| ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn nodes_by_property(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>> {
        let nodes = self.inner.nodes.read();

        // Index-backed lookup when one is declared and the value is indexable.
        {
            let indexes = self.inner.property_indexes.read();
            if let Some(ids) = indexes
                .get(&IndexSpec::new(label, key))
                .and_then(|idx| idx.get(value))
            {
                return Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect());
            }
        }

        let idx = self.inner.label_index.read();
        Ok(idx.get(label)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| nodes.get(id))
                    .filter(|n| n.get(key) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    // ========================================================================
    // Batch operations (native: one lock acquisition per batch)
    // ========================================================================

    async fn create_nodes_batch(
        &self,
        batch: Vec<(Vec<String>, PropertyMap)>,
    ) -> Result<Vec<NodeId>> {
        let mut nodes = self.inner.nodes.write();
        let mut adjacency = self.inner.adjacency.write();
        let mut label_index = self.inner.label_index.write();
        let mut property_indexes = self.inner.property_indexes.write();

        Ok(batch
            .into_iter()
            .map(|(labels, props)| {
                self.insert_node(
                    &mut nodes, &mut adjacency, &mut label_index, &mut property_indexes, labels, props,
                )
            })
            .collect())
    }

    async fn create_relationships_batch(
        &self,
        batch: Vec<(NodeId, NodeId, String, PropertyMap)>,
    ) -> Result<Vec<RelId>> {
        let nodes = self.inner.nodes.read();
        let mut relationships = self.inner.relationships.write();
        let mut adjacency = self.inner.adjacency.write();

        batch
            .into_iter()
            .map(|(src, dst, rel_type, props)| {
                self.insert_relationship(
                    &nodes, &mut relationships, &mut adjacency, src, dst, &rel_type, props,
                )
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::props;

    #[tokio::test]
    async fn test_create_and_get_node() {
        let db = MemoryBackend::new();

        let id = db.create_node(&["Protein"], props([("name", "CCR5")])).await.unwrap();
        let node = db.get_node(id).await.unwrap().unwrap();

        assert_eq!(node.labels, vec!["Protein"]);
        assert_eq!(node.get("name"), Some(&Value::from("CCR5")));
    }

    #[tokio::test]
    async fn test_create_relationship() {
        let db = MemoryBackend::new();

        let a = db.create_node(&["Protein"], PropertyMap::new()).await.unwrap();
        let b = db.create_node(&["Protein"], PropertyMap::new()).await.unwrap();

        let rel_id = db.create_relationship(a, b, "ASSOCIATION", PropertyMap::new()).await.unwrap();
        let rels = db.relationships_between(a, b, "ASSOCIATION").await.unwrap();
        let rel = &rels[0];

        assert_eq!(rel.id, rel_id);
        assert_eq!(rel.src, a);
        assert_eq!(rel.dst, b);
        assert_eq!(rel.rel_type, "ASSOCIATION");
    }

    #[tokio::test]
    async fn test_relationship_requires_endpoints() {
        let db = MemoryBackend::new();
        let a = db.create_node(&["Protein"], PropertyMap::new()).await.unwrap();

        let result = db.create_relationship(a, NodeId(999), "ACTION", PropertyMap::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_all_keeps_index_declarations() {
        let db = MemoryBackend::new();
        db.create_index("Protein", "id").await.unwrap();
        let a = db.create_node(&["Protein"], props([("id", "1")])).await.unwrap();
        let b = db.create_node(&["Protein"], props([("id", "2")])).await.unwrap();
        db.create_relationship(a, b, "ACTION", PropertyMap::new()).await.unwrap();

        db.delete_all().await.unwrap();

        assert_eq!(db.node_count().await.unwrap(), 0);
        assert_eq!(db.relationship_count().await.unwrap(), 0);
        assert!(db.nodes_by_label("Protein").await.unwrap().is_empty());
        assert_eq!(db.indexes().await.unwrap(), vec![IndexSpec::new("Protein", "id")]);
        assert!(db.nodes_by_property("Protein", "id", &Value::from("1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_backfill_and_maintenance() {
        let db = MemoryBackend::new();
        db.create_node(&["Pathway"], props([("id", "path:hsa04062")])).await.unwrap();

        db.create_index("Pathway", "id").await.unwrap();
        db.create_index("Pathway", "id").await.unwrap();
        db.create_node(&["Pathway"], props([("id", "path:hsa04060")])).await.unwrap();

        let old = db.nodes_by_property("Pathway", "id", &Value::from("path:hsa04062")).await.unwrap();
        let new = db.nodes_by_property("Pathway", "id", &Value::from("path:hsa04060")).await.unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(new.len(), 1);
        assert_eq!(db.indexes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nodes_by_property_scan_without_index() {
        let db = MemoryBackend::new();
        db.create_node(&["Drug"], props([("id", "D00001")])).await.unwrap();
        db.create_node(&["Compound"], props([("id", "D00001")])).await.unwrap();

        let drugs = db.nodes_by_property("Drug", "id", &Value::from("D00001")).await.unwrap();
        assert_eq!(drugs.len(), 1);
        assert!(drugs[0].has_label("Drug"));
    }

    #[tokio::test]
    async fn test_batch_writes() {
        let db = MemoryBackend::new();
        let ids = db.create_nodes_batch(vec![
            (vec!["Compound".into()], props([("id", "C00001")])),
            (vec!["Compound".into()], props([("id", "C00002")])),
        ]).await.unwrap();
        assert_eq!(ids.len(), 2);

        let rels = db.create_relationships_batch(vec![
            (ids[0], ids[1], "IN".into(), PropertyMap::new()),
        ]).await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(db.relationships_between(ids[0], ids[1], "IN").await.unwrap().len(), 1);
        assert!(db.relationships_between(ids[1], ids[0], "IN").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relationships_by_type() {
        let db = MemoryBackend::new();

        let a = db.create_node(&["Protein"], PropertyMap::new()).await.unwrap();
        let b = db.create_node(&["Protein"], PropertyMap::new()).await.unwrap();
        let c = db.create_node(&["Protein"], PropertyMap::new()).await.unwrap();

        db.create_relationship(a, b, "ASSOCIATION", PropertyMap::new()).await.unwrap();
        db.create_relationship(b, c, "ACTION", PropertyMap::new()).await.unwrap();
        db.create_relationship(a, c, "ASSOCIATION", PropertyMap::new()).await.unwrap();

        assert_eq!(db.relationships_by_type("ASSOCIATION").await.unwrap().len(), 2);
        assert_eq!(db.relationships_by_type("ACTION").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_traversal() {
        let db = MemoryBackend::new();

        let pathway = db.create_node(&["Pathway"], PropertyMap::new()).await.unwrap();
        let immune = db.create_node(&["Class"], PropertyMap::new()).await.unwrap();
        let organismal = db.create_node(&["Class"], PropertyMap::new()).await.unwrap();

        db.create_relationship(pathway, immune, "IN", PropertyMap::new()).await.unwrap();
        db.create_relationship(immune, organismal, "IN", PropertyMap::new()).await.unwrap();

        let paths = db.expand(pathway, Direction::Outgoing, &["IN"]).await.unwrap();

        // pathway->immune and pathway->immune->organismal
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].end().id, organismal);
    }
}
