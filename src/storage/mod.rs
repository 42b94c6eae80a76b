//! # Graph Store Trait
//!
//! This is THE contract between the migration pipeline and any graph store.
//! Every primitive the write operations and the search path need is
//! defined here.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory, with real equality indexes |
//!
//! Stores are handed bulk requests through `create_nodes_batch` and
//! `create_relationships_batch`; a store with a native batch path (an
//! `UNWIND $batch` endpoint, a columnar writer) overrides those two.

pub mod memory;

use async_trait::async_trait;
use crate::model::*;
use crate::index::IndexSpec;
use crate::Result;

pub use memory::MemoryBackend;

// ============================================================================
// Store capabilities
// ============================================================================

/// What a store can do — used by the migration driver to size its batches.
///
/// Defaults to no limit. Stores override via `capabilities()`.
#[derive(Debug, Clone, Default)]
pub struct StoreCapabilities {
    /// Largest batch one bulk call accepts.
    pub max_batch_size: Option<usize>,
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The graph store contract.
///
/// Writes are applied as they are issued; there are no transactions and no
/// rollback. A failed call leaves earlier writes in place.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the store, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    /// Delete every node and relationship. Index declarations survive, empty.
    /// Neo4j: `MATCH (n) DETACH DELETE n`.
    async fn delete_all(&self) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node with the given labels and properties.
    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId>;

    /// Get a node by ID. Returns None if not found.
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two nodes. Fails if either endpoint is absent.
    async fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    /// Set a property on a relationship (upsert).
    async fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()>;

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Get all relationships of a node, optionally filtered by direction and type.
    async fn get_relationships(
        &self,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    /// Outgoing relationships of one type from `src` to `dst`.
    ///
    /// Default: filters `get_relationships` on the source node.
    async fn relationships_between(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
    ) -> Result<Vec<Relationship>> {
        let rels = self.get_relationships(src, Direction::Outgoing, Some(rel_type)).await?;
        Ok(rels.into_iter().filter(|r| r.dst == dst).collect())
    }

    /// Expand from a node: BFS over every acyclic path of `rel_types`
    /// edges, one hop and deeper, up to the store's hop limit.
    async fn expand(
        &self,
        node: NodeId,
        dir: Direction,
        rel_types: &[&str],
    ) -> Result<Vec<Path>>;

    // ========================================================================
    // Index
    // ========================================================================

    /// Create an index on a label+property combination.
    ///
    /// Must be idempotent: creating an existing index is a no-op.
    async fn create_index(&self, label: &str, property: &str) -> Result<()>;

    /// All declared indexes.
    async fn indexes(&self) -> Result<Vec<IndexSpec>>;

    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self) -> Result<u64>;

    // ========================================================================
    // Scan
    // ========================================================================

    /// Return all nodes (no label filter).
    async fn all_nodes(&self) -> Result<Vec<Node>>;

    /// Find all nodes with a given label.
    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>>;

    /// Find nodes by label + property value (index-backed if available).
    async fn nodes_by_property(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>>;

    /// Find all relationships of a given type.
    ///
    /// Default: scans all nodes and collects outgoing relationships of that type.
    async fn relationships_by_type(&self, rel_type: &str) -> Result<Vec<Relationship>> {
        let mut result = Vec::new();
        let nodes = self.all_nodes().await?;
        for node in &nodes {
            let rels = self.get_relationships(node.id, Direction::Outgoing, Some(rel_type)).await?;
            result.extend(rels);
        }
        Ok(result)
    }

    // ========================================================================
    // Batch operations
    // ========================================================================

    /// Batch create nodes.
    ///
    /// Default falls back to sequential `create_node` calls.
    async fn create_nodes_batch(
        &self,
        nodes: Vec<(Vec<String>, PropertyMap)>,
    ) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(nodes.len());
        for (labels, props) in nodes {
            let label_refs: Vec<&str> = labels.iter().map(|s| s.as_str()).collect();
            ids.push(self.create_node(&label_refs, props).await?);
        }
        Ok(ids)
    }

    /// Batch create relationships.
    ///
    /// Default falls back to sequential `create_relationship` calls.
    async fn create_relationships_batch(
        &self,
        rels: Vec<(NodeId, NodeId, String, PropertyMap)>,
    ) -> Result<Vec<RelId>> {
        let mut ids = Vec::with_capacity(rels.len());
        for (src, dst, rel_type, props) in rels {
            ids.push(self.create_relationship(src, dst, &rel_type, props).await?);
        }
        Ok(ids)
    }

    // ========================================================================
    // Capability negotiation
    // ========================================================================

    /// Report what this store can do.
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }
}
