//! Class hierarchy writes.

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::model::{NodeId, PropertyMap, Value};
use crate::records::{label, rel};
use crate::storage::GraphStore;
use crate::Result;

use super::{text_field, WriteSummary};

/// Name → node of every `Class` this registry has merged.
///
/// Classes are keyed by name only, so one registry per run keeps the class
/// set unique across batches without re-querying the store.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    ids: HashMap<String, NodeId>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Find or create the `Class` named `name`.
    pub async fn merge<S>(&mut self, store: &S, name: &str, summary: &mut WriteSummary) -> Result<NodeId>
    where
        S: GraphStore + ?Sized,
    {
        if let Some(id) = self.get(name) {
            summary.nodes_matched += 1;
            return Ok(id);
        }

        let key = Value::from(name);
        let id = match store.nodes_by_property(label::CLASS, "name", &key).await?.first() {
            Some(node) => {
                summary.nodes_matched += 1;
                node.id
            }
            None => {
                let mut props = PropertyMap::with_capacity(1);
                props.insert("name".into(), key);
                summary.nodes_created += 1;
                summary.properties_set += 1;
                store.create_node(&[label::CLASS], props).await?
            }
        };
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }
}

/// Merge both classes of each entry and an `IN` edge from child to parent.
///
/// Entries name the child under `child_field` and the parent under
/// `parent_field`. Neither the class nodes nor the edge are ever duplicated.
pub async fn merge_hierarchy_edge<S>(
    store: &S,
    registry: &mut ClassRegistry,
    batch: Vec<PropertyMap>,
    parent_field: &str,
    child_field: &str,
) -> Result<WriteSummary>
where
    S: GraphStore + ?Sized,
{
    let mut summary = WriteSummary::default();
    let mut linked: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut pending = Vec::new();

    for entry in &batch {
        let child_name = text_field(entry, child_field)?;
        let parent_name = text_field(entry, parent_field)?;

        let child = registry.merge(store, child_name, &mut summary).await?;
        let parent = registry.merge(store, parent_name, &mut summary).await?;

        if !linked.insert((child, parent)) || !store.relationships_between(child, parent, rel::IN).await?.is_empty() {
            summary.relationships_matched += 1;
            continue;
        }
        pending.push((child, parent, rel::IN.to_string(), PropertyMap::new()));
    }

    summary.relationships_created = store.create_relationships_batch(pending).await?.len() as u64;
    debug!(classes = registry.len(), created = summary.relationships_created, "merge_hierarchy_edge");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::props;
    use crate::records::{CHILD_FIELD, PARENT_FIELD};
    use crate::storage::MemoryBackend;

    fn link(child: &str, parent: &str) -> PropertyMap {
        props([(CHILD_FIELD, child), (PARENT_FIELD, parent)])
    }

    #[tokio::test]
    async fn test_hierarchy_is_idempotent() {
        let store = MemoryBackend::new();
        let mut registry = ClassRegistry::new();

        let first = merge_hierarchy_edge(
            &store, &mut registry,
            vec![link("Immune system", "Organismal Systems")],
            PARENT_FIELD, CHILD_FIELD,
        ).await.unwrap();
        assert_eq!(first.nodes_created, 2);
        assert_eq!(first.relationships_created, 1);

        let second = merge_hierarchy_edge(
            &store, &mut registry,
            vec![
                link("Immune system", "Organismal Systems"),
                link("Immune system", "Organismal Systems"),
                link("Endocrine system", "Organismal Systems"),
            ],
            PARENT_FIELD, CHILD_FIELD,
        ).await.unwrap();
        assert_eq!(second.nodes_created, 1);
        assert_eq!(second.relationships_created, 1);
        assert_eq!(second.relationships_matched, 2);

        assert_eq!(store.nodes_by_label(label::CLASS).await.unwrap().len(), 3);
        assert_eq!(store.relationship_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_non_text_class_name_is_an_error() {
        let store = MemoryBackend::new();
        let mut registry = ClassRegistry::new();
        let entry = props([(CHILD_FIELD, Value::Int(7)), (PARENT_FIELD, Value::from("Metabolism"))]);

        let result = merge_hierarchy_edge(&store, &mut registry, vec![entry], PARENT_FIELD, CHILD_FIELD).await;

        assert!(matches!(result, Err(crate::Error::StorageError(_))));
        assert_eq!(store.node_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_registry_picks_up_existing_class() {
        let store = MemoryBackend::new();
        let existing = store
            .create_node(&[label::CLASS], props([("name", "Metabolism")]))
            .await
            .unwrap();

        let mut registry = ClassRegistry::new();
        let mut summary = WriteSummary::default();
        let id = registry.merge(&store, "Metabolism", &mut summary).await.unwrap();

        assert_eq!(id, existing);
        assert_eq!(summary.nodes_created, 0);
        assert_eq!(summary.nodes_matched, 1);
    }
}
