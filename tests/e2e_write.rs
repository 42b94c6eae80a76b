//! End-to-end tests for the graph write operations.
//!
//! Each test seeds a MemoryBackend with proteins, submits batches through
//! the write catalog and checks the resulting graph through the store API.

use pretty_assertions::assert_eq;
use protein_graph::model::props;
use protein_graph::records::{label, rel, Action, Association, IntoProperties, Protein};
use protein_graph::source::{AssociationRow, ProteinRow};
use protein_graph::write::{
    create_entity, create_index, create_membership_edge, create_plain_edge, merge_scored_edge, MatchField,
    MatchFields,
};
use protein_graph::{ActionMode, GraphStore, MemoryBackend, NodeId, Value};

async fn seed_proteins(store: &MemoryBackend) -> (NodeId, NodeId) {
    let proteins = [("1", "CCR5"), ("2", "CCL5")]
        .into_iter()
        .map(|(id, name)| {
            Protein::from(ProteinRow {
                id: id.into(),
                external_id: format!("10090.{name}"),
                preferred_name: name.into(),
                annotation: String::new(),
            })
            .into_properties()
        })
        .collect();
    create_entity(store, label::PROTEIN, proteins).await.unwrap();
    create_index(store, label::PROTEIN, "id").await.unwrap();

    (protein_id(store, "1").await, protein_id(store, "2").await)
}

async fn protein_id(store: &MemoryBackend, id: &str) -> NodeId {
    store.nodes_by_property(label::PROTEIN, "id", &Value::from(id)).await.unwrap()[0].id
}

fn action(id1: &str, id2: &str, mode: ActionMode, score: i64) -> protein_graph::PropertyMap {
    Action { id1: id1.into(), id2: id2.into(), mode, score }.into_properties()
}

// ============================================================================
// 1. ACTION edges merge on (src, dst, mode)
// ============================================================================

#[tokio::test]
async fn test_same_action_twice_is_one_edge() {
    let store = MemoryBackend::new();
    let (ccr5, ccl5) = seed_proteins(&store).await;

    merge_scored_edge(&store, vec![action("1", "2", ActionMode::Binding, 849)]).await.unwrap();
    let second = merge_scored_edge(&store, vec![action("1", "2", ActionMode::Binding, 849)]).await.unwrap();

    assert_eq!(second.relationships_created, 0);
    assert_eq!(second.relationships_matched, 1);
    let edges = store.relationships_between(ccr5, ccl5, rel::ACTION).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].get("score"), Some(&Value::Int(849)));
}

#[tokio::test]
async fn test_action_score_is_max_in_either_order() {
    for scores in [[171, 278], [278, 171]] {
        let store = MemoryBackend::new();
        let (ccr5, ccl5) = seed_proteins(&store).await;

        for score in scores {
            merge_scored_edge(&store, vec![action("1", "2", ActionMode::Catalysis, score)]).await.unwrap();
        }

        let edges = store.relationships_between(ccr5, ccl5, rel::ACTION).await.unwrap();
        assert_eq!(edges.len(), 1, "scores {scores:?}");
        assert_eq!(edges[0].get("score"), Some(&Value::Int(278)), "scores {scores:?}");
    }
}

#[tokio::test]
async fn test_action_max_within_one_batch() {
    let store = MemoryBackend::new();
    let (ccr5, ccl5) = seed_proteins(&store).await;

    let summary = merge_scored_edge(&store, vec![
        action("1", "2", ActionMode::Reaction, 171),
        action("1", "2", ActionMode::Reaction, 278),
        action("1", "2", ActionMode::Reaction, 200),
    ]).await.unwrap();

    assert_eq!(summary.relationships_created, 1);
    let edges = store.relationships_between(ccr5, ccl5, rel::ACTION).await.unwrap();
    assert_eq!(edges[0].get("score"), Some(&Value::Int(278)));
}

#[tokio::test]
async fn test_action_modes_and_directions_are_distinct() {
    let store = MemoryBackend::new();
    let (ccr5, ccl5) = seed_proteins(&store).await;

    merge_scored_edge(&store, vec![
        action("1", "2", ActionMode::Binding, 849),
        action("1", "2", ActionMode::Ptmod, 171),
        action("2", "1", ActionMode::Binding, 849),
    ]).await.unwrap();

    assert_eq!(store.relationships_between(ccr5, ccl5, rel::ACTION).await.unwrap().len(), 2);
    assert_eq!(store.relationships_between(ccl5, ccr5, rel::ACTION).await.unwrap().len(), 1);
}

// ============================================================================
// 2. ASSOCIATION edges are never merged
// ============================================================================

#[tokio::test]
async fn test_association_twice_is_two_edges() {
    let store = MemoryBackend::new();
    let (ccr5, ccl5) = seed_proteins(&store).await;

    let association = || Association::from(AssociationRow {
        id1: "1".into(),
        id2: "2".into(),
        evidence_scores: vec![(6, 92), (10, 900), (12, 906)],
        combined_score: 993,
    }).into_properties();

    create_plain_edge(&store, vec![association()]).await.unwrap();
    create_plain_edge(&store, vec![association()]).await.unwrap();

    let edges = store.relationships_between(ccr5, ccl5, rel::ASSOCIATION).await.unwrap();
    assert_eq!(edges.len(), 2);
    for edge in edges {
        assert_eq!(edge.get("combined"), Some(&Value::Int(993)));
        assert_eq!(edge.get("textmining"), Some(&Value::Int(906)));
        assert_eq!(edge.get("fusion"), Some(&Value::Null));
        assert_eq!(edge.get("id1"), None);
    }
}

#[tokio::test]
async fn test_edge_with_unknown_protein_is_skipped() {
    let store = MemoryBackend::new();
    seed_proteins(&store).await;

    let summary = merge_scored_edge(&store, vec![
        action("1", "999", ActionMode::Activation, 500),
        action("1", "2", ActionMode::Activation, 500),
    ]).await.unwrap();

    assert_eq!(summary.missing_endpoints, 1);
    assert_eq!(summary.relationships_created, 1);
    assert_eq!(store.relationship_count().await.unwrap(), 1);
}

// ============================================================================
// 3. Membership edges
// ============================================================================

#[tokio::test]
async fn test_membership_is_idempotent_and_endpoint_guarded() {
    let store = MemoryBackend::new();
    seed_proteins(&store).await;
    create_entity(&store, label::PATHWAY, vec![props([
        ("id", "path:mmu04062"),
        ("name", "Chemokine signaling pathway"),
    ])]).await.unwrap();

    let fields = MatchFields::new(
        MatchField::new("protein_external_id", "external_id"),
        MatchField::new("pathway_id", "id"),
    );
    let batch = || vec![
        fields.entry("10090.CCR5", "path:mmu04062"),
        fields.entry("10090.TP53", "path:mmu04062"),
        fields.entry("10090.CCL5", "path:mmu99999"),
    ];

    let first = create_membership_edge(&store, label::PROTEIN, label::PATHWAY, batch(), fields).await.unwrap();
    assert_eq!(first.relationships_created, 1);
    assert_eq!(first.missing_endpoints, 2);

    let second = create_membership_edge(&store, label::PROTEIN, label::PATHWAY, batch(), fields).await.unwrap();
    assert_eq!(second.relationships_created, 0);
    assert_eq!(second.relationships_matched, 1);

    assert_eq!(store.relationships_by_type(rel::IN).await.unwrap().len(), 1);
}

// ============================================================================
// 4. Indexes
// ============================================================================

#[tokio::test]
async fn test_create_index_twice_is_noop() {
    let store = MemoryBackend::new();
    create_index(&store, label::PATHWAY, "name").await.unwrap();
    create_index(&store, label::PATHWAY, "name").await.unwrap();
    assert_eq!(store.indexes().await.unwrap().len(), 1);
}
