//! Read-side lookups over a loaded graph.
//!
//! Each search matches nodes of one label whose `name` contains the query,
//! ignoring case, and gathers the neighborhood that the name lookup is for.
//!
//! | Search | Matches | Returns |
//! |--------|---------|---------|
//! | [`search_protein`] | `Protein.name` | associations (either direction), pathways |
//! | [`search_pathway`] | `Pathway.name` | transitive classes, member proteins |
//! | [`search_class`] | `Class.name` | pathways reaching the class through `IN*` |

use hashbrown::HashSet;
use serde::Serialize;

use crate::model::{Direction, Node, NodeId, Relationship};
use crate::records::{label, rel};
use crate::storage::GraphStore;
use crate::Result;

/// A protein and what it connects to.
#[derive(Debug, Clone, Serialize)]
pub struct ProteinMatch {
    pub protein: Node,
    pub associations: Vec<AssociatedProtein>,
    pub pathways: Vec<Node>,
}

/// One association edge and the protein on its other end.
#[derive(Debug, Clone, Serialize)]
pub struct AssociatedProtein {
    pub association: Relationship,
    pub other: Node,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathwayMatch {
    pub pathway: Node,
    /// Every class reachable through `IN*`, sorted by name.
    pub classes: Vec<Node>,
    pub proteins: Vec<Node>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMatch {
    pub class: Node,
    pub pathways: Vec<Node>,
}

fn name_contains(node: &Node, needle: &str) -> bool {
    node.name().is_some_and(|name| name.to_uppercase().contains(needle))
}

async fn matching<S>(store: &S, label: &str, query: &str) -> Result<Vec<Node>>
where
    S: GraphStore + ?Sized,
{
    let needle = query.trim().to_uppercase();
    let mut nodes: Vec<Node> = store
        .nodes_by_label(label)
        .await?
        .into_iter()
        .filter(|n| name_contains(n, &needle))
        .collect();
    nodes.sort_by_key(|n| n.id);
    Ok(nodes)
}

/// Nodes on the far side of `node`'s `IN` edges in `dir`, keeping `want`.
async fn members<S>(store: &S, node: NodeId, dir: Direction, want: &str) -> Result<Vec<Node>>
where
    S: GraphStore + ?Sized,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for edge in store.get_relationships(node, dir, Some(rel::IN)).await? {
        let Some(other) = edge.other_node(node) else { continue };
        if !seen.insert(other) {
            continue;
        }
        if let Some(n) = store.get_node(other).await?.filter(|n| n.has_label(want)) {
            out.push(n);
        }
    }
    Ok(out)
}

/// Distinct `want`-labeled nodes reachable from `node` through `IN*` in `dir`.
async fn reachable<S>(store: &S, node: NodeId, dir: Direction, want: &str) -> Result<Vec<Node>>
where
    S: GraphStore + ?Sized,
{
    let mut seen = HashSet::new();
    let mut out: Vec<Node> = store
        .expand(node, dir, &[rel::IN])
        .await?
        .into_iter()
        .map(|path| path.end().clone())
        .filter(|n| n.has_label(want) && seen.insert(n.id))
        .collect();
    out.sort_by(|a, b| a.name().cmp(&b.name()));
    Ok(out)
}

/// Proteins whose name contains `query`, with their association partners
/// and the pathways they belong to.
pub async fn search_protein<S>(store: &S, query: &str) -> Result<Vec<ProteinMatch>>
where
    S: GraphStore + ?Sized,
{
    let mut matches = Vec::new();
    for protein in matching(store, label::PROTEIN, query).await? {
        let mut associations = Vec::new();
        for association in store.get_relationships(protein.id, Direction::Both, Some(rel::ASSOCIATION)).await? {
            let Some(other_id) = association.other_node(protein.id) else { continue };
            if let Some(other) = store.get_node(other_id).await? {
                associations.push(AssociatedProtein { association, other });
            }
        }
        let pathways = members(store, protein.id, Direction::Outgoing, label::PATHWAY).await?;
        matches.push(ProteinMatch { protein, associations, pathways });
    }
    Ok(matches)
}

/// Pathways whose name contains `query`, with their class ancestry and
/// member proteins.
pub async fn search_pathway<S>(store: &S, query: &str) -> Result<Vec<PathwayMatch>>
where
    S: GraphStore + ?Sized,
{
    let mut matches = Vec::new();
    for pathway in matching(store, label::PATHWAY, query).await? {
        let classes = reachable(store, pathway.id, Direction::Outgoing, label::CLASS).await?;
        let proteins = members(store, pathway.id, Direction::Incoming, label::PROTEIN).await?;
        matches.push(PathwayMatch { pathway, classes, proteins });
    }
    Ok(matches)
}

/// Classes whose name contains `query`, with every pathway under them.
pub async fn search_class<S>(store: &S, query: &str) -> Result<Vec<ClassMatch>>
where
    S: GraphStore + ?Sized,
{
    let mut matches = Vec::new();
    for class in matching(store, label::CLASS, query).await? {
        let pathways = reachable(store, class.id, Direction::Incoming, label::PATHWAY).await?;
        matches.push(ClassMatch { class, pathways });
    }
    Ok(matches)
}
