//! Graph vocabulary and per-record write shapes.
//!
//! Labels and relationship types are fixed by the target graph schema.
//! Each record type flattens into the [`PropertyMap`] a bulk write expects
//! for one entry of its batch.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::evidence::{EvidenceScores, Score};
use crate::model::{props, PropertyMap, Value};
use crate::source::{ActionRow, AssociationRow, ProteinRow};

/// Node labels.
pub mod label {
    pub const PROTEIN: &str = "Protein";
    pub const COMPOUND: &str = "Compound";
    pub const DRUG: &str = "Drug";
    pub const DISEASE: &str = "Disease";
    pub const PATHWAY: &str = "Pathway";
    pub const CLASS: &str = "Class";

    /// Property a node of `label` is merged on, for the labels that have one.
    pub fn merge_key(label: &str) -> Option<&'static str> {
        match label {
            PROTEIN | COMPOUND | DRUG | DISEASE | PATHWAY => Some("id"),
            CLASS => Some("name"),
            _ => None,
        }
    }
}

/// Relationship types.
pub mod rel {
    pub const ASSOCIATION: &str = "ASSOCIATION";
    pub const ACTION: &str = "ACTION";
    pub const IN: &str = "IN";
}

/// Flatten a record into one batch entry.
pub trait IntoProperties {
    fn into_properties(self) -> PropertyMap;
}

// ============================================================================
// Action mode
// ============================================================================

/// Functional mode of an action edge; part of the edge's merge key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    Ptmod,
    Reaction,
    Binding,
    Catalysis,
    Activation,
}

impl ActionMode {
    pub const ALL: [ActionMode; 5] = [
        ActionMode::Ptmod,
        ActionMode::Reaction,
        ActionMode::Binding,
        ActionMode::Catalysis,
        ActionMode::Activation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionMode::Ptmod => "ptmod",
            ActionMode::Reaction => "reaction",
            ActionMode::Binding => "binding",
            ActionMode::Catalysis => "catalysis",
            ActionMode::Activation => "activation",
        }
    }
}

impl FromStr for ActionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ActionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown action mode '{wanted}'"))
    }
}

impl std::fmt::Display for ActionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionMode> for Value {
    fn from(mode: ActionMode) -> Self {
        Value::from(mode.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Compound, drug or disease: `{id, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    pub name: String,
}

impl IntoProperties for NamedEntity {
    fn into_properties(self) -> PropertyMap {
        props([("id", self.id), ("name", self.name)])
    }
}

/// Protein node. The name is stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protein {
    pub id: String,
    pub external_id: String,
    pub name: String,
    pub description: String,
}

impl From<ProteinRow> for Protein {
    fn from(row: ProteinRow) -> Self {
        Self {
            id: row.id,
            external_id: row.external_id,
            name: row.preferred_name.to_uppercase(),
            description: row.annotation,
        }
    }
}

impl IntoProperties for Protein {
    fn into_properties(self) -> PropertyMap {
        props([
            ("id", self.id),
            ("external_id", self.external_id),
            ("name", self.name),
            ("description", self.description),
        ])
    }
}

/// Pathway node: `{id, name, description}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathway {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl IntoProperties for Pathway {
    fn into_properties(self) -> PropertyMap {
        props([("id", self.id), ("name", self.name), ("description", self.description)])
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Entry fields that carry the endpoint protein ids of a protein–protein edge.
pub const SOURCE_ID_FIELD: &str = "id1";
pub const TARGET_ID_FIELD: &str = "id2";

/// Association edge entry: endpoint ids, the seven evidence fields, `combined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub id1: String,
    pub id2: String,
    pub scores: EvidenceScores,
    pub combined: Score,
}

impl From<AssociationRow> for Association {
    fn from(row: AssociationRow) -> Self {
        Self {
            scores: EvidenceScores::decode(row.evidence_scores),
            id1: row.id1,
            id2: row.id2,
            combined: row.combined_score,
        }
    }
}

impl IntoProperties for Association {
    fn into_properties(self) -> PropertyMap {
        let mut entry = props([(SOURCE_ID_FIELD, self.id1), (TARGET_ID_FIELD, self.id2)]);
        self.scores.write_into(&mut entry);
        entry.insert("combined".into(), Value::Int(self.combined));
        entry
    }
}

/// Action edge entry: endpoint ids, `mode` (merge key) and `score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id1: String,
    pub id2: String,
    pub mode: ActionMode,
    pub score: Score,
}

impl From<ActionRow> for Action {
    fn from(row: ActionRow) -> Self {
        Self { id1: row.id1, id2: row.id2, mode: row.mode, score: row.score }
    }
}

impl IntoProperties for Action {
    fn into_properties(self) -> PropertyMap {
        props([
            (SOURCE_ID_FIELD, Value::from(self.id1)),
            (TARGET_ID_FIELD, Value::from(self.id2)),
            ("mode", Value::from(self.mode)),
            ("score", Value::Int(self.score)),
        ])
    }
}

/// Entry fields of a class hierarchy link.
pub const PARENT_FIELD: &str = "name_parent";
pub const CHILD_FIELD: &str = "name_child";

/// Child class → parent class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassLink {
    pub child: String,
    pub parent: String,
}

impl IntoProperties for ClassLink {
    fn into_properties(self) -> PropertyMap {
        props([(CHILD_FIELD, self.child), (PARENT_FIELD, self.parent)])
    }
}
