//! Index management.
//!
//! An index is declared on a (label, property) pair. Stores that maintain
//! real indexes use [`PropertyIndex`] to map an exact property value to the
//! nodes carrying it; lookups by key (`MATCH (p:Protein {id: ...})`) then
//! avoid a label scan.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{NodeId, Value};

/// An index declaration: `CREATE INDEX ON :Label(property)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexSpec {
    pub label: String,
    pub property: String,
}

impl IndexSpec {
    pub fn new(label: impl Into<String>, property: impl Into<String>) -> Self {
        Self { label: label.into(), property: property.into() }
    }
}

impl std::fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}({})", self.label, self.property)
    }
}

/// Hashable projection of an indexable [`Value`].
///
/// Only exact-match scalars are indexed; floats, lists, maps and null are not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    String(String),
}

impl IndexKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Int(i) => Some(IndexKey::Int(*i)),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }
}

/// Equality index over one (label, property) pair.
#[derive(Debug, Default)]
pub struct PropertyIndex {
    entries: HashMap<IndexKey, SmallVec<[NodeId; 1]>>,
}

impl PropertyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: &Value, node: NodeId) {
        if let Some(key) = IndexKey::from_value(value) {
            let ids = self.entries.entry(key).or_default();
            if !ids.contains(&node) {
                ids.push(node);
            }
        }
    }

    /// Node ids carrying exactly `value`, or `None` when the value is not
    /// indexable and the caller must fall back to a scan.
    pub fn get(&self, value: &Value) -> Option<&[NodeId]> {
        let key = IndexKey::from_value(value)?;
        Some(self.entries.get(&key).map(|ids| ids.as_slice()).unwrap_or(&[]))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_lookup() {
        let mut idx = PropertyIndex::new();
        idx.insert(&Value::from("9606.ENSP1"), NodeId(1));
        idx.insert(&Value::from("9606.ENSP2"), NodeId(2));
        idx.insert(&Value::from("9606.ENSP1"), NodeId(1));

        assert_eq!(idx.get(&Value::from("9606.ENSP1")), Some(&[NodeId(1)][..]));
        assert_eq!(idx.get(&Value::from("missing")), Some(&[][..]));
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_unindexable_values_fall_back() {
        let idx = PropertyIndex::new();
        assert!(idx.get(&Value::Float(0.5)).is_none());
        assert!(idx.get(&Value::Null).is_none());
    }

    #[test]
    fn test_index_spec_display() {
        assert_eq!(IndexSpec::new("Protein", "id").to_string(), ":Protein(id)");
    }
}
