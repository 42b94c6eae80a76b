//! Relational source contract.
//!
//! The relational side is a black-box row producer: the driver asks it to
//! resolve a species and then streams proteins, associations and actions,
//! optionally narrowed to one protein pair. Rows are handed out as
//! fallible iterators so a malformed row aborts the load at the point it is
//! read.

use serde::{Deserialize, Serialize};

use crate::evidence::Score;
use crate::records::ActionMode;
use crate::Result;

/// Internal species identifier of the relational source.
pub type SpeciesId = i64;

/// Streamed rows from a relational query.
pub type RowIter<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

// ============================================================================
// Rows
// ============================================================================

/// One protein of a species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinRow {
    pub id: String,
    pub external_id: String,
    pub preferred_name: String,
    pub annotation: String,
}

/// One association between two proteins, with sparse per-channel evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRow {
    pub id1: String,
    pub id2: String,
    pub evidence_scores: Vec<(i64, Score)>,
    pub combined_score: Score,
}

/// One directed, mode-typed action between two proteins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRow {
    pub id1: String,
    pub id2: String,
    pub mode: ActionMode,
    pub score: Score,
}

// ============================================================================
// Protein pair filter
// ============================================================================

/// Two protein identifiers given on stdin (preferred name or external id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinPair {
    pub first: String,
    pub second: String,
}

impl ProteinPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self { first: first.into(), second: second.into() }
    }

    /// Whether `protein` is one of the pair. Names compare case-insensitively,
    /// external ids exactly.
    pub fn names(&self, protein: &ProteinRow) -> bool {
        [&self.first, &self.second].into_iter().any(|wanted| {
            protein.preferred_name.eq_ignore_ascii_case(wanted) || protein.external_id == *wanted
        })
    }
}

impl std::fmt::Display for ProteinPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <---> {}", self.first, self.second)
    }
}

/// Protein ids a pair resolved to, used to narrow edge queries.
#[derive(Debug, Clone, Default)]
pub struct PairIds {
    first: Vec<String>,
    second: Vec<String>,
}

impl PairIds {
    /// Resolve a pair against a species' proteins.
    pub fn resolve<'a>(pair: &ProteinPair, proteins: impl IntoIterator<Item = &'a ProteinRow>) -> Self {
        let mut ids = Self::default();
        for protein in proteins {
            let is = |wanted: &str| {
                protein.preferred_name.eq_ignore_ascii_case(wanted) || protein.external_id == wanted
            };
            if is(&pair.first) {
                ids.first.push(protein.id.clone());
            }
            if is(&pair.second) {
                ids.second.push(protein.id.clone());
            }
        }
        ids
    }

    /// Whether an edge `id1 — id2` connects the pair, in either direction.
    pub fn connects(&self, id1: &str, id2: &str) -> bool {
        let has = |side: &[String], id: &str| side.iter().any(|s| s == id);
        (has(&self.first, id1) && has(&self.second, id2))
            || (has(&self.second, id1) && has(&self.first, id2))
    }
}

// ============================================================================
// RelationalSource Trait
// ============================================================================

/// Query contract of the relational snapshot.
pub trait RelationalSource {
    /// Resolve a species name to its internal id.
    fn resolve_species(&self, name: &str) -> Result<Option<SpeciesId>>;

    /// Proteins of a species, or only the two named by `pair`.
    fn list_proteins(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, ProteinRow>>;

    /// Associations of a species, or only those connecting `pair`.
    fn list_associations(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, AssociationRow>>;

    /// Actions of a species, or only those connecting `pair`.
    fn list_actions(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, ActionRow>>;

    /// Release the connection. Called once by the driver on every exit path.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protein(id: &str, name: &str) -> ProteinRow {
        ProteinRow {
            id: id.into(),
            external_id: format!("9606.{name}"),
            preferred_name: name.into(),
            annotation: String::new(),
        }
    }

    #[test]
    fn test_pair_matches_name_case_insensitively() {
        let pair = ProteinPair::new("ccr5", "9606.CCL5");
        assert!(pair.names(&protein("1", "CCR5")));
        assert!(pair.names(&protein("2", "CCL5")));
        assert!(!pair.names(&protein("3", "IL10RA")));
    }

    #[test]
    fn test_pair_ids_connect_both_directions() {
        let proteins = [protein("1", "CCR5"), protein("2", "CCL5"), protein("3", "IL10RA")];
        let ids = PairIds::resolve(&ProteinPair::new("CCR5", "CCL5"), &proteins);
        assert!(ids.connects("1", "2"));
        assert!(ids.connects("2", "1"));
        assert!(!ids.connects("1", "3"));
        assert!(!ids.connects("1", "1"));
    }
}
