//! In-memory relational source, for tests and embedding.

use crate::evidence::Score;
use crate::records::ActionMode;
use crate::Result;
use super::relational::*;

/// Rows held in vectors, filtered on each query the way the SQL would.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    species: Vec<(SpeciesId, String)>,
    proteins: Vec<(SpeciesId, ProteinRow)>,
    associations: Vec<(SpeciesId, AssociationRow)>,
    actions: Vec<(SpeciesId, ActionRow)>,
    closed: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_species(mut self, id: SpeciesId, name: impl Into<String>) -> Self {
        self.species.push((id, name.into()));
        self
    }

    pub fn with_protein(
        mut self,
        species: SpeciesId,
        id: impl Into<String>,
        external_id: impl Into<String>,
        preferred_name: impl Into<String>,
        annotation: impl Into<String>,
    ) -> Self {
        self.proteins.push((species, ProteinRow {
            id: id.into(),
            external_id: external_id.into(),
            preferred_name: preferred_name.into(),
            annotation: annotation.into(),
        }));
        self
    }

    pub fn with_association(
        mut self,
        species: SpeciesId,
        id1: impl Into<String>,
        id2: impl Into<String>,
        evidence_scores: impl IntoIterator<Item = (i64, Score)>,
        combined_score: Score,
    ) -> Self {
        self.associations.push((species, AssociationRow {
            id1: id1.into(),
            id2: id2.into(),
            evidence_scores: evidence_scores.into_iter().collect(),
            combined_score,
        }));
        self
    }

    pub fn with_action(
        mut self,
        species: SpeciesId,
        id1: impl Into<String>,
        id2: impl Into<String>,
        mode: ActionMode,
        score: Score,
    ) -> Self {
        self.actions.push((species, ActionRow {
            id1: id1.into(),
            id2: id2.into(),
            mode,
            score,
        }));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn pair_ids(&self, species: SpeciesId, pair: &ProteinPair) -> PairIds {
        PairIds::resolve(
            pair,
            self.proteins.iter().filter(|(s, _)| *s == species).map(|(_, p)| p),
        )
    }
}

impl RelationalSource for MemorySource {
    fn resolve_species(&self, name: &str) -> Result<Option<SpeciesId>> {
        Ok(self.species
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(id, _)| *id))
    }

    fn list_proteins(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, ProteinRow>> {
        let pair = pair.cloned();
        Ok(Box::new(
            self.proteins
                .iter()
                .filter(move |(s, p)| *s == species && pair.as_ref().is_none_or(|pair| pair.names(p)))
                .map(|(_, p)| Ok(p.clone())),
        ))
    }

    fn list_associations(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, AssociationRow>> {
        let ids = pair.map(|pair| self.pair_ids(species, pair));
        Ok(Box::new(
            self.associations
                .iter()
                .filter(move |(s, a)| *s == species && ids.as_ref().is_none_or(|ids| ids.connects(&a.id1, &a.id2)))
                .map(|(_, a)| Ok(a.clone())),
        ))
    }

    fn list_actions(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, ActionRow>> {
        let ids = pair.map(|pair| self.pair_ids(species, pair));
        Ok(Box::new(
            self.actions
                .iter()
                .filter(move |(s, a)| *s == species && ids.as_ref().is_none_or(|ids| ids.connects(&a.id1, &a.id2)))
                .map(|(_, a)| Ok(a.clone())),
        ))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
