//! Relational source over a directory of tab-separated table dumps.
//!
//! ```text
//! <snapshot_dir>/species.tsv       id  name
//! <snapshot_dir>/proteins.tsv      id  species_id  external_id  preferred_name  annotation
//! <snapshot_dir>/associations.tsv  species_id  id1  id2  evidence_scores  combined_score
//! <snapshot_dir>/actions.tsv       species_id  id1  id2  mode  score
//! ```
//!
//! Every file has a header row. `evidence_scores` is a `channel:score` list
//! (`6:92;10:900`). Each query re-opens its file and streams it, so nothing
//! but the current row is held in memory.

use std::path::{Path, PathBuf};

use crate::records::ActionMode;
use crate::Result;
use super::relational::*;
use super::table::{read_table, ColumnType, FromRow, Row};

pub const SPECIES_TABLE: &str = "species.tsv";
pub const PROTEINS_TABLE: &str = "proteins.tsv";
pub const ASSOCIATIONS_TABLE: &str = "associations.tsv";
pub const ACTIONS_TABLE: &str = "actions.tsv";

// ============================================================================
// Table rows
// ============================================================================

struct SpeciesRecord {
    id: SpeciesId,
    name: String,
}

impl FromRow for SpeciesRecord {
    const COLUMNS: &'static [ColumnType] = &[ColumnType::Integer, ColumnType::Text];

    fn from_row(row: &mut Row) -> Result<Self> {
        Ok(Self { id: row.integer()?, name: row.text()? })
    }
}

struct ProteinRecord {
    species: SpeciesId,
    row: ProteinRow,
}

impl FromRow for ProteinRecord {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::Text, ColumnType::Integer, ColumnType::Text, ColumnType::Text, ColumnType::Text,
    ];

    fn from_row(row: &mut Row) -> Result<Self> {
        let id = row.text()?;
        let species = row.integer()?;
        Ok(Self {
            species,
            row: ProteinRow {
                id,
                external_id: row.text()?,
                preferred_name: row.text()?,
                annotation: row.text()?,
            },
        })
    }
}

struct AssociationRecord {
    species: SpeciesId,
    row: AssociationRow,
}

impl FromRow for AssociationRecord {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::Integer, ColumnType::Text, ColumnType::Text, ColumnType::ScoreList, ColumnType::Integer,
    ];

    fn from_row(row: &mut Row) -> Result<Self> {
        Ok(Self {
            species: row.integer()?,
            row: AssociationRow {
                id1: row.text()?,
                id2: row.text()?,
                evidence_scores: row.score_list()?,
                combined_score: row.integer()?,
            },
        })
    }
}

struct ActionRecord {
    species: SpeciesId,
    row: ActionRow,
}

impl FromRow for ActionRecord {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::Integer, ColumnType::Text, ColumnType::Text, ColumnType::Text, ColumnType::Integer,
    ];

    fn from_row(row: &mut Row) -> Result<Self> {
        let species = row.integer()?;
        let id1 = row.text()?;
        let id2 = row.text()?;
        let mode_text = row.text()?;
        let mode = mode_text.parse::<ActionMode>().map_err(|e| row.reject(e))?;
        Ok(Self {
            species,
            row: ActionRow { id1, id2, mode, score: row.integer()? },
        })
    }
}

// ============================================================================
// SnapshotSource
// ============================================================================

/// `RelationalSource` backed by TSV dumps of the relational tables.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    /// Point at a snapshot directory. Fails if the directory is missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(crate::Error::NotFound(format!("snapshot directory {}", dir.display())));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn pair_ids(&self, species: SpeciesId, pair: &ProteinPair) -> Result<PairIds> {
        let proteins = self
            .list_proteins(species, Some(pair))?
            .collect::<Result<Vec<_>>>()?;
        Ok(PairIds::resolve(pair, &proteins))
    }
}

impl RelationalSource for SnapshotSource {
    fn resolve_species(&self, name: &str) -> Result<Option<SpeciesId>> {
        let wanted = name.trim();
        for record in read_table::<SpeciesRecord>(&self.table(SPECIES_TABLE))? {
            let record = record?;
            if record.name.eq_ignore_ascii_case(wanted) {
                return Ok(Some(record.id));
            }
        }
        Ok(None)
    }

    fn list_proteins(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, ProteinRow>> {
        let pair = pair.cloned();
        let rows = read_table::<ProteinRecord>(&self.table(PROTEINS_TABLE))?;
        Ok(Box::new(rows.filter_map(move |record| match record {
            Err(e) => Some(Err(e)),
            Ok(r) if r.species == species && pair.as_ref().is_none_or(|p| p.names(&r.row)) => Some(Ok(r.row)),
            Ok(_) => None,
        })))
    }

    fn list_associations(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, AssociationRow>> {
        let ids = pair.map(|p| self.pair_ids(species, p)).transpose()?;
        let rows = read_table::<AssociationRecord>(&self.table(ASSOCIATIONS_TABLE))?;
        Ok(Box::new(rows.filter_map(move |record| match record {
            Err(e) => Some(Err(e)),
            Ok(r) if r.species == species
                && ids.as_ref().is_none_or(|ids| ids.connects(&r.row.id1, &r.row.id2)) => Some(Ok(r.row)),
            Ok(_) => None,
        })))
    }

    fn list_actions(&self, species: SpeciesId, pair: Option<&ProteinPair>) -> Result<RowIter<'_, ActionRow>> {
        let ids = pair.map(|p| self.pair_ids(species, p)).transpose()?;
        let rows = read_table::<ActionRecord>(&self.table(ACTIONS_TABLE))?;
        Ok(Box::new(rows.filter_map(move |record| match record {
            Err(e) => Some(Err(e)),
            Ok(r) if r.species == species
                && ids.as_ref().is_none_or(|ids| ids.connects(&r.row.id1, &r.row.id2)) => Some(Ok(r.row)),
            Ok(_) => None,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn snapshot() -> (tempfile::TempDir, SnapshotSource) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SPECIES_TABLE), "id\tname\n9606\tHomo sapiens\n10090\tMus musculus\n").unwrap();
        fs::write(
            dir.path().join(PROTEINS_TABLE),
            "id\tspecies_id\texternal_id\tpreferred_name\tannotation\n\
             1\t9606\t9606.ENSP00000292303\tCcr5\tC-C chemokine receptor type 5\n\
             2\t9606\t9606.ENSP00000293272\tCCL5\tC-C motif chemokine 5\n\
             3\t9606\t9606.ENSP00000227752\tIL10RA\tInterleukin-10 receptor subunit alpha\n\
             4\t10090\t10090.ENSMUSP00000107069\tCcr5\tmouse Ccr5\n",
        ).unwrap();
        fs::write(
            dir.path().join(ASSOCIATIONS_TABLE),
            "species_id\tid1\tid2\tevidence_scores\tcombined_score\n\
             9606\t1\t2\t6:92;10:900;12:906\t993\n\
             9606\t1\t3\t6:246;12:318\t469\n",
        ).unwrap();
        fs::write(
            dir.path().join(ACTIONS_TABLE),
            "species_id\tid1\tid2\tmode\tscore\n\
             9606\t2\t1\tbinding\t849\n\
             9606\t1\t3\tptmod\t171\n",
        ).unwrap();
        let source = SnapshotSource::open(dir.path()).unwrap();
        (dir, source)
    }

    #[test]
    fn test_resolve_species() {
        let (_dir, source) = snapshot();
        assert_eq!(source.resolve_species("homo sapiens").unwrap(), Some(9606));
        assert_eq!(source.resolve_species("Danio rerio").unwrap(), None);
    }

    #[test]
    fn test_list_proteins_by_species() {
        let (_dir, source) = snapshot();
        let proteins: Vec<ProteinRow> = source.list_proteins(9606, None).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(proteins.len(), 3);
        let mouse: Vec<ProteinRow> = source.list_proteins(10090, None).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(mouse.len(), 1);
    }

    #[test]
    fn test_pair_scoped_queries() {
        let (_dir, source) = snapshot();
        let pair = ProteinPair::new("CCR5", "CCL5");

        let proteins: Vec<ProteinRow> = source.list_proteins(9606, Some(&pair)).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(proteins.len(), 2);

        let assoc: Vec<AssociationRow> = source.list_associations(9606, Some(&pair)).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(assoc.len(), 1);
        assert_eq!(assoc[0].evidence_scores, vec![(6, 92), (10, 900), (12, 906)]);

        let actions: Vec<ActionRow> = source.list_actions(9606, Some(&pair)).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].mode, ActionMode::Binding);
    }

    #[test]
    fn test_unknown_action_mode_is_malformed() {
        let (dir, source) = snapshot();
        fs::write(
            dir.path().join(ACTIONS_TABLE),
            "species_id\tid1\tid2\tmode\tscore\n9606\t1\t2\tteleportation\t10\n",
        ).unwrap();

        let first = source.list_actions(9606, None).unwrap().next().unwrap();
        assert!(matches!(first, Err(crate::Error::MalformedRow { line: 2, .. })));
    }

    #[test]
    fn test_missing_directory() {
        assert!(SnapshotSource::open("/nonexistent/snapshot").is_err());
    }
}
