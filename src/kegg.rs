//! KEGG reference tables: compounds, drugs, diseases and pathways.
//!
//! Each table is a tab-separated file with a header row, named
//! `kegg_<table>.<organism>.tsv` inside the KEGG data directory:
//!
//! | File | Columns |
//! |------|---------|
//! | `kegg_compounds` / `kegg_drugs` / `kegg_diseases` | id, name |
//! | `kegg_pathways` | id, name, description, classes, genes, diseases, drugs, compounds |
//!
//! List columns are `;`-separated; an empty cell is an empty list. Tables
//! load into [`IdTable`]s keyed by id, where a repeated id replaces the
//! earlier row but keeps its position.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::records::{label, ClassLink, NamedEntity, Pathway};
use crate::source::{read_table, ColumnType, FromRow, Row};
use crate::Result;

pub const PATHWAYS_TABLE: &str = "pathways";

/// Path of `kegg_<table>.<organism>.tsv` under `dir`.
pub fn table_path(dir: &Path, table: &str, organism: &str) -> PathBuf {
    dir.join(format!("kegg_{table}.{organism}.tsv"))
}

// ============================================================================
// IdTable
// ============================================================================

/// Id-keyed dictionary that iterates in first-insertion order.
#[derive(Debug, Clone)]
pub struct IdTable<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for IdTable<T> {
    fn default() -> Self {
        Self { entries: Vec::new(), index: HashMap::new() }
    }
}

impl<T> IdTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns true if `id` was new.
    pub fn insert(&mut self, id: String, value: T) -> bool {
        match self.index.get(&id) {
            Some(&i) => {
                self.entries[i].1 = value;
                false
            }
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, value));
                true
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<T: Default> IdTable<T> {
    /// The value under `id`, inserting a default one first if absent.
    pub fn get_or_default(&mut self, id: &str) -> &mut T {
        let i = match self.index.get(id) {
            Some(&i) => i,
            None => {
                self.index.insert(id.to_string(), self.entries.len());
                self.entries.push((id.to_string(), T::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }
}

impl<T> IntoIterator for IdTable<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ============================================================================
// Reference entities
// ============================================================================

/// The three `{id, name}` reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Compound,
    Drug,
    Disease,
}

impl ReferenceKind {
    /// Load order of the reference stage.
    pub const ALL: [ReferenceKind; 3] = [ReferenceKind::Compound, ReferenceKind::Disease, ReferenceKind::Drug];

    pub fn label(self) -> &'static str {
        match self {
            ReferenceKind::Compound => label::COMPOUND,
            ReferenceKind::Drug => label::DRUG,
            ReferenceKind::Disease => label::DISEASE,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            ReferenceKind::Compound => "compounds",
            ReferenceKind::Drug => "drugs",
            ReferenceKind::Disease => "diseases",
        }
    }

    /// Entry field that names the entity in a membership batch.
    pub fn id_field(self) -> &'static str {
        match self {
            ReferenceKind::Compound => "compound_id",
            ReferenceKind::Drug => "drug_id",
            ReferenceKind::Disease => "disease_id",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

impl FromRow for NamedEntity {
    const COLUMNS: &'static [ColumnType] = &[ColumnType::Text, ColumnType::Text];

    fn from_row(row: &mut Row) -> Result<Self> {
        Ok(Self { id: row.text()?, name: row.text()? })
    }
}

/// Read one reference table into an id-keyed dictionary.
pub fn load_reference(dir: &Path, organism: &str, kind: ReferenceKind) -> Result<IdTable<NamedEntity>> {
    let path = table_path(dir, kind.table(), organism);
    let mut table = IdTable::new();
    for entity in read_table::<NamedEntity>(&path)? {
        let entity = entity?;
        table.insert(entity.id.clone(), entity);
    }
    debug!(table = %kind, rows = table.len(), path = %path.display(), "loaded reference table");
    Ok(table)
}

// ============================================================================
// Pathways
// ============================================================================

/// One row of the pathway table.
///
/// `classes` runs from the broadest class to the pathway's immediate class
/// (`Organismal Systems;Immune system`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathwayRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub classes: Vec<String>,
    pub genes: Vec<String>,
    pub diseases: Vec<String>,
    pub drugs: Vec<String>,
    pub compounds: Vec<String>,
}

impl FromRow for PathwayRow {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::Text,
        ColumnType::Text,
        ColumnType::Text,
        ColumnType::TextList,
        ColumnType::TextList,
        ColumnType::TextList,
        ColumnType::TextList,
        ColumnType::TextList,
    ];

    fn from_row(row: &mut Row) -> Result<Self> {
        Ok(Self {
            id: row.text()?,
            name: row.text()?,
            description: row.text()?,
            classes: row.text_list()?,
            genes: row.text_list()?,
            diseases: row.text_list()?,
            drugs: row.text_list()?,
            compounds: row.text_list()?,
        })
    }
}

impl PathwayRow {
    pub fn pathway(&self) -> Pathway {
        Pathway {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    /// The class the pathway is directly `IN`.
    pub fn immediate_class(&self) -> Option<&str> {
        self.classes.last().map(String::as_str)
    }

    /// Child → parent links along the class path.
    pub fn class_links(&self) -> impl Iterator<Item = ClassLink> + '_ {
        self.classes.windows(2).map(|pair| ClassLink {
            child: pair[1].clone(),
            parent: pair[0].clone(),
        })
    }

    /// Reference ids of one kind that the pathway names.
    pub fn references(&self, kind: ReferenceKind) -> &[String] {
        match kind {
            ReferenceKind::Compound => &self.compounds,
            ReferenceKind::Drug => &self.drugs,
            ReferenceKind::Disease => &self.diseases,
        }
    }
}

/// Pathway ids per gene external id.
pub type GenePathways = IdTable<SmallVec<[String; 4]>>;

/// The pathway table plus its gene → pathways inversion.
#[derive(Debug, Clone, Default)]
pub struct PathwayCatalog {
    pub pathways: IdTable<PathwayRow>,
    pub gene_pathways: GenePathways,
}

impl PathwayCatalog {
    pub fn insert(&mut self, row: PathwayRow) {
        for gene in &row.genes {
            let ids = self.gene_pathways.get_or_default(gene);
            if !ids.contains(&row.id) {
                ids.push(row.id.clone());
            }
        }
        self.pathways.insert(row.id.clone(), row);
    }

    pub fn len(&self) -> usize {
        self.pathways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pathways.is_empty()
    }
}

/// Read the pathway table of `organism`.
pub fn load_pathways(dir: &Path, organism: &str) -> Result<PathwayCatalog> {
    let path = table_path(dir, PATHWAYS_TABLE, organism);
    let mut catalog = PathwayCatalog::default();
    for row in read_table::<PathwayRow>(&path)? {
        catalog.insert(row?);
    }
    debug!(
        pathways = catalog.len(),
        genes = catalog.gene_pathways.len(),
        path = %path.display(),
        "loaded pathway table"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const PATHWAYS: &str = "id\tname\tdescription\tclasses\tgenes\tdiseases\tdrugs\tcompounds\n\
        path:mmu04062\tChemokine signaling pathway\tChemokines recruit leukocytes.\tOrganismal Systems;Immune system\t10090.ENSMUSP00000107069;10090.ENSMUSP00000034231\t\t\tC00076\n\
        path:mmu00010\tGlycolysis / Gluconeogenesis\tSugar breakdown.\tMetabolism;Carbohydrate metabolism\t10090.ENSMUSP00000107069\tH00069\tD00001;D00002\tC00031\n";

    #[test]
    fn test_id_table_last_write_wins_in_place() {
        let mut table = IdTable::new();
        assert!(table.insert("C1".to_string(), "first"));
        assert!(table.insert("C2".to_string(), "second"));
        assert!(!table.insert("C1".to_string(), "replaced"));

        let order: Vec<_> = table.iter().collect();
        assert_eq!(order, vec![("C1", &"replaced"), ("C2", &"second")]);
    }

    #[test]
    fn test_load_reference() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            table_path(dir.path(), "drugs", "mmu"),
            "id\tname\nD00001\tWater\nD00002\tAspirin\nD00001\tWater (JP18)\n",
        ).unwrap();

        let drugs = load_reference(dir.path(), "mmu", ReferenceKind::Drug).unwrap();
        assert_eq!(drugs.len(), 2);
        assert_eq!(drugs.get("D00001").unwrap().name, "Water (JP18)");
    }

    #[test]
    fn test_load_pathways_and_gene_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(table_path(dir.path(), PATHWAYS_TABLE, "mmu"), PATHWAYS).unwrap();

        let catalog = load_pathways(dir.path(), "mmu").unwrap();
        assert_eq!(catalog.len(), 2);

        let chemokine = catalog.pathways.get("path:mmu04062").unwrap();
        assert_eq!(chemokine.immediate_class(), Some("Immune system"));
        assert!(chemokine.diseases.is_empty());
        assert_eq!(chemokine.references(ReferenceKind::Compound), ["C00076".to_string()]);

        let links: Vec<ClassLink> = chemokine.class_links().collect();
        assert_eq!(links, vec![ClassLink {
            child: "Immune system".into(),
            parent: "Organismal Systems".into(),
        }]);

        let ccr5 = catalog.gene_pathways.get("10090.ENSMUSP00000107069").unwrap();
        assert_eq!(ccr5.as_slice(), ["path:mmu04062".to_string(), "path:mmu00010".to_string()]);
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_pathways(dir.path(), "hsa").unwrap_err();
        assert!(matches!(err, crate::Error::NotFound(_)));
    }
}
