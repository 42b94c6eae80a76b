//! # Migration Driver
//!
//! Runs one migration from a [`RelationalSource`] and the KEGG tables into a
//! [`GraphStore`], in dependency order:
//!
//! ```text
//! Init ─► LoadReferenceEntities ─► IndexReference ─┬─► SpeciesMode ─┬─► LoadMembership ─► Done
//!                                                  └─► PairMode ────┘
//!   any state ─► Aborted
//! ```
//!
//! | State | Work |
//! |-------|------|
//! | `Init` | resolve the species; in species mode wipe the graph |
//! | `LoadReferenceEntities` | Compound, Disease, Drug nodes |
//! | `IndexReference` | indexes on reference, pathway and class keys |
//! | `SpeciesMode` | all proteins, associations and actions of the species |
//! | `PairMode` | proteins and edges of each requested protein pair |
//! | `LoadMembership` | class hierarchy, pathways, every `IN` edge |
//!
//! Each stage awaits every batch before reading the next, so at most one
//! batch of rows is in flight. The relational source is closed on every
//! exit path; the graph store is borrowed and left to the caller.

use std::num::NonZeroUsize;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::batch::batches;
use crate::config::{BatchSizes, MigrationConfig, RunFlags};
use crate::kegg::{self, PathwayCatalog, ReferenceKind};
use crate::model::PropertyMap;
use crate::records::{label, Action, Association, IntoProperties, Protein, CHILD_FIELD, PARENT_FIELD};
use crate::source::{ProteinPair, RelationalSource, RowIter, SpeciesId};
use crate::storage::GraphStore;
use crate::write::{self, ClassRegistry, MatchField, MatchFields, WriteSummary};
use crate::{Error, Result};

/// Indexes declared before any protein is written.
pub const REFERENCE_INDEXES: [(&str, &str); 6] = [
    (label::COMPOUND, "id"),
    (label::DRUG, "id"),
    (label::DISEASE, "id"),
    (label::PATHWAY, "id"),
    (label::PATHWAY, "name"),
    (label::CLASS, "name"),
];

pub const PROTEIN_INDEXES: [(&str, &str); 3] = [
    (label::PROTEIN, "id"),
    (label::PROTEIN, "external_id"),
    (label::PROTEIN, "name"),
];

const PATHWAY_ID: MatchField = MatchField::new("pathway_id", "id");
const PATHWAY_CLASS: MatchFields = MatchFields::new(PATHWAY_ID, MatchField::new("class_name", "name"));
const PROTEIN_PATHWAY: MatchFields = MatchFields::new(MatchField::new("protein_external_id", "external_id"), PATHWAY_ID);

fn reference_pathway(kind: ReferenceKind) -> MatchFields {
    MatchFields::new(MatchField::new(kind.id_field(), "id"), PATHWAY_ID)
}

// ============================================================================
// State and input
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MigrationState {
    Init,
    LoadReferenceEntities,
    IndexReference,
    SpeciesMode,
    PairMode,
    LoadMembership,
    Done,
    Aborted,
}

/// What the stdin lines after the species ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Every protein of the species; the graph is replaced.
    Species,
    /// Only the listed protein pairs; the graph is extended.
    Pairs(Vec<ProteinPair>),
}

/// Parsed process input: species on line 1, optional protein identifiers after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInput {
    pub species: String,
    pub mode: RunMode,
    /// Trailing identifier left over from an odd protein count.
    pub unpaired: Option<String>,
}

impl MigrationInput {
    /// Blank lines are dropped. One line selects species mode, three or more
    /// select pair mode; anything else is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let Some((species, proteins)) = lines.split_first() else {
            return Err(Error::MalformedInput("expected a species name on the first line".into()));
        };
        if proteins.len() == 1 {
            return Err(Error::MalformedInput(
                "expected a species name, optionally followed by at least two proteins".into(),
            ));
        }
        if proteins.is_empty() {
            return Ok(Self::species(*species));
        }

        let pairs = proteins
            .chunks_exact(2)
            .map(|pair| ProteinPair::new(pair[0], pair[1]))
            .collect();
        let unpaired = (proteins.len() % 2 == 1).then(|| proteins[proteins.len() - 1].to_string());
        Ok(Self { species: species.to_string(), mode: RunMode::Pairs(pairs), unpaired })
    }

    pub fn species(name: impl Into<String>) -> Self {
        Self { species: name.into(), mode: RunMode::Species, unpaired: None }
    }

    pub fn pairs(name: impl Into<String>, pairs: Vec<ProteinPair>) -> Self {
        Self { species: name.into(), mode: RunMode::Pairs(pairs), unpaired: None }
    }

    pub fn is_species_mode(&self) -> bool {
        matches!(self.mode, RunMode::Species)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: MigrationState,
    /// Source rows read by the stage.
    pub records: u64,
    pub summary: WriteSummary,
    pub elapsed_ms: u64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub species: String,
    pub species_id: SpeciesId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub totals: WriteSummary,
}

impl MigrationReport {
    pub fn stage(&self, stage: MigrationState) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

struct StageRun {
    report: StageReport,
    started: Instant,
}

impl StageRun {
    fn begin(stage: MigrationState) -> Self {
        Self {
            report: StageReport { stage, records: 0, summary: WriteSummary::default(), elapsed_ms: 0 },
            started: Instant::now(),
        }
    }

    fn finish(mut self, flags: RunFlags) -> StageReport {
        self.report.elapsed_ms = self.started.elapsed().as_millis() as u64;
        if flags.timing {
            info!(stage = ?self.report.stage, elapsed_ms = self.report.elapsed_ms, "stage finished");
        }
        self.report
    }
}

/// Running count of records written by one stream.
struct Progress {
    what: &'static str,
    written: u64,
    silent: bool,
}

impl Progress {
    fn new(what: &'static str, flags: RunFlags) -> Self {
        info!("Writing {what}...");
        Self { what, written: 0, silent: flags.silent }
    }

    fn advance(&mut self, n: usize) {
        self.written += n as u64;
        if !self.silent {
            info!(what = self.what, written = self.written, "progress");
        }
    }

    fn finish(self) -> u64 {
        info!(what = self.what, total = self.written, "written");
        self.written
    }
}

/// Collect one batch of fallible rows into write entries.
fn entries<T, U>(batch: Vec<Result<U>>) -> Result<Vec<PropertyMap>>
where
    U: Into<T>,
    T: IntoProperties,
{
    batch
        .into_iter()
        .map(|row| row.map(|r| r.into().into_properties()))
        .collect()
}

// ============================================================================
// Migrator
// ============================================================================

/// Drives one migration run against a borrowed store and an owned source.
pub struct Migrator<'a, S: GraphStore + ?Sized, R: RelationalSource> {
    store: &'a S,
    source: R,
    config: MigrationConfig,
    sizes: BatchSizes,
    state: MigrationState,
}

impl<'a, S: GraphStore + ?Sized, R: RelationalSource> Migrator<'a, S, R> {
    /// Batch sizes are capped at the store's advertised maximum.
    pub fn new(store: &'a S, source: R, config: MigrationConfig) -> Self {
        let store_max = store.capabilities().max_batch_size.and_then(NonZeroUsize::new);
        let sizes = config.batch_sizes.clamped(store_max);
        Self { store, source, config, sizes, state: MigrationState::Init }
    }

    /// Further cap every batch size.
    pub fn with_batch_limit(mut self, max: Option<NonZeroUsize>) -> Self {
        self.sizes = self.sizes.clamped(max);
        self
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    pub fn batch_sizes(&self) -> BatchSizes {
        self.sizes
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn into_source(self) -> R {
        self.source
    }

    fn enter(&mut self, state: MigrationState) {
        info!(from = ?self.state, to = ?state, "migration state");
        self.state = state;
    }

    fn flags(&self) -> RunFlags {
        self.config.flags
    }

    /// Run the migration to completion. On error the state is `Aborted` and
    /// writes already applied stay in the store.
    pub async fn run(&mut self, input: &MigrationInput) -> Result<MigrationReport> {
        let result = self.execute(input).await;
        let closed = self.source.close();

        match result {
            Ok(report) => {
                closed?;
                self.enter(MigrationState::Done);
                info!(
                    nodes = report.totals.nodes_created,
                    relationships = report.totals.relationships_created,
                    "Done!"
                );
                Ok(report)
            }
            Err(e) => {
                error!(state = ?self.state, error = %e, "migration aborted");
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "closing the relational source failed");
                }
                self.state = MigrationState::Aborted;
                Err(e)
            }
        }
    }

    async fn execute(&mut self, input: &MigrationInput) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let mut stages = Vec::new();

        // Init
        self.enter(MigrationState::Init);
        let species_id = self
            .source
            .resolve_species(&input.species)?
            .ok_or_else(|| Error::SpeciesNotFound(input.species.clone()))?;
        info!(species = %input.species, species_id, "species resolved");

        if input.is_species_mode() {
            info!("Cleaning the old data from the graph...");
            self.store.delete_all().await?;
        }
        if let Some(protein) = &input.unpaired {
            warn!(protein = %protein, "odd number of proteins; last one ignored");
        }

        // Pair mode merges reference entities by key, so the keys are
        // indexed before the first lookup. A fresh load indexes afterwards.
        if !input.is_species_mode() {
            self.declare_indexes(&REFERENCE_INDEXES).await?;
        }

        self.enter(MigrationState::LoadReferenceEntities);
        stages.push(self.load_reference_entities(input.is_species_mode()).await?);

        self.enter(MigrationState::IndexReference);
        if input.is_species_mode() {
            self.declare_indexes(&REFERENCE_INDEXES).await?;
        }

        match &input.mode {
            RunMode::Species => {
                self.enter(MigrationState::SpeciesMode);
                stages.push(self.load_species(species_id).await?);
            }
            RunMode::Pairs(pairs) => {
                self.enter(MigrationState::PairMode);
                stages.push(self.load_pairs(species_id, pairs).await?);
            }
        }

        self.enter(MigrationState::LoadMembership);
        stages.push(self.load_membership(input.is_species_mode()).await?);

        let mut totals = WriteSummary::default();
        for stage in &stages {
            totals += stage.summary;
        }
        Ok(MigrationReport {
            species: input.species.clone(),
            species_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            totals,
        })
    }

    // ========================================================================
    // Stages
    // ========================================================================

    async fn declare_indexes(&self, indexes: &[(&str, &str)]) -> Result<()> {
        for (label, field) in indexes {
            write::create_index(self.store, label, field).await?;
        }
        Ok(())
    }

    async fn load_reference_entities(&self, fresh: bool) -> Result<StageReport> {
        let mut stage = StageRun::begin(MigrationState::LoadReferenceEntities);

        for kind in ReferenceKind::ALL {
            let table = kegg::load_reference(&self.config.kegg_dir, &self.config.organism, kind)?;
            stage.report.records += table.len() as u64;

            let mut progress = Progress::new(kind.table(), self.flags());
            let rows = table.into_iter().map(|(_, entity)| entity.into_properties());
            for batch in batches(rows, self.sizes.reference) {
                progress.advance(batch.len());
                stage.report.summary += if fresh {
                    write::create_entity(self.store, kind.label(), batch).await?
                } else {
                    write::merge_entity(self.store, kind.label(), "id", batch).await?
                };
            }
            progress.finish();
        }

        Ok(stage.finish(self.flags()))
    }

    /// Cut a relationship stream short outside production runs.
    fn limited<'s, T: 's>(&self, rows: RowIter<'s, T>) -> RowIter<'s, T> {
        match self.flags().relationship_limit() {
            Some(limit) => Box::new(rows.take(limit)),
            None => rows,
        }
    }

    async fn load_species(&self, species: SpeciesId) -> Result<StageReport> {
        let mut stage = StageRun::begin(MigrationState::SpeciesMode);
        let store = self.store;

        let mut progress = Progress::new("proteins", self.flags());
        for batch in batches(self.source.list_proteins(species, None)?, self.sizes.protein) {
            let batch = entries::<Protein, _>(batch)?;
            progress.advance(batch.len());
            stage.report.summary += write::create_entity(store, label::PROTEIN, batch).await?;
        }
        stage.report.records += progress.finish();

        self.declare_indexes(&PROTEIN_INDEXES).await?;

        let mut progress = Progress::new("associations", self.flags());
        let rows = self.limited(self.source.list_associations(species, None)?);
        for batch in batches(rows, self.sizes.association) {
            let batch = entries::<Association, _>(batch)?;
            progress.advance(batch.len());
            stage.report.summary += write::create_plain_edge(store, batch).await?;
        }
        stage.report.records += progress.finish();

        let mut progress = Progress::new("actions", self.flags());
        let rows = self.limited(self.source.list_actions(species, None)?);
        for batch in batches(rows, self.sizes.action) {
            let batch = entries::<Action, _>(batch)?;
            progress.advance(batch.len());
            stage.report.summary += write::merge_scored_edge(store, batch).await?;
        }
        stage.report.records += progress.finish();

        Ok(stage.finish(self.flags()))
    }

    /// Pair mode writes one record per request and merges proteins, so
    /// overlapping pairs and repeated runs never duplicate a protein.
    async fn load_pairs(&self, species: SpeciesId, pairs: &[ProteinPair]) -> Result<StageReport> {
        let mut stage = StageRun::begin(MigrationState::PairMode);
        let store = self.store;

        self.declare_indexes(&PROTEIN_INDEXES).await?;

        for pair in pairs {
            info!("{pair}");

            let mut progress = Progress::new("proteins", self.flags());
            for row in self.source.list_proteins(species, Some(pair))? {
                let entry = Protein::from(row?).into_properties();
                stage.report.summary += write::merge_entity(store, label::PROTEIN, "id", vec![entry]).await?;
                progress.advance(1);
            }
            stage.report.records += progress.finish();

            let mut progress = Progress::new("associations", self.flags());
            for row in self.source.list_associations(species, Some(pair))? {
                let entry = Association::from(row?).into_properties();
                stage.report.summary += write::create_plain_edge(store, vec![entry]).await?;
                progress.advance(1);
            }
            stage.report.records += progress.finish();

            let mut progress = Progress::new("actions", self.flags());
            for row in self.source.list_actions(species, Some(pair))? {
                let entry = Action::from(row?).into_properties();
                stage.report.summary += write::merge_scored_edge(store, vec![entry]).await?;
                progress.advance(1);
            }
            stage.report.records += progress.finish();
        }

        Ok(stage.finish(self.flags()))
    }

    async fn load_membership(&self, fresh: bool) -> Result<StageReport> {
        let mut stage = StageRun::begin(MigrationState::LoadMembership);
        let store = self.store;
        let size = self.sizes.pathway;
        let catalog: PathwayCatalog = kegg::load_pathways(&self.config.kegg_dir, &self.config.organism)?;
        stage.report.records = catalog.len() as u64;

        // Class hierarchy, then any immediate class with no parent link.
        let mut classes = ClassRegistry::new();
        let links = catalog
            .pathways
            .values()
            .flat_map(|p| p.class_links())
            .map(IntoProperties::into_properties);
        for batch in batches(links, size) {
            stage.report.summary +=
                write::merge_hierarchy_edge(store, &mut classes, batch, PARENT_FIELD, CHILD_FIELD).await?;
        }
        for class in catalog.pathways.values().filter_map(|p| p.immediate_class()) {
            if classes.get(class).is_none() {
                classes.merge(store, class, &mut stage.report.summary).await?;
            }
        }

        let mut progress = Progress::new("pathways", self.flags());
        let pathways = catalog.pathways.values().map(|p| p.pathway().into_properties());
        for batch in batches(pathways, size) {
            progress.advance(batch.len());
            stage.report.summary += if fresh {
                write::create_entity(store, label::PATHWAY, batch).await?
            } else {
                write::merge_entity(store, label::PATHWAY, "id", batch).await?
            };
        }
        progress.finish();

        let in_class = catalog
            .pathways
            .values()
            .filter_map(|p| p.immediate_class().map(|class| PATHWAY_CLASS.entry(&p.id, class)));
        for batch in batches(in_class, size) {
            stage.report.summary +=
                write::create_membership_edge(store, label::PATHWAY, label::CLASS, batch, PATHWAY_CLASS).await?;
        }

        for kind in ReferenceKind::ALL {
            let fields = reference_pathway(kind);
            let links = catalog.pathways.values().flat_map(|p| {
                p.references(kind).iter().map(move |id| fields.entry(id, &p.id))
            });
            for batch in batches(links, size) {
                stage.report.summary +=
                    write::create_membership_edge(store, kind.label(), label::PATHWAY, batch, fields).await?;
            }
        }

        let mut progress = Progress::new("protein pathways", self.flags());
        let genes = catalog.gene_pathways.iter().flat_map(|(gene, ids)| {
            ids.iter().map(move |id| PROTEIN_PATHWAY.entry(gene, id))
        });
        for batch in batches(genes, size) {
            progress.advance(batch.len());
            stage.report.summary +=
                write::create_membership_edge(store, label::PROTEIN, label::PATHWAY, batch, PROTEIN_PATHWAY).await?;
        }
        progress.finish();

        Ok(stage.finish(self.flags()))
    }
}
