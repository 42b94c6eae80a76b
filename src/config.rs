//! Run configuration.
//!
//! The binary reads one JSON credentials file:
//!
//! ```json
//! {
//!   "relational": { "snapshot_dir": "db/snapshot" },
//!   "graph": { "dump_path": "graph.cypher", "max_batch_size": 4096 },
//!   "migration": { "kegg_dir": "KEGG/data", "flags": { "timing": true } }
//! }
//! ```
//!
//! Everything under `migration` is optional and defaults to
//! [`MigrationConfig::default`].

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_ENTITY_BATCH: NonZeroUsize = NonZeroUsize::new(1024).unwrap();
pub const DEFAULT_EDGE_BATCH: NonZeroUsize = NonZeroUsize::new(16384).unwrap();
pub const DEFAULT_DEV_MAX_RELATIONSHIPS: usize = 10_000;

// ============================================================================
// Credentials
// ============================================================================

/// Connection settings for both sides of the migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub relational: RelationalCredentials,
    pub graph: GraphCredentials,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalCredentials {
    /// Directory of table dumps read by `SnapshotSource`.
    pub snapshot_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphCredentials {
    /// Where the loaded graph is written as a Cypher script.
    pub dump_path: PathBuf,
    /// Upper bound on any batch sent to the store.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// MigrationConfig
// ============================================================================

/// Settings the migration driver is constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory holding the `kegg_*.<organism>.tsv` tables.
    pub kegg_dir: PathBuf,
    /// KEGG organism code (`hsa`, `mmu`, ...).
    pub organism: String,
    pub batch_sizes: BatchSizes,
    pub flags: RunFlags,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            kegg_dir: PathBuf::from("KEGG/data"),
            organism: "hsa".to_string(),
            batch_sizes: BatchSizes::default(),
            flags: RunFlags::default(),
        }
    }
}

impl MigrationConfig {
    pub fn with_kegg_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kegg_dir = dir.into();
        self
    }

    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = organism.into();
        self
    }

    pub fn with_flags(mut self, flags: RunFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Records per bulk request, per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSizes {
    pub reference: NonZeroUsize,
    pub protein: NonZeroUsize,
    pub association: NonZeroUsize,
    pub action: NonZeroUsize,
    pub pathway: NonZeroUsize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            reference: DEFAULT_ENTITY_BATCH,
            protein: DEFAULT_ENTITY_BATCH,
            association: DEFAULT_EDGE_BATCH,
            action: DEFAULT_EDGE_BATCH,
            pathway: DEFAULT_ENTITY_BATCH,
        }
    }
}

impl BatchSizes {
    /// Every size set to `n`.
    pub fn uniform(n: NonZeroUsize) -> Self {
        Self { reference: n, protein: n, association: n, action: n, pathway: n }
    }

    /// Cap every size at `max`, if given.
    pub fn clamped(self, max: Option<NonZeroUsize>) -> Self {
        let Some(max) = max else { return self };
        Self {
            reference: self.reference.min(max),
            protein: self.protein.min(max),
            association: self.association.min(max),
            action: self.action.min(max),
            pathway: self.pathway.min(max),
        }
    }
}

/// Behavior switches for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunFlags {
    /// Log the duration of each stage.
    pub timing: bool,
    /// Suppress per-batch progress lines.
    pub silent: bool,
    /// When false, association and action streams are cut at
    /// `dev_max_relationships` rows each.
    pub production: bool,
    pub dev_max_relationships: usize,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            timing: false,
            silent: false,
            production: true,
            dev_max_relationships: DEFAULT_DEV_MAX_RELATIONSHIPS,
        }
    }
}

impl RunFlags {
    /// Cap on protein–protein edges read per stream.
    pub fn relationship_limit(&self) -> Option<usize> {
        (!self.production).then_some(self.dev_max_relationships)
    }
}
