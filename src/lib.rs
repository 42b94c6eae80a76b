//! # protein-graph — relational snapshot → property graph
//!
//! Translates a protein-interaction and pathway dataset (proteins,
//! associations, actions, pathways, compounds, drugs, diseases and the
//! pathway class hierarchy) from flat relational rows into a labeled
//! property graph.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the pipeline and
//!    the graph, `RelationalSource` the contract with the row producer
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross all boundaries
//! 3. **Batch-first writes**: every write operation takes one batch and
//!    submits it through the store's bulk path
//! 4. **Streaming reads**: rows are iterated, never collected wholesale
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use protein_graph::{MemoryBackend, MemorySource, MigrationConfig, MigrationInput, Migrator};
//!
//! # async fn example() -> protein_graph::Result<()> {
//! let store = MemoryBackend::new();
//! let source = MemorySource::new().with_species(9606, "Homo sapiens");
//! let input = MigrationInput::parse("Homo sapiens\n")?;
//!
//! let report = Migrator::new(&store, source, MigrationConfig::default())
//!     .run(&input)
//!     .await?;
//! println!("{} nodes created", report.totals.nodes_created);
//! # Ok(())
//! # }
//! ```
//!
//! ## Load order
//!
//! | Stage | Writes |
//! |-------|--------|
//! | reference entities | Compound, Drug, Disease |
//! | species / pairs | Protein, ASSOCIATION, ACTION |
//! | membership | Class, Pathway, IN |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod index;
pub mod source;
pub mod evidence;
pub mod batch;
pub mod records;
pub mod write;
pub mod kegg;
pub mod search;
pub mod migrate;
pub mod config;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Path, Value, PropertyMap,
    NodeId, RelId, Direction,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, MemoryBackend, StoreCapabilities};
pub use index::IndexSpec;

// ============================================================================
// Re-exports: Pipeline
// ============================================================================

pub use source::{RelationalSource, MemorySource, SnapshotSource, ProteinPair, SpeciesId};
pub use evidence::EvidenceScores;
pub use batch::batches;
pub use records::ActionMode;
pub use write::WriteSummary;
pub use migrate::{Migrator, MigrationInput, MigrationReport, MigrationState, RunMode};
pub use config::{Credentials, MigrationConfig, RunFlags, BatchSizes};
pub use search::{search_protein, search_pathway, search_class};
pub use export::{export_cypher_dump, DumpMode};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Species not found: {0}")]
    SpeciesNotFound(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Malformed row in {table} at line {line}: {reason}")]
    MalformedRow { table: String, line: usize, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
