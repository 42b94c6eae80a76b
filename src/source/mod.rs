//! # Row Sources
//!
//! Everything the pipeline reads comes through here:
//!
//! | Module | Provides |
//! |--------|----------|
//! | `table` | Schema-checked, lazy reader over tab-separated files |
//! | `relational` | The `RelationalSource` contract and its row types |
//! | `snapshot` | `RelationalSource` over a directory of table dumps |
//! | `memory` | `RelationalSource` over in-memory rows |

pub mod table;
pub mod relational;
pub mod snapshot;
pub mod memory;

pub use table::{read_table, ColumnType, Field, FromRow, Row, TableReader};
pub use relational::{
    ActionRow, AssociationRow, PairIds, ProteinPair, ProteinRow, RelationalSource, RowIter, SpeciesId,
};
pub use snapshot::SnapshotSource;
pub use memory::MemorySource;
