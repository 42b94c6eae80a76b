//! # Property Graph Model
//!
//! DTOs for the labeled property graph the migration writes into.
//! These types cross every boundary: store ↔ write operations ↔ search ↔ export.
//!
//! This module is pure data — no I/O, no state, no async.

pub mod node;
pub mod relationship;
pub mod path;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId, Direction};
pub use path::Path;
pub use value::Value;
pub use property_map::{PropertyMap, props};
