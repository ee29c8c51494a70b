//! Domain layer: entities and genogram logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod layout;
pub mod relations;
pub mod union;

pub use arena::{GenoNode, GenogramArena, NodeKind, VIRTUAL_ROOT_LABEL};
pub use builder::{build_genogram, Diagnostic, Genogram, SpouseMap};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use layout::{layout, Edge, Layout, LayoutParams, Margin, PlacedKind, PlacedNode};
pub use relations::{apply_relation, unlink, Relation};
pub use union::UnionKey;
