//! Column descriptors and entity schemas.

mod column;
mod entity;

pub use column::{ColumnDescriptor, ColumnKind};
pub use entity::{Entity, EntitySchema, UniqueKey, UpgradeScripts};
