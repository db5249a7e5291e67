//! Schema creation and teardown for relmap.
//!
//! This crate provides:
//! - `CREATE TABLE IF NOT EXISTS` generation for entities and junction tables
//! - Dependency ordering so referenced tables are created first
//! - `DROP TABLE IF EXISTS` generation in the reverse order

pub mod create;
pub mod drop;

pub use create::{CreateJunctionTable, CreateTable, SchemaBuilder, create_order};
pub use drop::{drop_commands, drop_table_sql};

use relmap_core::{Command, Entity, Result};
use std::sync::Arc;

/// Create a table builder for one entity.
///
/// # Example
///
/// ```ignore
/// let entity = relmap_core::describe::<Book>()?;
/// let sql = relmap_schema::create_table(&entity).build()?;
/// ```
pub fn create_table(entity: &Entity) -> CreateTable<'_> {
    CreateTable::new(entity)
}

/// The commands that create every table of a registration set.
pub fn create_commands(entities: &[Arc<Entity>]) -> Result<Vec<Command>> {
    Ok(SchemaBuilder::new(entities)
        .build()?
        .into_iter()
        .map(Command::new)
        .collect())
}
