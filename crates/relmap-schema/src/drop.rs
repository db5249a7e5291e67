//! DROP TABLE statement generation.

use crate::create::{create_order, junction_fields};
use relmap_core::{Command, Entity};
use std::sync::Arc;

/// Generate SQL to drop a table if it exists.
pub fn drop_table_sql(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table_name)
}

/// The commands that drop every table of a registration set.
///
/// Junction tables go first, then entity tables in the reverse of their
/// creation order, so a table is dropped before the tables it references.
pub fn drop_commands(entities: &[Arc<Entity>]) -> Vec<Command> {
    let ordered = create_order(entities);
    let junctions = junction_fields(&ordered)
        .into_iter()
        .filter_map(|(_, field)| field.assignment_table())
        .map(drop_table_sql);
    let tables = ordered.iter().rev().map(|e| drop_table_sql(e.table_name()));

    junctions.chain(tables).map(Command::new).collect()
}
