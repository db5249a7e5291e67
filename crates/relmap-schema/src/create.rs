//! CREATE TABLE statement builders.

use relmap_core::{Entity, Error, Field, Result, describe_type};
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for the CREATE TABLE statement of one entity.
///
/// Only the entity's own columns are listed: the primary key plus every
/// non-inherited internal field. A derived entity's key also references the
/// parent table's key with cascade-on-delete.
#[derive(Debug)]
pub struct CreateTable<'a> {
    entity: &'a Entity,
}

impl<'a> CreateTable<'a> {
    pub fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    /// Build the CREATE TABLE SQL.
    pub fn build(&self) -> Result<String> {
        let entity = self.entity;
        let key = entity.primary_key();

        let mut column_defs = vec![column_definition(key)?];
        let own: Vec<&Field> = entity
            .own_internals()
            .filter(|f| !f.is_primary_key())
            .collect();
        for field in &own {
            column_defs.push(column_definition(field)?);
        }

        let mut constraints = Vec::new();
        if let Some(base) = entity.parent_entity()? {
            constraints.push(format!(
                "CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                entity.table_name(),
                base.primary_key().column_name(),
                key.column_name(),
                base.table_name(),
                base.primary_key().column_name()
            ));
        }

        for field in own.iter().filter(|f| f.is_foreign_key()) {
            let Some(target) = field.target() else {
                continue;
            };
            let target = describe_type(target)?;
            constraints.push(format!(
                "CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                entity.table_name(),
                field.column_name(),
                field.column_name(),
                target.table_name(),
                target.primary_key().column_name(),
                field.on_delete().as_sql()
            ));
        }

        let all_parts: Vec<_> = column_defs.into_iter().chain(constraints).collect();
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            entity.table_name(),
            all_parts.join(",\n  ")
        ))
    }
}

fn column_definition(field: &Field) -> Result<String> {
    let mut def = format!("{} {}", field.column_name(), field.ddl_type()?);

    if field.is_primary_key() {
        def.push_str(" PRIMARY KEY NOT NULL");
    } else {
        if !field.is_nullable() {
            def.push_str(" NOT NULL");
        }
        if field.is_unique() {
            def.push_str(" UNIQUE");
        }
    }

    Ok(def)
}

/// Builder for the junction table behind a many-to-many field.
///
/// The near column references the owning entity and the remote column the
/// target entity; together they form the primary key, and both sides
/// cascade on delete.
#[derive(Debug)]
pub struct CreateJunctionTable<'a> {
    owner: &'a Entity,
    field: &'a Field,
}

impl<'a> CreateJunctionTable<'a> {
    pub fn new(owner: &'a Entity, field: &'a Field) -> Self {
        Self { owner, field }
    }

    /// The junction table name.
    pub fn table_name(&self) -> Option<&'a str> {
        self.field.assignment_table()
    }

    /// Build the CREATE TABLE SQL.
    pub fn build(&self) -> Result<String> {
        let field = self.field;
        let (Some(junction), Some(remote), Some(target)) = (
            field.assignment_table(),
            field.remote_column_name(),
            field.target(),
        ) else {
            return Err(Error::config(format!(
                "member `{}` of `{}` is not a many-to-many relationship",
                field.member(),
                self.owner.name()
            )));
        };
        let near = field.column_name();
        if near.eq_ignore_ascii_case(remote) {
            return Err(Error::config(format!(
                "junction table `{}` uses `{}` for both of its columns",
                junction, near
            )));
        }

        let target = describe_type(target)?;
        let owner_key = self.owner.primary_key();
        let target_key = target.primary_key();

        let parts = [
            format!("{} {} NOT NULL", near, owner_key.ddl_type()?),
            format!("{} {} NOT NULL", remote, target_key.ddl_type()?),
            format!("PRIMARY KEY ({}, {})", near, remote),
            format!(
                "CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                junction,
                near,
                near,
                self.owner.table_name(),
                owner_key.column_name()
            ),
            format!(
                "CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                junction,
                remote,
                remote,
                target.table_name(),
                target_key.column_name()
            ),
        ];

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            junction,
            parts.join(",\n  ")
        ))
    }
}

/// Order entities so every table follows its parent table and the tables
/// its scalar references point at.
///
/// Dependencies outside `entities` are ignored. A reference cycle is broken
/// at the first entity reached.
pub fn create_order(entities: &[Arc<Entity>]) -> Vec<Arc<Entity>> {
    let mut visited = HashSet::new();
    let mut ordered = Vec::with_capacity(entities.len());
    for entity in entities {
        place(entity, entities, &mut visited, &mut ordered);
    }
    ordered
}

fn place(
    entity: &Arc<Entity>,
    all: &[Arc<Entity>],
    visited: &mut HashSet<TypeId>,
    ordered: &mut Vec<Arc<Entity>>,
) {
    if !visited.insert(entity.type_id()) {
        return;
    }

    let references = entity.own_internals().filter_map(|f| f.target());
    for dependency in entity.parent().into_iter().chain(references) {
        if let Some(next) = all.iter().find(|e| e.type_id() == dependency.id()) {
            place(next, all, visited, ordered);
        }
    }

    ordered.push(Arc::clone(entity));
}

/// The many-to-many fields that own a junction table, one per distinct
/// junction name (ASCII case-insensitive). Inherited fields never own one.
pub(crate) fn junction_fields(entities: &[Arc<Entity>]) -> Vec<(&Entity, &Field)> {
    let mut seen: Vec<&str> = Vec::new();
    let mut owners = Vec::new();
    for entity in entities {
        for field in entity.externals() {
            if field.is_inherited() {
                continue;
            }
            let Some(junction) = field.assignment_table() else {
                continue;
            };
            if seen.iter().any(|s| s.eq_ignore_ascii_case(junction)) {
                continue;
            }
            seen.push(junction);
            owners.push((entity.as_ref(), field));
        }
    }
    owners
}

/// Builds the complete creation script of a registration set.
#[derive(Debug)]
pub struct SchemaBuilder<'a> {
    entities: &'a [Arc<Entity>],
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(entities: &'a [Arc<Entity>]) -> Self {
        Self { entities }
    }

    /// Build all statements: entity tables in dependency order, then one
    /// junction table per distinct many-to-many relationship.
    pub fn build(&self) -> Result<Vec<String>> {
        let ordered = create_order(self.entities);
        let mut statements = Vec::with_capacity(ordered.len());
        for entity in &ordered {
            statements.push(CreateTable::new(entity).build()?);
        }

        let junctions = junction_fields(&ordered);
        for (owner, field) in &junctions {
            statements.push(CreateJunctionTable::new(owner, field).build()?);
        }

        tracing::debug!(
            tables = ordered.len(),
            junctions = junctions.len(),
            "Built schema creation script"
        );
        Ok(statements)
    }
}
