//! Write statements: upsert, delete, row locks and relationship maintenance.

use relmap_core::{
    Command, Dialect, Entity, Error, Field, FieldKind, Member, ObjectRef, Result, describe_type,
};
use std::sync::Arc;

/// Row lock strength for [`lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Exclusive lock for updates.
    #[default]
    ForUpdate,
    /// Exclusive lock that still admits key-share locks.
    ForNoKeyUpdate,
    /// Shared lock.
    ForShare,
    /// Shared lock on the key only.
    ForKeyShare,
}

impl LockMode {
    /// Get the SQL locking clause.
    pub const fn as_sql(self) -> &'static str {
        match self {
            LockMode::ForUpdate => "FOR UPDATE",
            LockMode::ForNoKeyUpdate => "FOR NO KEY UPDATE",
            LockMode::ForShare => "FOR SHARE",
            LockMode::ForKeyShare => "FOR KEY SHARE",
        }
    }
}

/// Build the insert-or-update command for the entity's own table.
///
/// Only the primary key and the entity's non-inherited columns are written;
/// a derived object's inherited columns belong to the parent table's upsert.
/// When the key is the only own column the statement is insert-only.
pub fn upsert(entity: &Entity, object: &ObjectRef) -> Result<Command> {
    let key = entity.primary_key();
    let columns: Vec<&Field> = std::iter::once(key)
        .chain(entity.own_internals().filter(|f| !f.is_primary_key()))
        .collect();

    let names: Vec<&str> = columns.iter().map(|f| f.column_name()).collect();
    let placeholders: Vec<String> = names.iter().map(|n| format!(":i{}", n)).collect();

    let conflict = if columns.len() == 1 {
        "DO NOTHING".to_string()
    } else {
        let updates: Vec<String> = names[1..]
            .iter()
            .map(|n| format!("{} = EXCLUDED.{}", n, n))
            .collect();
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let mut command = Command::new(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        entity.table_name(),
        names.join(", "),
        placeholders.join(", "),
        key.column_name(),
        conflict
    ));
    for (field, placeholder) in columns.iter().zip(placeholders) {
        command.push_param(placeholder, field.column_value(object)?);
    }
    Ok(command)
}

/// Build the delete command for one object.
///
/// The row is deleted from the root of the inheritance chain; the tables of
/// derived types follow through their cascading key constraints.
pub fn delete(entity: &Entity, object: &ObjectRef) -> Result<Command> {
    let key = entity.key_of(object)?;
    let root = root_table(entity)?;
    Ok(Command::new(format!(
        "DELETE FROM {} WHERE {} = :pk",
        root,
        entity.primary_key().column_name()
    ))
    .bind(":pk", key))
}

/// Build the lock commands for one object: the base rows first, then the
/// object's own row.
///
/// Dialects without row locks get the plain keyed select; run inside a
/// transaction it still pins the rows for the transaction's lifetime.
pub fn lock(
    entity: &Entity,
    object: &ObjectRef,
    mode: LockMode,
    dialect: Dialect,
) -> Result<Vec<Command>> {
    let mut commands = match entity.parent_entity()? {
        Some(base) => lock(&base, object, mode, dialect)?,
        None => Vec::new(),
    };
    let mut sql = format!(
        "SELECT * FROM {} WHERE {} = :pk",
        entity.table_name(),
        entity.primary_key().column_name()
    );
    if dialect.supports_row_locks() {
        sql.push(' ');
        sql.push_str(mode.as_sql());
    }
    commands.push(Command::new(sql).bind(":pk", entity.key_of(object)?));
    Ok(commands)
}

/// Build the commands that bring one relationship collection of a saved
/// object in line with its in-memory state.
///
/// Many-to-many: clear the object's junction rows, then insert one row per
/// associated object. One-to-many: point every associated object's foreign
/// key at this object (clearing it first when nullable) and set the
/// associated object's back-reference in memory.
pub fn reference_commands(
    entity: &Entity,
    field: &Field,
    object: &ObjectRef,
) -> Result<Vec<Command>> {
    let items = match field.read(object)? {
        Member::List(items) => items,
        _ => return Ok(Vec::new()),
    };
    let key = entity.key_of(object)?;

    match field.kind() {
        FieldKind::ManyToMany {
            target,
            junction,
            remote_column,
        } => {
            let target = describe_type(*target)?;
            let mut commands = Vec::with_capacity(items.len() + 1);
            commands.push(
                Command::new(format!(
                    "DELETE FROM {} WHERE {} = :pk",
                    junction,
                    field.column_name()
                ))
                .bind(":pk", key.clone()),
            );
            for item in &items {
                commands.push(
                    Command::new(format!(
                        "INSERT INTO {} ({}, {}) VALUES (:pk, :fk)",
                        junction,
                        field.column_name(),
                        remote_column
                    ))
                    .bind(":pk", key.clone())
                    .bind(":fk", target.key_of(item)?),
                );
            }
            Ok(commands)
        }
        FieldKind::OneToMany(target) => {
            let target = describe_type(*target)?;
            let Some(remote) = target.field_by_name(field.column_name()) else {
                tracing::trace!(
                    member = field.member(),
                    column = field.column_name(),
                    target = target.name(),
                    "No remote column for one-to-many field"
                );
                return Ok(Vec::new());
            };
            let table = owning_table(&target, remote)?;
            let target_key = target.primary_key().column_name();

            let mut commands = Vec::new();
            for item in &items {
                let item_key = target.key_of(item)?;
                if remote.is_nullable() {
                    commands.push(
                        Command::new(format!(
                            "UPDATE {} SET {} = NULL WHERE {} = :pk",
                            table,
                            remote.column_name(),
                            target_key
                        ))
                        .bind(":pk", item_key.clone()),
                    );
                }
                if remote.is_foreign_key() {
                    item.set(remote.member(), Member::Ref(Some(object.clone())))?;
                }
                commands.push(
                    Command::new(format!(
                        "UPDATE {} SET {} = :fk WHERE {} = :pk",
                        table,
                        remote.column_name(),
                        target_key
                    ))
                    .bind(":fk", key.clone())
                    .bind(":pk", item_key),
                );
            }
            Ok(commands)
        }
        _ => Err(Error::config(format!(
            "member `{}` of `{}` is not a relationship collection",
            field.member(),
            entity.name()
        ))),
    }
}

fn root_table(entity: &Entity) -> Result<String> {
    let mut current: Option<Arc<Entity>> = entity.parent_entity()?;
    let mut table = entity.table_name().to_string();
    while let Some(base) = current {
        table = base.table_name().to_string();
        current = base.parent_entity()?;
    }
    Ok(table)
}

/// The table that physically stores `field`: the entity's own table, or the
/// ancestor's table for an inherited column.
fn owning_table(entity: &Entity, field: &Field) -> Result<String> {
    if !field.is_inherited() {
        return Ok(entity.table_name().to_string());
    }
    let mut current = entity.parent_entity()?;
    while let Some(base) = current {
        if !base.is_inherited_field(field.member()) {
            return Ok(base.table_name().to_string());
        }
        current = base.parent_entity()?;
    }
    Err(Error::config(format!(
        "no table of `{}` stores column `{}`",
        entity.name(),
        field.column_name()
    )))
}
