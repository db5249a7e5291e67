//! Read queries: the canonical entity select and relationship lookups.

use relmap_core::{Command, Entity, Error, Field, FieldKind, Result, Value, describe_type};

/// Build the canonical read query of an entity.
///
/// Selects the primary key and every other internal column, joining the
/// parent tables on the shared key so one row carries all inherited
/// columns.
pub fn base_select(entity: &Entity) -> Result<String> {
    let key = entity.primary_key().column_name();
    let columns: Vec<&str> = std::iter::once(key)
        .chain(
            entity
                .internals()
                .filter(|f| !f.is_primary_key())
                .map(Field::column_name),
        )
        .collect();

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), entity.table_name());
    let mut current = entity.parent_entity()?;
    while let Some(base) = current {
        sql.push_str(&format!(
            " INNER JOIN {} USING ({})",
            base.table_name(),
            base.primary_key().column_name()
        ));
        current = base.parent_entity()?;
    }
    Ok(sql)
}

/// Build the query that reads one object by its primary key.
///
/// `key` is in column form.
pub fn select_by_key(entity: &Entity, key: Value) -> Result<Command> {
    Ok(Command::new(format!(
        "{} WHERE {} = :pk",
        base_select(entity)?,
        entity.primary_key().column_name()
    ))
    .bind(":pk", key))
}

/// Build the query that reads the objects behind a relationship collection.
///
/// `owner_key` is the owning object's primary key in column form. The query
/// runs against the target entity: one-to-many fields filter on the remote
/// foreign-key column, many-to-many fields on keys found in the junction
/// table.
pub fn foreign_key_query(field: &Field, owner_key: Value) -> Result<Command> {
    let sql = match field.kind() {
        FieldKind::ManyToMany {
            target,
            junction,
            remote_column,
        } => {
            let target = describe_type(*target)?;
            format!(
                "{} WHERE {} IN (SELECT {} FROM {} WHERE {} = :fk)",
                base_select(&target)?,
                target.primary_key().column_name(),
                remote_column,
                junction,
                field.column_name()
            )
        }
        FieldKind::OneToMany(target) => {
            let target = describe_type(*target)?;
            format!("{} WHERE {} = :fk", base_select(&target)?, field.column_name())
        }
        _ => {
            return Err(Error::config(format!(
                "member `{}` of `{}` is not a relationship collection",
                field.member(),
                field.owner().name()
            )));
        }
    };
    Ok(Command::new(sql).bind(":fk", owner_key))
}
