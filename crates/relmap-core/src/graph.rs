//! Entity graph resolution.
//!
//! Starting from a root type, walk the inheritance chain and every
//! relationship field depth-first and collect each reachable entity once.

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::model::ModelType;
use crate::registry::describe_type;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// Resolve the registration set reachable from `root`.
///
/// Order is depth-first post-order: an entity follows its parent, the
/// targets of its scalar references and the targets of its collections,
/// except where a cycle was cut by the visited set.
///
/// Two distinct types that map to the same table name are reported as a
/// configuration error.
pub fn resolve(root: ModelType) -> Result<Vec<Arc<Entity>>> {
    let mut visited = HashSet::new();
    let mut found = Vec::new();
    visit(root, &mut visited, &mut found)?;
    let entities = dedupe_by_table(found)?;

    tracing::debug!(
        root = root.name(),
        entities = entities.len(),
        "Resolved entity graph"
    );
    Ok(entities)
}

fn visit(
    model: ModelType,
    visited: &mut HashSet<TypeId>,
    found: &mut Vec<Arc<Entity>>,
) -> Result<()> {
    visited.insert(model.id());
    let entity = describe_type(model)?;

    let parents = entity.parent().into_iter();
    let references = entity.internals().filter_map(|f| f.target());
    let collections = entity.externals().filter_map(|f| f.target());
    let next: Vec<ModelType> = parents.chain(references).chain(collections).collect();

    for related in next {
        if !visited.contains(&related.id()) {
            visit(related, visited, found)?;
        }
    }

    found.push(entity);
    Ok(())
}

/// Keep the first entity per table name (ASCII case-insensitive).
pub fn dedupe_by_table(entities: Vec<Arc<Entity>>) -> Result<Vec<Arc<Entity>>> {
    let mut kept: Vec<Arc<Entity>> = Vec::with_capacity(entities.len());
    for entity in entities {
        let clash = kept
            .iter()
            .find(|k| k.table_name().eq_ignore_ascii_case(entity.table_name()));
        match clash {
            None => kept.push(entity),
            Some(existing) if existing.type_id() == entity.type_id() => {}
            Some(existing) => {
                return Err(Error::config(format!(
                    "models `{}` and `{}` both map to table `{}`",
                    existing.name(),
                    entity.name(),
                    entity.table_name()
                )));
            }
        }
    }
    Ok(kept)
}
