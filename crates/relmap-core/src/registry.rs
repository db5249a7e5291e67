//! Process-wide descriptor cache.
//!
//! Each model type is described once; the resulting [`Entity`] is shared
//! by every mapper in the process. Lookups take a read lock, and a freshly
//! built descriptor is inserted under a write lock (first writer wins).

use crate::entity::{Entity, EntityBuilder};
use crate::error::{Error, Result};
use crate::model::{Model, ModelType};
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

type Descriptors = RwLock<HashMap<TypeId, Arc<Entity>>>;

fn descriptors() -> &'static Descriptors {
    static DESCRIPTORS: OnceLock<Descriptors> = OnceLock::new();
    DESCRIPTORS.get_or_init(|| RwLock::new(HashMap::new()))
}

thread_local! {
    // Types whose describe() is running on this thread, for cycle detection.
    static IN_PROGRESS: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Describe a model type, building its descriptor on first use.
pub fn describe<T: Model + Default>() -> Result<Arc<Entity>> {
    describe_type(ModelType::of::<T>())
}

/// Describe a model type by its runtime handle.
pub fn describe_type(model: ModelType) -> Result<Arc<Entity>> {
    {
        let cache = descriptors().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(entity) = cache.get(&model.id()) {
            return Ok(Arc::clone(entity));
        }
    }

    let cyclic = IN_PROGRESS.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.contains(&model.id()) {
            true
        } else {
            stack.push(model.id());
            false
        }
    });
    if cyclic {
        return Err(Error::config(format!(
            "model `{}` inherits from itself",
            model.name()
        )));
    }

    let built = build(model);
    IN_PROGRESS.with(|stack| stack.borrow_mut().retain(|id| *id != model.id()));
    let entity = Arc::new(built?);

    tracing::debug!(
        model = model.name(),
        table = entity.table_name(),
        fields = entity.fields().len(),
        derived = entity.is_derived(),
        "Described model"
    );

    let mut cache = descriptors().write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(model.id()).or_insert(entity)))
}

fn build(model: ModelType) -> Result<Entity> {
    let mut builder = EntityBuilder::new(model);
    model.describe_into(&mut builder);
    builder.build()
}
