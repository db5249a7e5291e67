//! Mapper session for relmap.
//!
//! `relmap-session` is the **stateful layer**. A [`Mapper`] owns one
//! connection together with everything the mapping needs between calls:
//!
//! - **Registration**: the set of entities reachable from every registered
//!   model, kept free of table-name collisions.
//! - **Object cache**: fingerprints of saved and read objects, so unchanged
//!   objects are not written again, plus the scratch tier that keeps one
//!   instance per key while a read walks a cyclic graph.
//! - **Transactions**: an explicit idle / in-transaction state machine over
//!   `BEGIN`, `COMMIT` and `ROLLBACK`.
//!
//! Every statement is built by `relmap-query` or `relmap-schema`; this crate
//! only decides when to run them and how to turn rows back into objects.
//!
//! # Example
//!
//! ```ignore
//! let mut mapper = Mapper::new(connection);
//! mapper.register::<Book>()?;
//! mapper.ensure_created()?;
//!
//! mapper.save(&horror)?;
//! mapper.save(&dracula)?;
//!
//! let book = mapper.read::<Book>("h1")?.expect("saved above");
//! let titles = mapper
//!     .query::<Book>()?
//!     .filter()
//!     .like("TITLE", "d%")
//!     .execute()?;
//! ```

pub mod cache;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{Cache, ObjectCache, ObjectKey, fingerprint};
pub use query::Query;
pub use relmap_query::LockMode;

use relmap_core::{
    Command, Connection, Entity, Error, FieldKind, Member, Model, ModelType, ObjectRef,
    QueryError, QueryErrorKind, Result, Row, Shared, TransactionError, TransactionErrorKind,
    Value, dedupe_by_table, resolve,
};
use relmap_query::{delete, foreign_key_query, lock, reference_commands, select_by_key, upsert};
use relmap_schema::{create_commands, drop_commands};
use std::sync::Arc;

// ============================================================================
// Mapper Configuration
// ============================================================================

/// Configuration for [`Mapper`] behavior.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Skip writes for objects whose fingerprint matches the cached one.
    ///
    /// When off every save issues its statements.
    pub change_tracking: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            change_tracking: true,
        }
    }
}

impl MapperConfig {
    /// Create new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `change_tracking` (builder pattern).
    #[must_use]
    pub fn change_tracking(mut self, enabled: bool) -> Self {
        self.change_tracking = enabled;
        self
    }
}

// ============================================================================
// Mapper
// ============================================================================

/// A mapping session over one connection.
///
/// Independent mappers share nothing but the process-wide entity
/// descriptors, which are immutable.
pub struct Mapper<C: Connection> {
    connection: C,
    config: MapperConfig,
    entities: Vec<Arc<Entity>>,
    cache: Box<dyn Cache>,
    in_transaction: bool,
}

impl<C: Connection> std::fmt::Debug for Mapper<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("config", &self.config)
            .field(
                "entities",
                &self.entities.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Mapper<C> {
    /// Create a mapper with default configuration.
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, MapperConfig::default())
    }

    pub fn with_config(connection: C, config: MapperConfig) -> Self {
        Self::with_cache(connection, config, ObjectCache::new())
    }

    /// Create a mapper backed by a custom [`Cache`].
    pub fn with_cache(connection: C, config: MapperConfig, cache: impl Cache + 'static) -> Self {
        Self {
            connection,
            config,
            entities: Vec::new(),
            cache: Box::new(cache),
            in_transaction: false,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Give the connection back, dropping all session state.
    pub fn into_connection(self) -> C {
        self.connection
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a model and every entity reachable from it.
    pub fn register<T: Model + Default>(&mut self) -> Result<()> {
        self.register_type(ModelType::of::<T>())
    }

    /// Register a model given its runtime type handle.
    ///
    /// Registering a type twice is a no-op. A new type whose table name is
    /// already taken by another type is a configuration error, and leaves
    /// the registration unchanged.
    #[tracing::instrument(level = "debug", skip_all, fields(model = model.name()))]
    pub fn register_type(&mut self, model: ModelType) -> Result<()> {
        if self.is_registered(model) {
            return Ok(());
        }

        let mut entities = self.entities.clone();
        entities.extend(resolve(model)?);
        self.entities = dedupe_by_table(entities)?;

        tracing::info!(
            model = model.name(),
            entities = self.entities.len(),
            "Registered model"
        );
        Ok(())
    }

    pub fn is_registered(&self, model: ModelType) -> bool {
        self.entities.iter().any(|e| e.type_id() == model.id())
    }

    /// Every registered entity, in registration order.
    pub fn entities(&self) -> &[Arc<Entity>] {
        &self.entities
    }

    /// The registered entity of `model`, registering it first if needed.
    pub fn entity(&mut self, model: ModelType) -> Result<Arc<Entity>> {
        self.register_type(model)?;
        self.entities
            .iter()
            .find(|e| e.type_id() == model.id())
            .cloned()
            .ok_or_else(|| Error::config(format!("model `{}` is not registered", model.name())))
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Create every registered table that does not exist yet.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn ensure_created(&mut self) -> Result<()> {
        let commands = create_commands(&self.entities)?;
        for command in &commands {
            self.execute(command).map_err(|e| {
                Error::data_access("table creation failed; stopped creating the schema", e)
            })?;
        }
        tracing::info!(statements = commands.len(), "Schema created");
        Ok(())
    }

    /// Drop every registered table, junction tables first.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn ensure_deleted(&mut self) -> Result<()> {
        let commands = drop_commands(&self.entities);
        for command in &commands {
            self.execute(command).map_err(|e| {
                Error::data_access("table drop failed; stopped dropping the schema", e)
            })?;
        }
        tracing::info!(statements = commands.len(), "Schema dropped");
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or update an object and its relationship rows.
    ///
    /// A derived object is written level by level, base table first. Levels
    /// whose state matches the cache are skipped. Relationship maintenance
    /// runs as separate statements after each upsert; wrap the call in a
    /// transaction when it must be atomic.
    #[tracing::instrument(level = "debug", skip_all, fields(model = std::any::type_name::<T>()))]
    pub fn save<T: Model + Default>(&mut self, object: &Shared<T>) -> Result<()> {
        let entity = self.entity(ModelType::of::<T>())?;
        self.save_as(&entity, &ObjectRef::new(object))
    }

    fn save_as(&mut self, entity: &Entity, object: &ObjectRef) -> Result<()> {
        if let Some(base) = entity.parent_entity()? {
            self.save_as(&base, object)?;
        }

        if self.config.change_tracking && !self.cache.object_changed(entity, object)? {
            tracing::trace!(entity = entity.name(), "Unchanged; skipping write");
            return Ok(());
        }

        let command = upsert(entity, object)?;
        self.execute(&command).map_err(|e| {
            Error::data_access(
                format!("object of type `{}` could not be saved", entity.name()),
                e,
            )
        })?;

        for field in entity.externals().filter(|f| !f.is_inherited()) {
            for command in reference_commands(entity, field, object)? {
                self.execute(&command).map_err(|e| {
                    Error::data_access(
                        format!(
                            "references `{}` of `{}` could not be updated",
                            field.member(),
                            entity.name()
                        ),
                        e,
                    )
                })?;
            }
        }

        self.cache.put(entity, object)
    }

    /// Delete an object's row.
    ///
    /// Rows of derived tables and junction tables go with it through their
    /// cascading keys; in-memory relationships are left untouched.
    #[tracing::instrument(level = "debug", skip_all, fields(model = std::any::type_name::<T>()))]
    pub fn delete<T: Model + Default>(&mut self, object: &Shared<T>) -> Result<()> {
        let entity = self.entity(ModelType::of::<T>())?;
        let object = ObjectRef::new(object);
        let command = delete(&entity, &object)?;
        self.execute(&command).map_err(|e| {
            Error::data_access(
                format!("object of type `{}` could not be deleted", entity.name()),
                e,
            )
        })?;

        let key = entity.key_of(&object)?;
        let mut level = Some(entity);
        while let Some(current) = level {
            self.cache.delete(&current, &key);
            level = current.parent_entity()?;
        }
        Ok(())
    }

    /// Take row locks on an object, base table first.
    ///
    /// On a dialect without row locks the keyed selects run without a
    /// locking clause. Either way a missing row at any level is reported as
    /// a not-found data-access error.
    #[tracing::instrument(level = "debug", skip_all, fields(mode = mode.as_sql()))]
    pub fn lock<T: Model + Default>(&mut self, object: &Shared<T>, mode: LockMode) -> Result<()> {
        let entity = self.entity(ModelType::of::<T>())?;
        let dialect = self.connection.dialect();
        for command in lock(&entity, &ObjectRef::new(object), mode, dialect)? {
            let rows = self.fetch(&command).map_err(|e| {
                Error::data_access(
                    format!("object could not be locked ({})", mode.as_sql()),
                    e,
                )
            })?;
            if rows.is_empty() {
                return Err(Error::data_access(
                    format!("object of type `{}` could not be locked", entity.name()),
                    Error::Query(QueryError {
                        kind: QueryErrorKind::NotFound,
                        sql: Some(command.sql().to_string()),
                        sqlstate: None,
                        message: "no row matches the object's key".to_string(),
                        source: None,
                    }),
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read one object by primary key.
    ///
    /// Relationships are loaded eagerly. Within one read every key maps to
    /// a single instance, so cyclic graphs come back cyclic. An object
    /// already in the cache is returned as cached.
    #[tracing::instrument(level = "debug", skip_all, fields(model = std::any::type_name::<T>()))]
    pub fn read<T: Model + Default>(&mut self, key: impl Into<Value>) -> Result<Option<Shared<T>>> {
        let entity = self.entity(ModelType::of::<T>())?;
        let key = entity.primary_key().to_column_value(key.into())?;

        let found = self.read_by_key(&entity, key);
        self.cache.clear_temp();

        found?.map(|object| object.downcast::<T>()).transpose()
    }

    /// Start a fluent query over `T`.
    pub fn query<T: Model + Default>(&mut self) -> Result<Query<'_, T, C>> {
        let entity = self.entity(ModelType::of::<T>())?;
        Ok(Query::new(self, entity))
    }

    /// Run a select against `entity` and materialize every row.
    pub(crate) fn run_query(
        &mut self,
        entity: &Arc<Entity>,
        command: &Command,
    ) -> Result<Vec<ObjectRef>> {
        let objects = self.load_rows(entity, command);
        self.cache.clear_temp();
        objects
    }

    fn read_by_key(&mut self, entity: &Arc<Entity>, key: Value) -> Result<Option<ObjectRef>> {
        let command = select_by_key(entity, key)?;
        Ok(self.load_rows(entity, &command)?.into_iter().next())
    }

    fn load_rows(&mut self, entity: &Arc<Entity>, command: &Command) -> Result<Vec<ObjectRef>> {
        let rows = self.fetch(command).map_err(|e| {
            Error::data_access(
                format!("query for objects of type `{}` failed", entity.name()),
                e,
            )
        })?;
        rows.iter().map(|row| self.materialize(entity, row)).collect()
    }

    /// Turn one row into an object, reusing cached instances.
    ///
    /// The new object is registered in the temporary tier before any
    /// relationship is followed.
    fn materialize(&mut self, entity: &Arc<Entity>, row: &Row) -> Result<ObjectRef> {
        let pk = entity.primary_key();
        let raw = row.require(pk.column_name())?.clone();
        let key = pk.to_column_value(raw.clone())?;

        if let Some(cached) = self.cache.get(entity, &key) {
            tracing::trace!(entity = entity.name(), "Persistent cache hit");
            return Ok(cached);
        }
        if let Some(pending) = self.cache.get_temp(entity, &key) {
            return Ok(pending);
        }

        let object = entity.create();
        self.cache.put_temp(entity, &key, object.clone());
        object.set(pk.member(), Member::Value(pk.to_program(raw)?))?;

        for field in entity.internals().filter(|f| !f.is_primary_key()) {
            let value = row.require(field.column_name())?.clone();
            let member = match field.kind() {
                FieldKind::Reference(target) => Member::Ref(self.resolve_reference(*target, value)?),
                _ => Member::Value(field.to_program(value)?),
            };
            object.set(field.member(), member)?;
        }

        for field in entity.externals() {
            let Some(target) = field.target() else {
                continue;
            };
            let target = self.entity(target)?;
            let command = foreign_key_query(field, key.clone())?;
            let items = self.load_rows(&target, &command)?;
            object.set(field.member(), Member::List(items))?;
        }

        self.cache_levels(entity, &object)?;
        Ok(object)
    }

    fn resolve_reference(&mut self, target: ModelType, raw: Value) -> Result<Option<ObjectRef>> {
        if raw.is_null() {
            return Ok(None);
        }
        let entity = self.entity(target)?;
        let key = entity.primary_key().to_column_value(raw)?;
        if let Some(found) = self
            .cache
            .get(&entity, &key)
            .or_else(|| self.cache.get_temp(&entity, &key))
        {
            return Ok(Some(found));
        }
        self.read_by_key(&entity, key)
    }

    /// Cache a freshly read object under its entity and every ancestor.
    fn cache_levels(&mut self, entity: &Arc<Entity>, object: &ObjectRef) -> Result<()> {
        self.cache.put(entity, object)?;
        let mut level = entity.parent_entity()?;
        while let Some(current) = level {
            self.cache.put(&current, object)?;
            level = current.parent_entity()?;
        }
        Ok(())
    }

    /// Forget every cached object.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache.clear_temp();
        tracing::debug!("Cache cleared");
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Whether a transaction is active.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Begin a transaction.
    ///
    /// Nested transactions are not supported.
    pub fn start_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NestedNotSupported,
                message: "a transaction is already active".to_string(),
            }));
        }
        self.execute(&Command::new("BEGIN"))
            .map_err(|e| Error::data_access("transaction could not be started", e))?;
        self.in_transaction = true;
        tracing::info!("Transaction started");
        Ok(())
    }

    /// Commit the active transaction and clear the cache.
    pub fn commit_transaction(&mut self) -> Result<()> {
        self.require_transaction("commit")?;
        self.execute(&Command::new("COMMIT"))
            .map_err(|e| Error::data_access("changes could not be committed", e))?;
        self.in_transaction = false;
        self.clear_cache();
        tracing::info!("Transaction committed");
        Ok(())
    }

    /// Roll back the active transaction and clear the cache.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        self.require_transaction("rollback")?;
        self.execute(&Command::new("ROLLBACK"))
            .map_err(|e| Error::data_access("changes could not be rolled back", e))?;
        self.in_transaction = false;
        self.clear_cache();
        tracing::info!("Transaction rolled back");
        Ok(())
    }

    fn require_transaction(&self, action: &str) -> Result<()> {
        if self.in_transaction {
            return Ok(());
        }
        Err(Error::Transaction(TransactionError {
            kind: TransactionErrorKind::NotActive,
            message: format!("cannot {} without an active transaction", action),
        }))
    }

    // ========================================================================
    // Connection access
    // ========================================================================

    fn execute(&self, command: &Command) -> Result<u64> {
        tracing::debug!(
            sql = command.sql(),
            params = command.params().len(),
            "Executing statement"
        );
        self.connection.execute(command)
    }

    fn fetch(&self, command: &Command) -> Result<Vec<Row>> {
        tracing::debug!(
            sql = command.sql(),
            params = command.params().len(),
            "Executing query"
        );
        self.connection.query(command)
    }
}
