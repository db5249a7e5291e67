//! Fluent queries over one model type.
//!
//! ```ignore
//! let cheap = mapper
//!     .query::<Book>()?
//!     .filter()
//!     .begin_set()
//!     .like("TITLE", "d%")
//!     .or()
//!     .is_null("GENRE_ID")
//!     .end_set()
//!     .and()
//!     .not_in_list("ISBN", ["h1", "h2"])
//!     .execute()?;
//! ```
//!
//! Column names are matched ignoring case. Unknown columns and malformed
//! connective sequences are reported by `execute` as query syntax errors
//! before anything is sent to the connection.

use crate::Mapper;
use relmap_core::{Command, Connection, Entity, Model, ObjectRef, Result, Shared, Value};
use relmap_query::{CompareOp, Filter};
use std::sync::Arc;

/// A query being built against `T`'s entity.
pub struct Query<'m, T, C: Connection> {
    mapper: &'m mut Mapper<C>,
    filter: Filter,
    results: Option<Vec<Shared<T>>>,
}

impl<'m, T: Model + Default, C: Connection> Query<'m, T, C> {
    pub(crate) fn new(mapper: &'m mut Mapper<C>, entity: Arc<Entity>) -> Self {
        Self {
            mapper,
            filter: Filter::new(entity),
            results: None,
        }
    }

    /// Start the WHERE clause.
    pub fn filter(mut self) -> Self {
        self.filter.filter();
        self
    }

    pub fn and(mut self) -> Self {
        self.filter.and();
        self
    }

    pub fn or(mut self) -> Self {
        self.filter.or();
        self
    }

    /// Negate the next condition or set.
    pub fn not(mut self) -> Self {
        self.filter.not();
        self
    }

    /// Open a parenthesized group.
    pub fn begin_set(mut self) -> Self {
        self.filter.begin_set();
        self
    }

    pub fn end_set(mut self) -> Self {
        self.filter.end_set();
        self
    }

    pub fn equals(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Eq, value.into())
    }

    pub fn not_equals(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Ne, value.into())
    }

    pub fn greater_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Gt, value.into())
    }

    pub fn less_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Lt, value.into())
    }

    /// `column >= value`
    pub fn at_least(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Ge, value.into())
    }

    /// `column <= value`
    pub fn at_most(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Le, value.into())
    }

    /// `column BETWEEN low AND high`, bounds inclusive.
    pub fn between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.filter.between(column, low.into(), high.into(), false);
        self
    }

    pub fn not_between(
        mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.filter.between(column, low.into(), high.into(), true);
        self
    }

    /// Case-insensitive `LIKE`.
    pub fn like(mut self, column: &str, pattern: &str) -> Self {
        self.filter.like(column, pattern, false, false);
        self
    }

    pub fn not_like(mut self, column: &str, pattern: &str) -> Self {
        self.filter.like(column, pattern, true, false);
        self
    }

    pub fn like_case_sensitive(mut self, column: &str, pattern: &str) -> Self {
        self.filter.like(column, pattern, false, true);
        self
    }

    pub fn in_list<V: Into<Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter.in_list(column, values, false);
        self
    }

    pub fn not_in_list<V: Into<Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter.in_list(column, values, true);
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filter.is_null(column, false);
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.filter.is_null(column, true);
        self
    }

    /// The command `execute` would run.
    pub fn to_command(&self) -> Result<Command> {
        self.filter.build()
    }

    /// Run the query, or return the results of the previous run.
    pub fn execute(&mut self) -> Result<Vec<Shared<T>>> {
        match &self.results {
            Some(results) => Ok(results.clone()),
            None => self.execute_redo(),
        }
    }

    /// Run the query again, replacing any remembered results.
    pub fn execute_redo(&mut self) -> Result<Vec<Shared<T>>> {
        let command = self.filter.build()?;
        let entity = Arc::clone(self.filter.entity());
        let results = self
            .mapper
            .run_query(&entity, &command)?
            .iter()
            .map(ObjectRef::downcast::<T>)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            entity = entity.name(),
            rows = results.len(),
            "Query executed"
        );
        self.results = Some(results.clone());
        Ok(results)
    }

    fn compare(mut self, column: &str, op: CompareOp, value: Value) -> Self {
        self.filter.compare(column, op, value);
        self
    }
}
