//! Database connection contract.
//!
//! The mapper never talks to a server directly. It builds [`Command`]s
//! (SQL text plus named parameters) and hands them to a [`Connection`]:
//!
//! - [`Connection::execute`] for statements that return no rows
//! - [`Connection::query`] for statements that return rows
//!
//! Drivers acquire and release their statement handles inside each call,
//! on every exit path, so callers never manage cursor lifetimes.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use std::fmt;

/// A SQL statement with named parameters.
///
/// Parameter names include their `:` prefix exactly as they appear in the
/// SQL text (`:pk`, `:p0`, `:iNAME`).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    sql: String,
    params: Vec<(String, Value)>,
}

impl Command {
    /// Create a command with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind a named parameter.
    ///
    /// Rebinding an existing name replaces its value.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_param(name, value);
        self
    }

    /// Bind a named parameter in place.
    pub fn push_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.params.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.params.push((name, value));
        }
    }

    /// Get the SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the bound parameters in binding order.
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// SQL dialect spoken by a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL and servers following its locking syntax.
    #[default]
    Postgres,
    /// SQLite, which locks the whole database instead of rows.
    Sqlite,
}

impl Dialect {
    /// Check if `SELECT ... FOR UPDATE` style row locks are accepted.
    pub const fn supports_row_locks(self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

/// A blocking database connection.
///
/// Implementations report failures with the driver's own error (typically
/// [`crate::Error::Query`]); the mapper wraps them as data-access errors.
pub trait Connection {
    /// The SQL dialect this connection speaks.
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// Execute a statement that returns no rows, returning rows affected.
    fn execute(&self, command: &Command) -> Result<u64>;

    /// Execute a statement and collect every returned row.
    fn query(&self, command: &Command) -> Result<Vec<Row>>;

    /// Execute a statement and return the first row, if any.
    fn query_one(&self, command: &Command) -> Result<Option<Row>> {
        Ok(self.query(command)?.into_iter().next())
    }
}

impl<C: Connection + ?Sized> Connection for &C {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn execute(&self, command: &Command) -> Result<u64> {
        (**self).execute(command)
    }

    fn query(&self, command: &Command) -> Result<Vec<Row>> {
        (**self).query(command)
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn execute(&self, command: &Command) -> Result<u64> {
        (**self).execute(command)
    }

    fn query(&self, command: &Command) -> Result<Vec<Row>> {
        (**self).query(command)
    }
}
