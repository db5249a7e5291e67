//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// This struct is wrapped in `Arc` so all rows from the same query share
/// the same column information.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    ///
    /// Exact matches win; otherwise the first ASCII case-insensitive match is
    /// used, since servers differ in how they fold unquoted identifiers.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied().or_else(|| {
            self.names
                .iter()
                .position(|candidate| candidate.eq_ignore_ascii_case(name))
        })
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.index_of(name).is_some()
    }

    /// Get a value by column name, failing if the column is absent.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: "column in result set",
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
                rust_type: None,
            })
        })
    }

    /// Get a typed value by column name.
    pub fn get_named<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let value = self.require(name)?.clone();
        T::try_from(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre_row() -> Row {
        Row::new(
            vec!["Id".to_string(), "GNAME".to_string()],
            vec![Value::BigInt(1), Value::Text("Horror".to_string())],
        )
    }

    #[test]
    fn test_row_basic_access() {
        let row = genre_row();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
        assert_eq!(
            row.get_by_name("GNAME"),
            Some(&Value::Text("Horror".to_string()))
        );
        assert!(row.get_by_name("missing").is_none());
    }

    #[test]
    fn test_row_case_insensitive_fallback() {
        let row = genre_row();
        assert_eq!(row.get_by_name("id"), Some(&Value::BigInt(1)));
        assert!(row.contains_column("gname"));
    }

    #[test]
    fn test_row_typed_access() {
        let row = genre_row();
        let id: i32 = row.get_named("Id").unwrap();
        let name: String = row.get_named("GNAME").unwrap();
        assert_eq!(id, 1);
        assert_eq!(name, "Horror");
    }

    #[test]
    fn test_row_type_errors_carry_column() {
        let row = genre_row();
        match row.get_named::<bool>("GNAME") {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("GNAME")),
            other => panic!("expected type error, got {:?}", other),
        }
        assert!(row.require("nope").is_err());
    }

    #[test]
    fn test_row_shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["a".to_string()]));
        let first = Row::with_columns(Arc::clone(&columns), vec![Value::Int(1)]);
        let second = Row::with_columns(columns, vec![Value::Int(2)]);
        assert_eq!(first.column_names().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(second.iter().next(), Some(("a", &Value::Int(2))));
    }
}
