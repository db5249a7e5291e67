//! SQL type definitions and mapping.

/// SQL data types a mapped member can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Numeric,

    // Boolean
    Boolean,

    // String types
    Text,

    // Binary types
    Bytes,

    // Date/time types
    Timestamp,

    // UUID
    Uuid,

    // JSON
    Json,

    // Custom type name
    Custom(&'static str),
}

impl SqlType {
    /// Get the DDL type name for this type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            SqlType::TinyInt | SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Text => "TEXT",
            SqlType::Bytes => "BYTEA",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Uuid => "UUID",
            SqlType::Json => "JSON",
            SqlType::Custom(name) => *name,
        }
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Check if this type is a floating point type.
    pub const fn is_float(&self) -> bool {
        matches!(self, SqlType::Real | SqlType::Double)
    }
}

/// Trait for types that have a corresponding SQL type.
pub trait TypeInfo {
    /// The SQL type for this Rust type.
    const SQL_TYPE: SqlType;

    /// Whether this type is nullable by default.
    const NULLABLE: bool = false;
}

impl TypeInfo for i8 {
    const SQL_TYPE: SqlType = SqlType::TinyInt;
}

impl TypeInfo for i16 {
    const SQL_TYPE: SqlType = SqlType::SmallInt;
}

impl TypeInfo for i32 {
    const SQL_TYPE: SqlType = SqlType::Integer;
}

impl TypeInfo for i64 {
    const SQL_TYPE: SqlType = SqlType::BigInt;
}

impl TypeInfo for f32 {
    const SQL_TYPE: SqlType = SqlType::Real;
}

impl TypeInfo for f64 {
    const SQL_TYPE: SqlType = SqlType::Double;
}

impl TypeInfo for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;
}

impl TypeInfo for String {
    const SQL_TYPE: SqlType = SqlType::Text;
}

impl TypeInfo for char {
    const SQL_TYPE: SqlType = SqlType::Text;
}

impl TypeInfo for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Bytes;
}

impl TypeInfo for [u8; 16] {
    const SQL_TYPE: SqlType = SqlType::Uuid;
}

impl TypeInfo for serde_json::Value {
    const SQL_TYPE: SqlType = SqlType::Json;
}

impl<T: TypeInfo> TypeInfo for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;
}

/// A fieldless enumeration stored as its ordinal.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, Default, PartialEq)]
/// enum Gender { #[default] Male, Female }
///
/// impl OrdinalEnum for Gender {
///     fn ordinal(&self) -> i32 { *self as i32 }
///     fn from_ordinal(ordinal: i32) -> Option<Self> {
///         match ordinal { 0 => Some(Gender::Male), 1 => Some(Gender::Female), _ => None }
///     }
/// }
/// ```
pub trait OrdinalEnum: Sized {
    /// The stored ordinal of this variant.
    fn ordinal(&self) -> i32;

    /// The variant stored under `ordinal`, if any.
    fn from_ordinal(ordinal: i32) -> Option<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_names_follow_program_types() {
        assert_eq!(<bool as TypeInfo>::SQL_TYPE.sql_name(), "BOOLEAN");
        assert_eq!(<i8 as TypeInfo>::SQL_TYPE.sql_name(), "SMALLINT");
        assert_eq!(<i16 as TypeInfo>::SQL_TYPE.sql_name(), "SMALLINT");
        assert_eq!(<i32 as TypeInfo>::SQL_TYPE.sql_name(), "INTEGER");
        assert_eq!(<i64 as TypeInfo>::SQL_TYPE.sql_name(), "BIGINT");
        assert_eq!(<f32 as TypeInfo>::SQL_TYPE.sql_name(), "REAL");
        assert_eq!(<f64 as TypeInfo>::SQL_TYPE.sql_name(), "DOUBLE PRECISION");
        assert_eq!(<String as TypeInfo>::SQL_TYPE.sql_name(), "TEXT");
        assert_eq!(<Vec<u8> as TypeInfo>::SQL_TYPE.sql_name(), "BYTEA");
        assert_eq!(SqlType::Custom("VARCHAR(40)").sql_name(), "VARCHAR(40)");
    }

    #[test]
    fn option_is_nullable() {
        assert!(!<i32 as TypeInfo>::NULLABLE);
        assert!(<Option<i32> as TypeInfo>::NULLABLE);
        assert_eq!(<Option<String> as TypeInfo>::SQL_TYPE, SqlType::Text);
    }
}
