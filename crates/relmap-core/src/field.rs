//! Field descriptors and program/column value conversion.

use crate::error::{Error, Result, TypeError};
use crate::model::{Member, ModelType, ObjectRef};
use crate::registry::describe_type;
use crate::types::SqlType;
use crate::value::Value;

/// Referential action for foreign key constraints (ON DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// No action - raise error if any references exist.
    #[default]
    NoAction,
    /// Cascade - automatically delete referencing rows.
    Cascade,
    /// Set null - set referencing columns to NULL.
    SetNull,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
        }
    }
}

/// The storage role of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain column in the owning table.
    Column,
    /// The primary-key column of the owning table.
    PrimaryKey,
    /// A single related object stored as a foreign-key column in the owning table.
    Reference(ModelType),
    /// A collection whose foreign-key column lives on the target table.
    OneToMany(ModelType),
    /// A collection linked through a junction table.
    ManyToMany {
        target: ModelType,
        junction: String,
        remote_column: String,
    },
}

/// Metadata about one mapped member.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) owner: ModelType,
    pub(crate) member: String,
    pub(crate) column_name: String,
    pub(crate) program_type: SqlType,
    pub(crate) column_type: SqlType,
    pub(crate) db_type: Option<String>,
    pub(crate) kind: FieldKind,
    pub(crate) nullable: bool,
    pub(crate) unique: bool,
    pub(crate) on_delete: ReferentialAction,
    pub(crate) ordinal_enum: bool,
    pub(crate) inherited: bool,
}

impl Field {
    pub(crate) fn new(owner: ModelType, member: &str, kind: FieldKind, sql_type: SqlType) -> Self {
        Self {
            owner,
            member: member.to_string(),
            column_name: member.to_string(),
            program_type: sql_type,
            column_type: sql_type,
            db_type: None,
            kind,
            nullable: false,
            unique: false,
            on_delete: ReferentialAction::NoAction,
            ordinal_enum: false,
            inherited: false,
        }
    }

    /// The model type that owns this field.
    pub fn owner(&self) -> ModelType {
        self.owner
    }

    /// The Rust member name.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The column name. For one-to-many fields this is the column on the
    /// target table; for many-to-many fields the near column of the junction.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// The in-memory type.
    pub fn program_type(&self) -> SqlType {
        self.program_type
    }

    /// The storage type.
    pub fn column_type(&self) -> SqlType {
        self.column_type
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self.kind, FieldKind::PrimaryKey)
    }

    /// Any relationship: scalar reference, one-to-many or many-to-many.
    pub fn is_foreign_key(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Reference(_) | FieldKind::OneToMany(_) | FieldKind::ManyToMany { .. }
        )
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self.kind, FieldKind::ManyToMany { .. })
    }

    pub fn is_one_to_many(&self) -> bool {
        matches!(self.kind, FieldKind::OneToMany(_))
    }

    /// Stored outside the owning table.
    pub fn is_external(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::OneToMany(_) | FieldKind::ManyToMany { .. }
        )
    }

    /// Stored as a column of the owning table.
    pub fn is_internal(&self) -> bool {
        !self.is_external()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Stored by an ancestor table rather than the owning entity's own table.
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    pub fn is_enum(&self) -> bool {
        self.ordinal_enum
    }

    pub fn on_delete(&self) -> ReferentialAction {
        self.on_delete
    }

    /// The related model type, for relationship fields.
    pub fn target(&self) -> Option<ModelType> {
        match &self.kind {
            FieldKind::Reference(t) | FieldKind::OneToMany(t) => Some(*t),
            FieldKind::ManyToMany { target, .. } => Some(*target),
            FieldKind::Column | FieldKind::PrimaryKey => None,
        }
    }

    /// The junction table of a many-to-many field.
    pub fn assignment_table(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ManyToMany { junction, .. } => Some(junction),
            _ => None,
        }
    }

    /// The far-side junction column of a many-to-many field.
    pub fn remote_column_name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ManyToMany { remote_column, .. } => Some(remote_column),
            _ => None,
        }
    }

    /// The DDL type of this column.
    ///
    /// A scalar reference takes the type of the target's primary key.
    pub fn ddl_type(&self) -> Result<String> {
        if let Some(explicit) = &self.db_type {
            return Ok(explicit.clone());
        }
        match &self.kind {
            FieldKind::Reference(target) => describe_type(*target)?.primary_key().ddl_type(),
            FieldKind::Column | FieldKind::PrimaryKey => {
                Ok(self.column_type.sql_name().to_string())
            }
            FieldKind::OneToMany(_) | FieldKind::ManyToMany { .. } => Err(Error::config(format!(
                "collection member `{}` has no column in `{}`",
                self.member,
                self.owner.name()
            ))),
        }
    }

    /// Read this field's member from a live object.
    pub fn read(&self, object: &ObjectRef) -> Result<Member> {
        object.get(&self.member)
    }

    /// Read this field's member from a live object, converted to column form.
    pub fn column_value(&self, object: &ObjectRef) -> Result<Value> {
        self.to_column(self.read(object)?)
    }

    /// Convert a member to the value stored in this field's column.
    ///
    /// A referenced object is replaced by its primary key.
    pub fn to_column(&self, member: Member) -> Result<Value> {
        match member {
            Member::Value(v) => self.to_column_value(v),
            Member::Ref(None) => Ok(Value::Null),
            Member::Ref(Some(object)) => {
                let target = self.target().ok_or_else(|| self.not_a_reference())?;
                describe_type(target)?.key_of(&object)
            }
            Member::List(_) => Err(Error::Type(TypeError {
                expected: "column value",
                actual: "object list".to_string(),
                column: Some(self.column_name.clone()),
                rust_type: None,
            })),
        }
    }

    /// Convert a scalar program value to its column form.
    pub fn to_column_value(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let FieldKind::Reference(target) = &self.kind {
            return describe_type(*target)?
                .primary_key()
                .to_column_value(value);
        }
        if self.ordinal_enum {
            return self.integer_as(SqlType::Integer, &value);
        }
        let storage = self.column_type;
        match storage {
            t if t.is_integer() && (value.is_integer() || matches!(value, Value::Bool(_))) => {
                self.integer_as(t, &value)
            }
            _ if self.program_type == storage => Ok(value),
            SqlType::Boolean if value.is_integer() => Ok(Value::Bool(value.as_bool() == Some(true))),
            t if t.is_float() => self.float_as(t, value),
            SqlType::Text if !matches!(value, Value::Text(_)) => Ok(Value::Text(value.to_string())),
            _ => Ok(value),
        }
    }

    /// Convert a fetched column value to its program form.
    ///
    /// Scalar references are returned as the raw key; resolving them to an
    /// object is the mapper's job.
    pub fn to_program(&self, value: Value) -> Result<Value> {
        if value.is_null() || matches!(self.kind, FieldKind::Reference(_)) {
            return Ok(value);
        }
        if self.ordinal_enum {
            return self.integer_as(SqlType::Integer, &value);
        }
        match self.program_type {
            SqlType::Boolean => match value.as_bool() {
                Some(b) if value.is_integer() || matches!(value, Value::Bool(_)) => {
                    Ok(Value::Bool(b))
                }
                _ => Err(self.conversion("bool", &value)),
            },
            t if t.is_integer() && (value.is_integer() || matches!(value, Value::Bool(_))) => {
                self.integer_as(t, &value)
            }
            t if t.is_integer() => match value.as_str().map(str::parse::<i64>) {
                Some(Ok(parsed)) => self.integer_as(t, &Value::BigInt(parsed)),
                _ => Err(self.conversion("integer", &value)),
            },
            t if t.is_float() => self.float_as(t, value),
            SqlType::Uuid => match value {
                Value::Bytes(b) if b.len() == 16 => {
                    let mut arr = [0u8; 16];
                    arr.copy_from_slice(&b);
                    Ok(Value::Uuid(arr))
                }
                other => Ok(other),
            },
            SqlType::Timestamp => match value.as_i64() {
                Some(micros) if value.is_integer() => Ok(Value::Timestamp(micros)),
                _ => Ok(value),
            },
            SqlType::Json => match value {
                Value::Text(s) => serde_json::from_str(&s)
                    .map(Value::Json)
                    .map_err(|_| self.conversion("JSON", &Value::Text(s))),
                other => Ok(other),
            },
            _ => Ok(value),
        }
    }

    fn integer_as(&self, target: SqlType, value: &Value) -> Result<Value> {
        let wide = value
            .as_i64()
            .ok_or_else(|| self.conversion("integer", value))?;
        let out_of_range = || self.conversion("in-range integer", value);
        Ok(match target {
            SqlType::TinyInt => Value::TinyInt(i8::try_from(wide).map_err(|_| out_of_range())?),
            SqlType::SmallInt => {
                Value::SmallInt(i16::try_from(wide).map_err(|_| out_of_range())?)
            }
            SqlType::Integer => Value::Int(i32::try_from(wide).map_err(|_| out_of_range())?),
            _ => Value::BigInt(wide),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn float_as(&self, target: SqlType, value: Value) -> Result<Value> {
        match (target, value.as_f64()) {
            (SqlType::Real, Some(f)) => Ok(Value::Float(f as f32)),
            (_, Some(f)) => Ok(Value::Double(f)),
            (_, None) => Ok(value),
        }
    }

    fn conversion(&self, expected: &'static str, value: &Value) -> Error {
        Error::Type(TypeError {
            expected,
            actual: format!("{} {}", value.type_name(), value),
            column: Some(self.column_name.clone()),
            rust_type: None,
        })
    }

    fn not_a_reference(&self) -> Error {
        Error::config(format!(
            "member `{}` of `{}` is not a relationship",
            self.member,
            self.owner.name()
        ))
    }
}
