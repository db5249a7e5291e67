//! Entity descriptors and the builder models use to declare them.

use crate::error::{Error, Result};
use crate::field::{Field, FieldKind, ReferentialAction};
use crate::identifiers::validate_identifier;
use crate::model::{Member, Model, ModelType, ObjectRef};
use crate::registry::describe_type;
use crate::types::{OrdinalEnum, SqlType, TypeInfo};
use crate::value::Value;
use std::any::TypeId;
use std::sync::Arc;

/// The descriptor for one mapped type and its table.
///
/// Built once per type by [`describe`](crate::describe) and immutable
/// afterwards.
#[derive(Debug)]
pub struct Entity {
    model: ModelType,
    table_name: String,
    fields: Vec<Field>,
    primary_key: usize,
    parent: Option<ModelType>,
}

impl Entity {
    pub fn model(&self) -> ModelType {
        self.model
    }

    pub fn type_id(&self) -> TypeId {
        self.model.id()
    }

    /// The simple name of the mapped type.
    pub fn name(&self) -> &'static str {
        self.model.name()
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All fields, own and inherited.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields stored as columns (in this table or an ancestor's).
    pub fn internals(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_internal())
    }

    /// Relationship collections stored on other tables.
    pub fn externals(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_external())
    }

    /// Columns of this entity's own table: the primary key plus every
    /// non-inherited internal field.
    pub fn own_internals(&self) -> impl Iterator<Item = &Field> {
        self.internals().filter(|f| !f.is_inherited())
    }

    pub fn primary_key(&self) -> &Field {
        &self.fields[self.primary_key]
    }

    /// Does this type extend another mapped type?
    pub fn is_derived(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent(&self) -> Option<ModelType> {
        self.parent
    }

    /// The descriptor of the parent type, if derived.
    pub fn parent_entity(&self) -> Result<Option<Arc<Entity>>> {
        self.parent.map(describe_type).transpose()
    }

    /// Look up a field by member name.
    pub fn field(&self, member: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.member() == member)
    }

    /// Look up an internal field by column name, ignoring ASCII case.
    pub fn field_by_name(&self, column: &str) -> Option<&Field> {
        self.internals()
            .find(|f| f.column_name().eq_ignore_ascii_case(column))
    }

    /// Is `member` stored by an ancestor's table rather than this one?
    pub fn is_inherited_field(&self, member: &str) -> bool {
        self.field(member).is_some_and(Field::is_inherited)
    }

    /// The primary-key value of a live object, in program form.
    pub fn primary_key_value(&self, object: &ObjectRef) -> Result<Value> {
        match self.primary_key().read(object)? {
            Member::Value(v) => Ok(v),
            _ => Err(Error::config(format!(
                "primary key `{}` of `{}` is not a scalar",
                self.primary_key().member(),
                self.name()
            ))),
        }
    }

    /// The primary-key value of a live object, in column form.
    pub fn key_of(&self, object: &ObjectRef) -> Result<Value> {
        let key = self.primary_key_value(object)?;
        self.primary_key().to_column_value(key)
    }

    /// Allocate a default instance of the mapped type.
    pub fn create(&self) -> ObjectRef {
        self.model.create()
    }
}

/// Declares the mapping of one model type.
///
/// Handed to [`Model::describe`]; the collected declarations are validated
/// and frozen into an [`Entity`].
#[derive(Debug)]
pub struct EntityBuilder {
    model: ModelType,
    table_name: Option<String>,
    parent: Option<ModelType>,
    fields: Vec<Field>,
    ignored: Vec<String>,
}

impl EntityBuilder {
    pub(crate) fn new(model: ModelType) -> Self {
        Self {
            model,
            table_name: None,
            parent: None,
            fields: Vec::new(),
            ignored: Vec::new(),
        }
    }

    /// Override the table name (defaults to the upper-cased type name).
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table_name = Some(name.to_string());
        self
    }

    /// Inherit the fields of a mapped parent type.
    ///
    /// The parent's primary key becomes this entity's primary key, stored in
    /// both tables; all other parent fields stay in the parent's table.
    pub fn extends<P: Model + Default>(&mut self) -> &mut Self {
        self.parent = Some(ModelType::of::<P>());
        self
    }

    /// Exclude a member from the mapping, including an inherited one.
    pub fn ignore(&mut self, member: &str) -> &mut Self {
        self.ignored.push(member.to_string());
        self
    }

    /// Declare the primary-key member.
    pub fn primary_key<T: TypeInfo>(&mut self, member: &str) -> FieldBuilder<'_> {
        self.push(member, FieldKind::PrimaryKey, T::SQL_TYPE, false)
    }

    /// Declare a plain column.
    pub fn column<T: TypeInfo>(&mut self, member: &str) -> FieldBuilder<'_> {
        self.push(member, FieldKind::Column, T::SQL_TYPE, T::NULLABLE)
    }

    /// Declare an enumeration column stored as its ordinal.
    pub fn enumeration<E: OrdinalEnum>(&mut self, member: &str) -> FieldBuilder<'_> {
        let builder = self.push(member, FieldKind::Column, SqlType::Integer, false);
        builder.field.ordinal_enum = true;
        builder
    }

    /// Declare a single related object stored as a foreign-key column here.
    pub fn reference<M: Model + Default>(&mut self, member: &str) -> FieldBuilder<'_> {
        let target = ModelType::of::<M>();
        self.push(member, FieldKind::Reference(target), SqlType::BigInt, true)
    }

    /// Declare a collection whose foreign-key column lives on `M`'s table.
    ///
    /// Set the remote column with [`FieldBuilder::column_name`].
    pub fn one_to_many<M: Model + Default>(&mut self, member: &str) -> FieldBuilder<'_> {
        let target = ModelType::of::<M>();
        self.push(member, FieldKind::OneToMany(target), SqlType::BigInt, true)
    }

    /// Declare a collection linked through a junction table.
    ///
    /// The near column (referencing this entity) defaults to the member name;
    /// set it with [`FieldBuilder::column_name`].
    pub fn many_to_many<M: Model + Default>(
        &mut self,
        member: &str,
        junction: &str,
        remote_column: &str,
    ) -> FieldBuilder<'_> {
        let kind = FieldKind::ManyToMany {
            target: ModelType::of::<M>(),
            junction: junction.to_string(),
            remote_column: remote_column.to_string(),
        };
        self.push(member, kind, SqlType::BigInt, true)
    }

    fn push(
        &mut self,
        member: &str,
        kind: FieldKind,
        sql_type: SqlType,
        nullable: bool,
    ) -> FieldBuilder<'_> {
        let mut field = Field::new(self.model, member, kind, sql_type);
        field.nullable = nullable;
        self.fields.push(field);
        let index = self.fields.len() - 1;
        FieldBuilder {
            field: &mut self.fields[index],
        }
    }

    pub(crate) fn build(self) -> Result<Entity> {
        let EntityBuilder {
            model,
            table_name,
            parent,
            fields: declared,
            ignored,
        } = self;

        if parent == Some(model) {
            return Err(Error::config(format!(
                "model `{}` cannot extend itself",
                model.name()
            )));
        }

        let mut fields: Vec<Field> = Vec::with_capacity(declared.len());
        for field in declared {
            if fields.iter().any(|f| f.member == field.member) {
                return Err(Error::config(format!(
                    "member `{}` of `{}` is declared twice",
                    field.member,
                    model.name()
                )));
            }
            fields.push(field);
        }

        let base = parent.map(describe_type).transpose()?;
        if let Some(base) = &base {
            for inherited in base.fields() {
                if fields.iter().any(|f| f.member == inherited.member) {
                    continue;
                }
                let mut copy = inherited.clone();
                copy.owner = model;
                copy.inherited = !copy.is_primary_key();
                fields.push(copy);
            }
        }

        fields.retain(|f| !ignored.contains(&f.member));

        let mut keys = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_primary_key())
            .map(|(i, _)| i);
        let primary_key = match (keys.next(), keys.next()) {
            (Some(index), None) => index,
            (None, _) => {
                return Err(Error::config(format!(
                    "model `{}` declares no primary key",
                    model.name()
                )));
            }
            (Some(_), Some(_)) => {
                return Err(Error::config(format!(
                    "model `{}` declares more than one primary key",
                    model.name()
                )));
            }
        };

        if let Some(base) = &base {
            let key = &fields[primary_key];
            if !key
                .column_name
                .eq_ignore_ascii_case(base.primary_key().column_name())
            {
                return Err(Error::config(format!(
                    "primary key `{}` of `{}` must share the column name `{}` of its parent",
                    key.column_name,
                    model.name(),
                    base.primary_key().column_name()
                )));
            }
        }

        let table_name = table_name.unwrap_or_else(|| model.name().to_uppercase());
        validate_identifier("table", &table_name)?;

        for (i, field) in fields.iter().enumerate() {
            validate_identifier("column", &field.column_name)?;
            if let FieldKind::ManyToMany {
                junction,
                remote_column,
                ..
            } = &field.kind
            {
                validate_identifier("junction table", junction)?;
                validate_identifier("column", remote_column)?;
            }
            if field.is_internal()
                && fields[..i].iter().any(|other| {
                    other.is_internal() && other.column_name.eq_ignore_ascii_case(&field.column_name)
                })
            {
                return Err(Error::config(format!(
                    "column `{}` is mapped twice in `{}`",
                    field.column_name,
                    model.name()
                )));
            }
        }

        Ok(Entity {
            model,
            table_name,
            fields,
            primary_key,
            parent,
        })
    }
}

/// Refines one field declaration.
#[derive(Debug)]
pub struct FieldBuilder<'a> {
    field: &'a mut Field,
}

impl FieldBuilder<'_> {
    /// Set the column name (defaults to the member name).
    pub fn column_name(self, name: &str) -> Self {
        self.field.column_name = name.to_string();
        self
    }

    /// Store the member as a different type than it has in memory.
    pub fn stored_as<S: TypeInfo>(self) -> Self {
        self.field.column_type = S::SQL_TYPE;
        self
    }

    /// Use an explicit DDL type for this column.
    pub fn db_type(self, ddl: &str) -> Self {
        self.field.db_type = Some(ddl.to_string());
        self
    }

    pub fn nullable(self, nullable: bool) -> Self {
        self.field.nullable = nullable;
        self
    }

    /// Add a UNIQUE constraint.
    pub fn unique(self) -> Self {
        self.field.unique = true;
        self
    }

    /// Set the ON DELETE policy of a foreign-key column.
    pub fn on_delete(self, action: ReferentialAction) -> Self {
        self.field.on_delete = action;
        self
    }
}
