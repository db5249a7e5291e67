//! Model trait and shared object handles.
//!
//! A model declares its mapping once in [`Model::describe`] and exposes its
//! members dynamically through [`Model::get`] and [`Model::set`]. Live
//! objects are shared as [`Shared<T>`] so that one row materializes as
//! exactly one instance, even when relationships cycle back to it.
//!
//! Inheritance is expressed by composition: a derived model embeds its
//! parent, calls [`EntityBuilder::extends`](crate::EntityBuilder::extends)
//! in `describe`, and forwards members it does not own to the embedded
//! parent.

use crate::entity::EntityBuilder;
use crate::error::{Error, Result, TypeError};
use crate::types::OrdinalEnum;
use crate::value::Value;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A shared, mutable model instance.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a model instance for sharing with a mapper.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A type that maps to a database table.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default)]
/// struct Genre {
///     id: i32,
///     name: String,
///     books: Vec<Shared<Book>>,
/// }
///
/// impl Model for Genre {
///     fn describe(entity: &mut EntityBuilder) {
///         entity.primary_key::<i32>("id").column_name("Id");
///         entity.column::<String>("name").column_name("GNAME").unique();
///         entity.one_to_many::<Book>("books").column_name("GID");
///     }
///
///     fn get(&self, member: &str) -> Option<Member> {
///         Some(match member {
///             "id" => Member::value(self.id),
///             "name" => Member::value(self.name.clone()),
///             "books" => Member::list(&self.books),
///             _ => return None,
///         })
///     }
///
///     fn set(&mut self, member: &str, value: Member) -> Result<()> {
///         match member {
///             "id" => self.id = value.into_value()?,
///             "name" => self.name = value.into_value()?,
///             "books" => self.books = value.into_list()?,
///             _ => return Err(unknown_member::<Self>(member)),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Model: Any {
    /// Declare the table mapping for this type.
    fn describe(entity: &mut EntityBuilder)
    where
        Self: Sized;

    /// Read a mapped member, or `None` if this type has no such member.
    fn get(&self, member: &str) -> Option<Member>;

    /// Write a mapped member.
    fn set(&mut self, member: &str, value: Member) -> Result<()>;
}

/// Error for a member name a model does not recognize.
pub fn unknown_member<T: ?Sized>(member: &str) -> Error {
    Error::config(format!(
        "model `{}` has no member `{}`",
        simple_type_name(std::any::type_name::<T>()),
        member
    ))
}

/// Strip module path and generic arguments from a type name.
pub(crate) fn simple_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Runtime handle to a model type: identity, name and constructors.
#[derive(Clone, Copy)]
pub struct ModelType {
    id: TypeId,
    name: &'static str,
    describe: fn(&mut EntityBuilder),
    create: fn() -> ObjectRef,
}

impl ModelType {
    /// The handle for `T`.
    pub fn of<T: Model + Default>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: simple_type_name(std::any::type_name::<T>()),
            describe: T::describe,
            create: || ObjectRef::new(&shared(T::default())),
        }
    }

    /// The `TypeId` of the model.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The simple (unqualified) type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Allocate a default instance.
    pub fn create(&self) -> ObjectRef {
        (self.create)()
    }

    pub(crate) fn describe_into(&self, builder: &mut EntityBuilder) {
        (self.describe)(builder);
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelType {}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType").field(&self.name).finish()
    }
}

/// A type-erased, shared handle to a live model object.
#[derive(Clone)]
pub struct ObjectRef {
    model: Rc<RefCell<dyn Model>>,
    any: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ObjectRef {
    /// Erase a shared model instance.
    pub fn new<T: Model>(object: &Shared<T>) -> Self {
        let model: Rc<RefCell<dyn Model>> = object.clone();
        let any: Rc<dyn Any> = object.clone();
        Self {
            model,
            any,
            type_id: TypeId::of::<T>(),
            type_name: simple_type_name(std::any::type_name::<T>()),
        }
    }

    /// The concrete model type behind this handle.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The concrete model type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recover the typed handle.
    pub fn downcast<T: Model>(&self) -> Result<Shared<T>> {
        Rc::clone(&self.any)
            .downcast::<RefCell<T>>()
            .map_err(|_| {
                Error::Type(TypeError {
                    expected: std::any::type_name::<T>(),
                    actual: self.type_name.to_string(),
                    column: None,
                    rust_type: None,
                })
            })
    }

    /// Read a member of the object.
    pub fn get(&self, member: &str) -> Result<Member> {
        let object = self.model.try_borrow().map_err(|_| self.busy())?;
        object
            .get(member)
            .ok_or_else(|| unknown_member_of(self.type_name, member))
    }

    /// Write a member of the object.
    pub fn set(&self, member: &str, value: Member) -> Result<()> {
        let mut object = self.model.try_borrow_mut().map_err(|_| self.busy())?;
        object.set(member, value)
    }

    /// Do both handles point at the same instance?
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.any), Rc::as_ptr(&other.any))
    }

    fn busy(&self) -> Error {
        Error::Custom(format!(
            "`{}` instance is mutably borrowed elsewhere",
            self.type_name
        ))
    }
}

fn unknown_member_of(type_name: &str, member: &str) -> Error {
    Error::config(format!("model `{}` has no member `{}`", type_name, member))
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:p})", self.type_name, Rc::as_ptr(&self.any))
    }
}

/// The runtime value of one mapped member.
#[derive(Debug, Clone)]
pub enum Member {
    /// A scalar column value.
    Value(Value),
    /// A single related object (scalar foreign key).
    Ref(Option<ObjectRef>),
    /// A collection of related objects.
    List(Vec<ObjectRef>),
}

impl Member {
    /// A scalar member.
    pub fn value(value: impl Into<Value>) -> Self {
        Member::Value(value.into())
    }

    /// An enumeration member, carried as its ordinal.
    pub fn ordinal<E: OrdinalEnum>(value: &E) -> Self {
        Member::Value(Value::Int(value.ordinal()))
    }

    /// A single-reference member.
    pub fn reference<T: Model>(value: &Option<Shared<T>>) -> Self {
        Member::Ref(value.as_ref().map(ObjectRef::new))
    }

    /// A collection member.
    pub fn list<T: Model>(items: &[Shared<T>]) -> Self {
        Member::List(items.iter().map(ObjectRef::new).collect())
    }

    /// Borrow the scalar value, if this is a scalar member.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Member::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Extract a typed scalar.
    pub fn into_value<T>(self) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        match self {
            Member::Value(v) => T::try_from(v),
            other => Err(other.mismatch("scalar value")),
        }
    }

    /// Extract an enumeration from its ordinal.
    pub fn into_enum<E: OrdinalEnum>(self) -> Result<E> {
        let ordinal: i32 = self.into_value()?;
        E::from_ordinal(ordinal).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<E>(),
                actual: format!("unknown ordinal {}", ordinal),
                column: None,
                rust_type: Some(std::any::type_name::<E>()),
            })
        })
    }

    /// Extract a single reference.
    pub fn into_ref<T: Model>(self) -> Result<Option<Shared<T>>> {
        match self {
            Member::Ref(r) => r.map(|o| o.downcast::<T>()).transpose(),
            Member::Value(Value::Null) => Ok(None),
            other => Err(other.mismatch("object reference")),
        }
    }

    /// Extract a collection of references.
    pub fn into_list<T: Model>(self) -> Result<Vec<Shared<T>>> {
        match self {
            Member::List(items) => items.iter().map(ObjectRef::downcast::<T>).collect(),
            Member::Value(Value::Null) => Ok(Vec::new()),
            other => Err(other.mismatch("object list")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        let actual = match self {
            Member::Value(v) => v.type_name().to_string(),
            Member::Ref(_) => "object reference".to_string(),
            Member::List(_) => "object list".to_string(),
        };
        Error::Type(TypeError {
            expected,
            actual,
            column: None,
            rust_type: None,
        })
    }
}
