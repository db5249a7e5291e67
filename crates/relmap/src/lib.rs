//! relmap - object-relational mapping for plain Rust structs.
//!
//! relmap maps a graph of model types onto relational tables:
//!
//! - Models describe their columns and relationships once, through an
//!   explicit [`EntityBuilder`] registration step
//! - Registering one type pulls in its base types and everything reachable
//!   through its relationships
//! - Inheritance is stored as one table per level, joined on the shared
//!   primary key
//! - Reads keep one in-memory instance per primary key, even across cyclic
//!   relationships
//! - Saves of unchanged objects are skipped using content fingerprints
//!
//! # Quick Start
//!
//! ```ignore
//! use relmap::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Genre {
//!     id: i32,
//!     name: String,
//! }
//!
//! impl Model for Genre {
//!     fn describe(entity: &mut EntityBuilder) {
//!         entity.primary_key::<i32>("id").column_name("ID");
//!         entity.column::<String>("name").column_name("NAME").unique();
//!     }
//!
//!     fn get(&self, member: &str) -> Option<Member> {
//!         Some(match member {
//!             "id" => Member::value(self.id),
//!             "name" => Member::value(self.name.clone()),
//!             _ => return None,
//!         })
//!     }
//!
//!     fn set(&mut self, member: &str, value: Member) -> Result<()> {
//!         match member {
//!             "id" => self.id = value.into_value()?,
//!             "name" => self.name = value.into_value()?,
//!             _ => return Err(unknown_member::<Self>(member)),
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut mapper = Mapper::new(SqliteConnection::open_memory()?);
//! mapper.register::<Genre>()?;
//! mapper.ensure_created()?;
//!
//! mapper.save(&shared(Genre { id: 1, name: "Horror".into() }))?;
//! let horror = mapper.read::<Genre>(1)?;
//!
//! let matches = mapper
//!     .query::<Genre>()?
//!     .filter()
//!     .like("NAME", "h%")
//!     .execute()?;
//! ```
//!
//! # Errors
//!
//! Any statement that fails against the database surfaces as
//! [`Error::DataAccess`], wrapping the driver's error. Problems found while
//! describing models surface as [`Error::Config`] before any SQL is run.

pub use relmap_core::{
    Command, Connection, DataAccessError, Dialect, Entity, EntityBuilder, Error, Field,
    FieldBuilder, FieldKind, Member, Model, ModelType, ObjectRef, OrdinalEnum, QueryError,
    QueryErrorKind, ReferentialAction, Result, Row, Shared, SqlType, TransactionError,
    TransactionErrorKind, TypeInfo, Value, describe, resolve, shared, unknown_member,
};

pub use relmap_query::{CompareOp, Expr, Filter, LockMode};

pub use relmap_schema::{create_commands, drop_commands};

pub use relmap_session::{Cache, Mapper, MapperConfig, ObjectCache, Query};

#[cfg(feature = "sqlite")]
pub use relmap_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

/// Everything needed to declare models and drive a mapper.
pub mod prelude {
    pub use crate::{
        Connection, EntityBuilder, Error, LockMode, Mapper, MapperConfig, Member, Model,
        OrdinalEnum, ReferentialAction, Result, Shared, Value, shared, unknown_member,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::{SqliteConfig, SqliteConnection};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[derive(Debug, Default)]
    struct Tag {
        label: String,
    }

    impl Model for Tag {
        fn describe(entity: &mut EntityBuilder) {
            entity.table("TAGS");
            entity.primary_key::<String>("label");
        }

        fn get(&self, member: &str) -> Option<Member> {
            match member {
                "label" => Some(Member::value(self.label.clone())),
                _ => None,
            }
        }

        fn set(&mut self, member: &str, value: Member) -> Result<()> {
            match member {
                "label" => self.label = value.into_value()?,
                _ => return Err(unknown_member::<Self>(member)),
            }
            Ok(())
        }
    }

    #[test]
    fn test_prelude_describes_models() {
        let entity = crate::describe::<Tag>().unwrap();
        assert_eq!(entity.table_name(), "TAGS");
        assert_eq!(entity.primary_key().member(), "label");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_prelude_drives_sqlite() {
        let mut mapper = Mapper::new(SqliteConnection::open_memory().unwrap());
        mapper.register::<Tag>().unwrap();
        mapper.ensure_created().unwrap();

        mapper
            .save(&shared(Tag {
                label: "rust".to_string(),
            }))
            .unwrap();
        mapper.clear_cache();

        let tag = mapper.read::<Tag>("rust").unwrap().unwrap();
        assert_eq!(tag.borrow().label, "rust");
    }
}
