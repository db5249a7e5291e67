//! Core types and traits for relmap.
//!
//! This crate provides the foundations every other relmap crate builds on:
//!
//! - [`Value`] and [`Row`] for dynamically typed column data
//! - [`Connection`] and [`Command`], the blocking contract a driver fulfils
//! - [`Model`], [`Member`] and [`ObjectRef`] for runtime member access
//! - [`Entity`] and [`Field`] descriptors, built once per type by [`describe`]
//! - [`resolve`], which collects every entity reachable from a root type

pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod graph;
pub mod identifiers;
pub mod model;
pub mod registry;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Command, Connection, Dialect};
pub use entity::{Entity, EntityBuilder, FieldBuilder};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, DataAccessError, Error, QueryError,
    QueryErrorKind, Result, TransactionError, TransactionErrorKind, TypeError,
};
pub use field::{Field, FieldKind, ReferentialAction};
pub use graph::{dedupe_by_table, resolve};
pub use identifiers::{is_plain_identifier, validate_identifier};
pub use model::{Member, Model, ModelType, ObjectRef, Shared, shared, unknown_member};
pub use registry::{describe, describe_type};
pub use row::{ColumnInfo, Row};
pub use types::{OrdinalEnum, SqlType, TypeInfo};
pub use value::Value;
