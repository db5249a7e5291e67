//! Statement builders for relmap.
//!
//! Every builder here is a pure mapping from entity metadata (and, for
//! writes, a live object) to [`Command`]s. Nothing touches a connection.
//!
//! - [`dml`]: upsert, delete, row locks and relationship maintenance
//! - [`select`]: the base read query and relationship lookups
//! - [`expr`] and [`filter`]: predicate trees for ad-hoc queries

pub mod dml;
pub mod expr;
pub mod filter;
pub mod select;

#[cfg(test)]
pub(crate) mod testing;

pub use dml::{LockMode, delete, lock, reference_commands, upsert};
pub use expr::{CompareOp, Expr, Token, parse};
pub use filter::Filter;
pub use select::{base_select, foreign_key_query, select_by_key};

pub use relmap_core::Command;
