//! SQLite driver for relmap.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements the blocking `Connection` trait from relmap-core on top of a
//! statically linked SQLite.
//!
//! # Example
//!
//! ```rust,ignore
//! use relmap_core::{Command, Connection};
//! use relmap_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (ID INTEGER PRIMARY KEY, NAME TEXT)")?;
//! conn.execute(&Command::new("INSERT INTO users (NAME) VALUES (:name)").bind(":name", "Alice"))?;
//! ```
//!
//! # Parameters
//!
//! Statements use named parameters (`:name`). Each placeholder is bound from
//! the command's parameter of the same name, so a name may appear several
//! times in one statement. Positional `?` parameters are rejected.
//!
//! # Errors
//!
//! Constraint failures carry the matching SQLSTATE: `23503` for foreign-key
//! violations and `23505` for unique and primary-key violations.
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`, using internal mutex
//! synchronization to protect the underlying SQLite handle.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
