//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing the blocking
//! [`Connection`] contract from relmap-core. Every call prepares its
//! statement, binds named parameters, steps it to completion and finalizes
//! it, on error paths too.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use crate::ffi;
use crate::types;
use relmap_core::{
    Command, Connection, ConnectionError, Dialect, ConnectionErrorKind, Error, QueryError, QueryErrorKind,
    Result, Row, row::ColumnInfo,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for an in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Enforce foreign-key constraints (`PRAGMA foreign_keys`).
    ///
    /// SQLite leaves them off by default; without them delete policies
    /// are never applied.
    pub foreign_keys: bool,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open as an in-memory database regardless of the path.
    pub memory: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.memory {
            flags |= ffi::SQLITE_OPEN_MEMORY;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Turn foreign-key enforcement on or off.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}

/// Inner state of the SQLite connection, protected by a mutex.
struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only used while the owning mutex is held, so it is
// never touched by two threads at once.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| connect_error("Invalid path: contains null byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle returned by open_v2; it is closed
                // right after the message is copied
                unsafe {
                    let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            return Err(connect_error(format!("Failed to open database: {}", msg)));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        let conn = Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        };
        if config.foreign_keys {
            conn.execute_raw("PRAGMA foreign_keys = ON")?;
        }

        tracing::debug!(
            path = %conn.path,
            foreign_keys = config.foreign_keys,
            "Opened SQLite database"
        );
        Ok(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute one or more SQL statements without parameters.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock()?;
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;
        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg was allocated by sqlite3_exec and is freed
                // after being copied
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            // SAFETY: db is valid
            let code = unsafe { ffi::sqlite3_extended_errcode(inner.db) };
            return Err(query_error(code, sql, msg));
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteInner>> {
        self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "SQLite handle poisoned by a panicking thread".to_string(),
                source: None,
            })
        })
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.lock() {
            if !inner.db.is_null() {
                // SAFETY: db is valid; every statement is finalized before
                // its call returns, so a plain close cannot report BUSY
                unsafe {
                    ffi::sqlite3_close(inner.db);
                }
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, command: &Command) -> Result<u64> {
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, command.sql())?;
        stmt.bind(command)?;
        while stmt.step()? {}

        // SAFETY: db is valid
        let changes = unsafe { ffi::sqlite3_changes(inner.db) };
        Ok(u64::try_from(changes).unwrap_or(0))
    }

    fn query(&self, command: &Command) -> Result<Vec<Row>> {
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, command.sql())?;
        stmt.bind(command)?;

        let columns = Arc::new(ColumnInfo::new(stmt.column_names()));
        let mut rows = Vec::new();
        while stmt.step()? {
            rows.push(Row::with_columns(Arc::clone(&columns), stmt.values()));
        }
        Ok(rows)
    }
}

/// A prepared statement, finalized when dropped.
struct Statement<'a> {
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    sql: &'a str,
}

impl<'a> Statement<'a> {
    fn prepare(db: *mut ffi::sqlite3, sql: &'a str) -> Result<Self> {
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut stmt,
                ptr::null_mut(),
            )
        };

        if rc != ffi::SQLITE_OK {
            return Err(last_error(db, sql));
        }
        if stmt.is_null() {
            return Err(Error::syntax(format!("no statement in `{}`", sql)));
        }
        Ok(Self { db, stmt, sql })
    }

    /// Bind every parameter slot of the statement from `command` by name.
    fn bind(&self, command: &Command) -> Result<()> {
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt) };
        for index in 1..=count {
            // SAFETY: stmt is valid and index is within 1..=count
            let name = unsafe { types::parameter_name(self.stmt, index) }
                .ok_or_else(|| self.bind_error(index, "positional parameters are not supported"))?;
            let value = command
                .param(&name)
                .ok_or_else(|| self.bind_error(index, &format!("no value for `{}`", name)))?;

            // SAFETY: stmt is valid and index is within 1..=count
            let rc = unsafe { types::bind_value(self.stmt, index, value) };
            if rc != ffi::SQLITE_OK {
                return Err(last_error(self.db, self.sql));
            }
        }
        Ok(())
    }

    /// Advance to the next row; `false` once the statement is done.
    fn step(&self) -> Result<bool> {
        // SAFETY: stmt is valid
        match unsafe { ffi::sqlite3_step(self.stmt) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            _ => Err(last_error(self.db, self.sql)),
        }
    }

    fn column_names(&self) -> Vec<String> {
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_column_count(self.stmt) };
        (0..count)
            .map(|i| {
                // SAFETY: stmt is valid and i is within 0..count
                unsafe { types::column_name(self.stmt, i) }.unwrap_or_else(|| format!("col{}", i))
            })
            .collect()
    }

    fn values(&self) -> Vec<relmap_core::Value> {
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_column_count(self.stmt) };
        (0..count)
            // SAFETY: the last step returned SQLITE_ROW and i is within 0..count
            .map(|i| unsafe { types::read_column(self.stmt, i) })
            .collect()
    }

    fn bind_error(&self, index: c_int, message: &str) -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Database,
            sql: Some(self.sql.to_string()),
            sqlstate: None,
            message: format!("Failed to bind parameter {}: {}", index, message),
            source: None,
        })
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // SAFETY: stmt came from a successful prepare and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.stmt);
        }
    }
}

// Helper functions

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

fn nul_in_sql(sql: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Syntax,
        sql: Some(sql.to_string()),
        sqlstate: None,
        message: "SQL contains null byte".to_string(),
        source: None,
    })
}

fn last_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid, errmsg returns a valid C string
    let (code, msg) = unsafe {
        let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
            .to_string_lossy()
            .into_owned();
        (ffi::sqlite3_extended_errcode(db), msg)
    };
    query_error(code, sql, msg)
}

fn query_error(code: c_int, sql: &str, message: String) -> Error {
    let (kind, sqlstate) = classify(code, &message);
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        sqlstate: sqlstate.map(String::from),
        message,
        source: None,
    })
}

/// Map an extended result code to an error kind and the matching SQLSTATE.
fn classify(code: c_int, message: &str) -> (QueryErrorKind, Option<&'static str>) {
    match code {
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => (QueryErrorKind::Constraint, Some("23503")),
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            (QueryErrorKind::Constraint, Some("23505"))
        }
        ffi::SQLITE_CONSTRAINT_NOTNULL => (QueryErrorKind::Constraint, Some("23502")),
        ffi::SQLITE_CONSTRAINT_CHECK => (QueryErrorKind::Constraint, Some("23514")),
        _ => match ffi::primary_code(code) {
            ffi::SQLITE_CONSTRAINT => (QueryErrorKind::Constraint, Some("23000")),
            ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => (QueryErrorKind::Busy, None),
            ffi::SQLITE_NOTFOUND => (QueryErrorKind::NotFound, None),
            ffi::SQLITE_ERROR if message.starts_with("no such") => {
                (QueryErrorKind::NotFound, Some("42P01"))
            }
            ffi::SQLITE_ERROR if message.contains("syntax error") => {
                (QueryErrorKind::Syntax, Some("42601"))
            }
            _ => (QueryErrorKind::Database, None),
        },
    }
}
