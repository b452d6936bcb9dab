//! The native engine connection and one-shot prepared statements.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]

use crate::types;
use libsqlite3_sys as ffi;
use relcache_core::{
    Error, Result, Value,
    error::{EngineError, EngineErrorKind},
};
use std::cell::Cell;
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::rc::Rc;

/// Bounded number of native close attempts while the engine reports busy.
const CLOSE_RETRIES: usize = 3;

// `sqlite3_close_v2` is present in the linked (bundled) SQLite library but is
// not emitted by the `libsqlite3-sys` bindings in use here, so declare the
// binding directly.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut ffi::sqlite3) -> c_int;
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
}

impl OpenFlags {
    /// Flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Flags for read-write access with creation if needed.
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
        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

/// Configuration for opening the engine connection.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the database file, or ":memory:".
    pub path: String,
    /// Open flags.
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl EngineConfig {
    /// Config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// One native engine connection.
///
/// Holds the raw `sqlite3` handle; neither `Send` nor `Sync` by
/// construction. Shared ownership goes through [`crate::EnginePool`],
/// which hands out `Rc<Engine>` clones.
pub struct Engine {
    db: Cell<*mut ffi::sqlite3>,
    path: String,
}

impl Engine {
    /// Open a connection with the given configuration.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Engine(EngineError {
                kind: EngineErrorKind::Open,
                code: ffi::SQLITE_MISUSE,
                message: "path contains a null byte".to_string(),
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: we pass valid pointers and check the return value.
        let rc = unsafe {
            ffi::sqlite3_open_v2(
                c_path.as_ptr(),
                &mut db,
                config.flags.to_sqlite_flags(),
                ptr::null(),
            )
        };

        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                error_string(rc)
            } else {
                // SAFETY: db is non-null; errmsg returns a valid C string
                // that we copy before closing the half-open handle.
                unsafe {
                    let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            return Err(report(EngineErrorKind::Open, rc, message));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is a valid open handle.
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "opened engine connection");
        Ok(Self {
            db: Cell::new(db),
            path: config.path.clone(),
        })
    }

    /// The database path this connection was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the native handle is still open.
    pub fn is_open(&self) -> bool {
        !self.db.get().is_null()
    }

    fn handle(&self) -> Result<*mut ffi::sqlite3> {
        let db = self.db.get();
        if db.is_null() {
            Err(Error::NoConnection)
        } else {
            Ok(db)
        }
    }

    /// Execute a statement that produces no result rows (DDL, writes,
    /// transaction control).
    pub fn exec(&self, sql: &str) -> Result<()> {
        let db = self.handle()?;
        let c_sql = CString::new(sql).map_err(|_| {
            Error::Engine(EngineError {
                kind: EngineErrorKind::Exec,
                code: ffi::SQLITE_MISUSE,
                message: "statement contains a null byte".to_string(),
            })
        })?;

        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();
        // SAFETY: all pointers are valid; errmsg is freed below if set.
        let rc = unsafe {
            ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let message = if errmsg.is_null() {
                error_string(rc)
            } else {
                // SAFETY: errmsg is a valid engine-allocated C string.
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            return Err(report(EngineErrorKind::Exec, self.extended_errcode(), message));
        }
        Ok(())
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> Result<u64> {
        let db = self.handle()?;
        // SAFETY: db is a valid open handle.
        Ok(unsafe { ffi::sqlite3_changes(db) } as u64)
    }

    /// Row identifier assigned by the most recent INSERT.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let db = self.handle()?;
        // SAFETY: db is a valid open handle.
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(db) })
    }

    /// Extended native error code of the most recent failure, 0 when closed.
    pub fn extended_errcode(&self) -> i32 {
        let db = self.db.get();
        if db.is_null() {
            return 0;
        }
        // SAFETY: db is a valid open handle.
        unsafe { ffi::sqlite3_extended_errcode(db) }
    }

    /// Close the native connection.
    ///
    /// The engine reports busy while prepared statements are still open;
    /// the close is retried a bounded number of times and the busy state
    /// surfaces as an error if it persists. On success the handle is gone
    /// and every further operation fails with `NoConnection`.
    pub fn close(&self) -> Result<()> {
        let db = self.handle()?;
        let mut rc = ffi::SQLITE_OK;
        for _ in 0..CLOSE_RETRIES {
            // SAFETY: db is a valid open handle until close returns OK.
            rc = unsafe { ffi::sqlite3_close(db) };
            if rc == ffi::SQLITE_OK {
                self.db.set(ptr::null_mut());
                tracing::debug!(path = %self.path, "closed engine connection");
                return Ok(());
            }
            if rc != ffi::SQLITE_BUSY && rc != ffi::SQLITE_LOCKED {
                break;
            }
        }
        Err(report(
            EngineErrorKind::Close,
            rc,
            if rc == ffi::SQLITE_BUSY || rc == ffi::SQLITE_LOCKED {
                "statements still open".to_string()
            } else {
                error_string(rc)
            },
        ))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let db = self.db.get();
        if !db.is_null() {
            // SAFETY: db is a valid open handle; close_v2 defers the actual
            // close until the last statement is finalized.
            unsafe {
                sqlite3_close_v2(db);
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

/// A one-shot prepared statement: bind, step, finalize.
///
/// Keeps the engine alive through a shared handle so the statement can
/// never outlive its connection.
pub struct Statement {
    engine: Rc<Engine>,
    stmt: *mut ffi::sqlite3_stmt,
}

impl Statement {
    /// Compile `sql` against the engine.
    pub fn prepare(engine: &Rc<Engine>, sql: &str) -> Result<Self> {
        let db = engine.handle()?;
        let c_sql = CString::new(sql).map_err(|_| {
            Error::Engine(EngineError {
                kind: EngineErrorKind::Prepare,
                code: ffi::SQLITE_MISUSE,
                message: "statement contains a null byte".to_string(),
            })
        })?;

        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: all pointers are valid.
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
            return Err(report(
                EngineErrorKind::Prepare,
                engine.extended_errcode(),
                errmsg(db),
            ));
        }

        Ok(Self {
            engine: Rc::clone(engine),
            stmt,
        })
    }

    fn stmt(&self) -> Result<*mut ffi::sqlite3_stmt> {
        if self.stmt.is_null() {
            Err(Error::NoConnection)
        } else {
            Ok(self.stmt)
        }
    }

    /// Bind a parameter by its 1-based index.
    pub fn bind(&mut self, index: usize, value: &Value) -> Result<()> {
        let stmt = self.stmt()?;
        // SAFETY: stmt is valid and index is forwarded as a 1-based slot.
        let rc = unsafe { types::bind_value(stmt, index as c_int, value) };
        if rc != ffi::SQLITE_OK {
            let db = self.engine.handle()?;
            return Err(report(
                EngineErrorKind::Bind,
                self.engine.extended_errcode(),
                format!("parameter {}: {}", index, errmsg(db)),
            ));
        }
        Ok(())
    }

    /// Advance to the next row. `Ok(true)` when positioned on a row,
    /// `Ok(false)` when the statement is done.
    pub fn step(&mut self) -> Result<bool> {
        let stmt = self.stmt()?;
        // SAFETY: stmt is a valid, unfinalized statement.
        let rc = unsafe { ffi::sqlite3_step(stmt) };
        match rc {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            _ => {
                let db = self.engine.handle()?;
                Err(report(
                    EngineErrorKind::Step,
                    self.engine.extended_errcode(),
                    errmsg(db),
                ))
            }
        }
    }

    /// Number of result columns.
    pub fn column_count(&self) -> usize {
        if self.stmt.is_null() {
            return 0;
        }
        // SAFETY: stmt is a valid statement.
        unsafe { ffi::sqlite3_column_count(self.stmt) as usize }
    }

    /// Result column name at the 0-based index.
    pub fn column_name(&self, index: usize) -> Option<String> {
        if self.stmt.is_null() {
            return None;
        }
        // SAFETY: stmt is a valid statement.
        unsafe { types::column_name(self.stmt, index as c_int) }
    }

    /// Read the current row's column as a typed value.
    pub fn column_value(&self, index: usize) -> Value {
        if self.stmt.is_null() {
            return Value::Null;
        }
        // SAFETY: callers only read columns while positioned on a row.
        unsafe { types::read_column(self.stmt, index as c_int) }
    }

    /// Read the current row's column in text form (NULL reads as "").
    pub fn column_text(&self, index: usize) -> String {
        if self.stmt.is_null() {
            return String::new();
        }
        // SAFETY: callers only read columns while positioned on a row.
        unsafe { types::column_text(self.stmt, index as c_int) }
    }

    /// Read the current row's column as a 64-bit integer.
    pub fn column_i64(&self, index: usize) -> i64 {
        if self.stmt.is_null() {
            return 0;
        }
        // SAFETY: callers only read columns while positioned on a row.
        unsafe { ffi::sqlite3_column_int64(self.stmt, index as c_int) }
    }

    /// Read the current row's column as a 32-bit integer.
    pub fn column_i32(&self, index: usize) -> i32 {
        self.column_i64(index) as i32
    }

    /// Read the current row's column as a boolean (nonzero integer).
    pub fn column_bool(&self, index: usize) -> bool {
        self.column_i64(index) != 0
    }

    /// Release the native statement. Idempotent.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.stmt.is_null() {
            // SAFETY: stmt is a valid, unfinalized statement. The return
            // code repeats the most recent step error, already surfaced.
            unsafe {
                ffi::sqlite3_finalize(self.stmt);
            }
            self.stmt = ptr::null_mut();
        }
        Ok(())
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("finalized", &self.stmt.is_null())
            .finish()
    }
}

fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: db is a valid open handle; errmsg returns a valid C string.
    unsafe {
        CStr::from_ptr(ffi::sqlite3_errmsg(db))
            .to_string_lossy()
            .into_owned()
    }
}

fn error_string(code: c_int) -> String {
    // SAFETY: errstr returns a static string for any code.
    unsafe {
        CStr::from_ptr(ffi::sqlite3_errstr(code))
            .to_string_lossy()
            .into_owned()
    }
}

/// Build an engine error, writing it to the log sink on the way out.
fn report(kind: EngineErrorKind, code: i32, message: String) -> Error {
    tracing::warn!(?kind, code, %message, "engine error");
    Error::Engine(EngineError {
        kind,
        code,
        message,
    })
}
