//! Value encoding and decoding between Rust and SQLite columns.

// Casts here match C types exactly
#![allow(clippy::cast_possible_truncation)]

use libsqlite3_sys as ffi;
use relcache_core::Value;
use std::ffi::{CStr, c_int};

/// Bind a [`Value`] to a prepared statement parameter.
///
/// # Safety
/// - `stmt` must be a valid, non-null prepared statement handle
/// - `index` must be a valid 1-based parameter index
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    // SAFETY: caller guarantees stmt and index; text/blob use the TRANSIENT
    // destructor so SQLite copies the buffer before we return.
    unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(stmt, index),
            Value::Integer(v) => ffi::sqlite3_bind_int64(stmt, index, *v),
            Value::Real(v) => ffi::sqlite3_bind_double(stmt, index, *v),
            Value::Text(s) => ffi::sqlite3_bind_text(
                stmt,
                index,
                s.as_bytes().as_ptr().cast(),
                s.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            ),
            Value::Blob(b) => ffi::sqlite3_bind_blob(
                stmt,
                index,
                b.as_ptr().cast(),
                b.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            ),
        }
    }
}

/// Read a column as a typed [`Value`] by its storage class.
///
/// # Safety
/// - `stmt` must be a valid statement that has just returned `SQLITE_ROW`
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: caller guarantees stmt is positioned on a row.
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => Value::Integer(ffi::sqlite3_column_int64(stmt, index)),
            ffi::SQLITE_FLOAT => Value::Real(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => Value::Text(column_text(stmt, index)),
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() || len == 0 {
                    Value::Blob(Vec::new())
                } else {
                    let slice = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Blob(slice.to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Read a column in its text form, letting SQLite coerce non-text storage
/// classes. NULL reads as the empty string.
///
/// # Safety
/// - `stmt` must be a valid statement that has just returned `SQLITE_ROW`
/// - `index` must be a valid 0-based column index
pub unsafe fn column_text(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> String {
    // SAFETY: caller guarantees stmt is positioned on a row; column_bytes
    // reports the length of the buffer column_text just produced.
    unsafe {
        let ptr = ffi::sqlite3_column_text(stmt, index);
        if ptr.is_null() {
            return String::new();
        }
        let len = ffi::sqlite3_column_bytes(stmt, index);
        let slice = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
        String::from_utf8_lossy(slice).into_owned()
    }
}

/// Column name at `index`, if the statement exposes one.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: caller guarantees stmt; the returned pointer is valid until
    // the statement is finalized, and we copy out of it immediately.
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            CStr::from_ptr(ptr).to_str().ok().map(String::from)
        }
    }
}
