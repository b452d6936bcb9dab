//! SQLite engine layer for the relcache table cache.
//!
//! Wraps the raw C API from `libsqlite3-sys` behind a safe, synchronous
//! surface: [`Engine`] owns one native connection, [`Statement`] is a
//! one-shot prepared statement (bind, step, finalize), and [`EnginePool`]
//! is the pool-of-one that shares a single connection across wrapper
//! instances by explicit reference counting.
//!
//! Everything here is single-threaded by construction: the handle types
//! hold raw pointers and are neither `Send` nor `Sync`.

mod engine;
mod pool;
mod types;

pub use engine::{Engine, EngineConfig, OpenFlags, Statement};
pub use pool::EnginePool;

/// The SQLite library version string.
pub fn engine_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static NUL-terminated string.
    unsafe {
        let ptr = libsqlite3_sys::sqlite3_libversion();
        std::ffi::CStr::from_ptr(ptr).to_str().unwrap_or("unknown")
    }
}
