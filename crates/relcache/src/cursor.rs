//! The unified row cursor over both result paths.
//!
//! A query answered by the engine yields an [`EngineCursor`] wrapping the
//! live native statement; a cache-served query yields a [`CachedCursor`]
//! over the projected rows the router materialized. Both sides implement
//! the same pull contract and are carried by the [`Cursor`] tagged union,
//! so neither path leaks state into the other.

use crate::router::CachedResult;
use relcache_core::{Error, Result};
use relcache_sqlite::Statement;

/// Result of advancing a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Positioned on a row; columns are readable.
    Row,
    /// No more rows. Further `next` calls keep returning `Done`.
    Done,
}

/// A pull-based row iterator over either result path.
#[derive(Debug)]
pub enum Cursor {
    Engine(EngineCursor),
    Cached(CachedCursor),
}

impl Cursor {
    /// Advance to the next row.
    pub fn next(&mut self) -> Result<Step> {
        match self {
            Cursor::Engine(c) => c.next(),
            Cursor::Cached(c) => Ok(c.next()),
        }
    }

    /// Whether this cursor was served from the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, Cursor::Cached(_))
    }

    /// Number of result columns.
    pub fn column_count(&self) -> usize {
        match self {
            Cursor::Engine(c) => c.column_count(),
            Cursor::Cached(c) => c.column_count(),
        }
    }

    /// Result column name at the 0-based index.
    pub fn column_name(&self, index: usize) -> Option<String> {
        match self {
            Cursor::Engine(c) => c.column_name(index),
            Cursor::Cached(c) => c.column_name(index),
        }
    }

    /// Read the current row's column as a boolean.
    pub fn column_bool(&self, index: usize) -> Result<bool> {
        match self {
            Cursor::Engine(c) => c.guard().map(|s| s.column_bool(index)),
            Cursor::Cached(c) => Ok(text_to_i64(c.current(index)?) != 0),
        }
    }

    /// Read the current row's column as a 32-bit integer.
    pub fn column_i32(&self, index: usize) -> Result<i32> {
        match self {
            Cursor::Engine(c) => c.guard().map(|s| s.column_i32(index)),
            Cursor::Cached(c) => Ok(text_to_i64(c.current(index)?) as i32),
        }
    }

    /// Read the current row's column as a 64-bit integer.
    pub fn column_i64(&self, index: usize) -> Result<i64> {
        match self {
            Cursor::Engine(c) => c.guard().map(|s| s.column_i64(index)),
            Cursor::Cached(c) => Ok(text_to_i64(c.current(index)?)),
        }
    }

    /// Read the current row's column as text.
    pub fn column_text(&self, index: usize) -> Result<String> {
        match self {
            Cursor::Engine(c) => c.guard().map(|s| s.column_text(index)),
            Cursor::Cached(c) => Ok(c.current(index)?.to_string()),
        }
    }

    /// Release the underlying statement or row set. Idempotent.
    pub fn finalize(&mut self) -> Result<()> {
        match self {
            Cursor::Engine(c) => c.finalize(),
            Cursor::Cached(c) => {
                c.finalize();
                Ok(())
            }
        }
    }
}

/// Cursor over a live native statement.
#[derive(Debug)]
pub struct EngineCursor {
    stmt: Option<Statement>,
    on_row: bool,
    done: bool,
}

impl EngineCursor {
    pub fn new(stmt: Statement) -> Self {
        Self {
            stmt: Some(stmt),
            on_row: false,
            done: false,
        }
    }

    fn next(&mut self) -> Result<Step> {
        if self.done {
            return Ok(Step::Done);
        }
        let Some(stmt) = self.stmt.as_mut() else {
            return Ok(Step::Done);
        };
        match stmt.step() {
            Ok(true) => {
                self.on_row = true;
                Ok(Step::Row)
            }
            Ok(false) => {
                self.on_row = false;
                self.done = true;
                Ok(Step::Done)
            }
            Err(err) => {
                self.on_row = false;
                Err(err)
            }
        }
    }

    /// The statement, only while positioned on a row.
    fn guard(&self) -> Result<&Statement> {
        if !self.on_row {
            return Err(Error::CursorExhausted);
        }
        self.stmt.as_ref().ok_or(Error::CursorExhausted)
    }

    fn column_count(&self) -> usize {
        self.stmt.as_ref().map_or(0, Statement::column_count)
    }

    fn column_name(&self, index: usize) -> Option<String> {
        self.stmt.as_ref().and_then(|s| s.column_name(index))
    }

    fn finalize(&mut self) -> Result<()> {
        self.on_row = false;
        self.done = true;
        if let Some(mut stmt) = self.stmt.take() {
            stmt.finalize()?;
        }
        Ok(())
    }
}

/// Cursor over rows the router materialized from the cache.
///
/// Every projected value is already present, so column reads never go
/// back to the row store and eviction cannot invalidate a live cursor.
#[derive(Debug)]
pub struct CachedCursor {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    pos: Option<usize>,
    done: bool,
}

impl CachedCursor {
    pub fn new(result: CachedResult) -> Self {
        Self {
            columns: result.columns,
            rows: result.rows,
            pos: None,
            done: false,
        }
    }

    fn next(&mut self) -> Step {
        if self.done {
            return Step::Done;
        }
        let next = self.pos.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.pos = Some(next);
            Step::Row
        } else {
            self.pos = None;
            self.done = true;
            Step::Done
        }
    }

    /// The current row's value at `index`. Out-of-range column indices
    /// read as empty, matching the engine's lenient column access.
    fn current(&self, index: usize) -> Result<&str> {
        let row = self
            .pos
            .and_then(|p| self.rows.get(p))
            .ok_or(Error::CursorExhausted)?;
        Ok(row.get(index).map_or("", String::as_str))
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<String> {
        self.columns.get(index).cloned()
    }

    fn finalize(&mut self) {
        self.rows.clear();
        self.pos = None;
        self.done = true;
    }
}

/// Text-to-integer coercion with the engine's rules: optional sign, then
/// the longest leading digit run; anything else reads as 0.
fn text_to_i64(text: &str) -> i64 {
    let t = text.trim_start();
    let (negative, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return 0;
    }
    match digits[..end].parse::<i64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        // out of range saturates
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    }
}
