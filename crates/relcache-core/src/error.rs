//! Error types for relcache operations.

use std::fmt;

/// The primary error type for all relcache operations.
#[derive(Debug)]
pub enum Error {
    /// Native engine failures (open, close, prepare, bind, step, exec),
    /// carrying the native result code.
    Engine(EngineError),
    /// Operation attempted with no open engine handle.
    NoConnection,
    /// Cache lookup errors (table not loaded, column missing)
    Cache(CacheError),
    /// A cursor column was read past exhaustion or before the first row.
    CursorExhausted,
    /// A dump line did not match its block header.
    Import(ImportError),
    /// Internal consistency check failed.
    Invariant(String),
    /// I/O errors from the export writer
    Io(std::io::Error),
}

/// A failure reported by the native SQLite engine.
#[derive(Debug)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    /// Native (extended) result code.
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Failed to open the database
    Open,
    /// Failed to close the database (still busy after bounded retries)
    Close,
    /// Statement compilation failed
    Prepare,
    /// Parameter binding failed
    Bind,
    /// Stepping a statement failed
    Step,
    /// Direct statement execution failed
    Exec,
}

/// A cache-layer error naming the table (and column) involved.
#[derive(Debug)]
pub struct CacheError {
    pub kind: CacheErrorKind,
    pub table: String,
    pub column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheErrorKind {
    /// The table has not been loaded into the row store
    NoSuchTable,
    /// A row lacks the requested column
    MissingColumn,
}

/// A malformed data line encountered during dump import.
///
/// `line` is 1-based within the imported text; `expected` is the header's
/// column count and `found` the field count actually present.
#[derive(Debug)]
pub struct ImportError {
    pub line: usize,
    pub expected: usize,
    pub found: usize,
}

impl Error {
    /// Shorthand for an `Invariant` error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::Invariant(message.into())
    }

    /// Shorthand for a `NoSuchTable` cache error.
    pub fn no_such_table(table: impl Into<String>) -> Self {
        Error::Cache(CacheError {
            kind: CacheErrorKind::NoSuchTable,
            table: table.into(),
            column: None,
        })
    }

    /// Shorthand for a `MissingColumn` cache error.
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::Cache(CacheError {
            kind: CacheErrorKind::MissingColumn,
            table: table.into(),
            column: Some(column.into()),
        })
    }

    /// The native engine result code, if this is an engine error.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Error::Engine(e) => Some(e.code),
            _ => None,
        }
    }
}

impl EngineErrorKind {
    fn label(self) -> &'static str {
        match self {
            EngineErrorKind::Open => "open",
            EngineErrorKind::Close => "close",
            EngineErrorKind::Prepare => "prepare",
            EngineErrorKind::Bind => "bind",
            EngineErrorKind::Step => "step",
            EngineErrorKind::Exec => "exec",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Engine(e) => write!(f, "Engine error: {}", e),
            Error::NoConnection => write!(f, "No open connection"),
            Error::Cache(e) => write!(f, "Cache error: {}", e),
            Error::CursorExhausted => write!(f, "Cursor is exhausted"),
            Error::Import(e) => write!(f, "Import error: {}", e),
            Error::Invariant(msg) => write!(f, "Invariant violation: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed (code {}): {}",
            self.kind.label(),
            self.code,
            self.message
        )
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CacheErrorKind::NoSuchTable => {
                write!(f, "table '{}' is not loaded", self.table)
            }
            CacheErrorKind::MissingColumn => write!(
                f,
                "table '{}' has no column '{}'",
                self.table,
                self.column.as_deref().unwrap_or("?")
            ),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: expected {} fields, found {}",
            self.line, self.expected, self.found
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Error::Engine(err)
    }
}

impl From<CacheError> for Error {
    fn from(err: CacheError) -> Self {
        Error::Cache(err)
    }
}

impl From<ImportError> for Error {
    fn from(err: ImportError) -> Self {
        Error::Import(err)
    }
}

/// Result type alias for relcache operations.
pub type Result<T> = std::result::Result<T, Error>;
