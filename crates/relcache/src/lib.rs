//! relcache — an embedded in-memory table cache in front of SQLite.
//!
//! The cache materializes whole tables into memory, builds equality
//! indices over chosen columns, answers a constrained subset of SELECT
//! statements from the in-memory copy, and transparently delegates
//! everything else to the engine. Writes evict the targeted table's
//! cached state before they are acknowledged, and both result paths are
//! served through one cursor type.
//!
//! # Quick start
//!
//! ```
//! use relcache::{CacheDb, EnginePool, Step};
//! use std::rc::Rc;
//!
//! # fn main() -> relcache::Result<()> {
//! let pool = Rc::new(EnginePool::new());
//! let mut db = CacheDb::open(&pool, ":memory:")?;
//! db.execute("CREATE TABLE Lexeme (id INTEGER PRIMARY KEY, form TEXT, pos TEXT)")?;
//! db.execute("INSERT INTO Lexeme (form, pos) VALUES ('dog', 'Noun'), ('walk', 'Verb')")?;
//!
//! db.load(&["Lexeme"])?;
//! db.build_index("Lexeme", "pos")?;
//!
//! let mut cursor = db.query("SELECT form FROM Lexeme WHERE pos = 'Noun'")?;
//! assert!(cursor.is_cached());
//! while cursor.next()? == Step::Row {
//!     assert_eq!(cursor.column_text(0)?, "dog");
//! }
//! cursor.finalize()?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod db;
pub mod dump;
pub mod index;
pub mod router;
pub mod store;

pub use cursor::{CachedCursor, Cursor, EngineCursor, Step};
pub use db::CacheDb;
pub use index::IndexSet;
pub use router::{CachedResult, ColumnList, Route, SelectShape};
pub use store::{RowStore, TableEntry};

pub use relcache_core::{
    CacheError, CacheErrorKind, ColumnInfo, EngineError, EngineErrorKind, Error, ImportError,
    Progress, Result, Row, Value,
};
pub use relcache_sqlite::{Engine, EngineConfig, EnginePool, OpenFlags, Statement, engine_version};
