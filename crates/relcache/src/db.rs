//! The cache-aware database wrapper.

use crate::cursor::{CachedCursor, Cursor, EngineCursor};
use crate::dump;
use crate::index::IndexSet;
use crate::router::{self, Route};
use crate::store::RowStore;
use relcache_core::{Error, Result, Value};
use relcache_sqlite::{Engine, EngineConfig, EnginePool, Statement};
use std::io::Write;
use std::rc::Rc;

/// A wrapper over the shared engine connection with a per-instance table
/// cache.
///
/// Reads that match a supported shape and hit a loaded table are answered
/// from memory; everything else is delegated to the engine. Every write
/// through this wrapper evicts the targeted table's cached rows and
/// indices before it is acknowledged, so the cache never answers from a
/// state the engine has left behind.
pub struct CacheDb {
    pool: Rc<EnginePool>,
    engine: Option<Rc<Engine>>,
    store: RowStore,
    indexes: IndexSet,
    in_transaction: bool,
}

impl CacheDb {
    /// Open the shared connection (or attach to it, if another wrapper
    /// already opened it) at `path`.
    pub fn open(pool: &Rc<EnginePool>, path: &str) -> Result<Self> {
        Self::open_with(pool, &EngineConfig::file(path))
    }

    /// Open with full engine configuration.
    pub fn open_with(pool: &Rc<EnginePool>, config: &EngineConfig) -> Result<Self> {
        let engine = pool.open(config)?;
        Ok(Self::wrap(pool, engine))
    }

    /// Attach to the connection another wrapper already opened.
    pub fn attach(pool: &Rc<EnginePool>) -> Result<Self> {
        let engine = pool.attach()?;
        Ok(Self::wrap(pool, engine))
    }

    fn wrap(pool: &Rc<EnginePool>, engine: Rc<Engine>) -> Self {
        Self {
            pool: Rc::clone(pool),
            engine: Some(engine),
            store: RowStore::new(),
            indexes: IndexSet::new(),
            in_transaction: false,
        }
    }

    fn engine(&self) -> Result<&Rc<Engine>> {
        self.engine.as_ref().ok_or(Error::NoConnection)
    }

    /// Release this wrapper's reference to the shared connection; the
    /// native close happens when the last wrapper releases. A close that
    /// stays busy surfaces here, with the pool keeping its final
    /// reference so the caller can finalize cursors and release again.
    pub fn close(&mut self) -> Result<()> {
        if self.engine.take().is_some() {
            self.store.clear();
            self.indexes.clear();
            self.in_transaction = false;
            self.pool.release()?;
        }
        Ok(())
    }

    // ---- cache management ----

    /// Materialize the named engine tables into the row store.
    pub fn load(&mut self, tables: &[&str]) -> Result<()> {
        let engine = Rc::clone(self.engine()?);
        for table in tables {
            self.indexes.drop_table(table);
        }
        self.store.load(&engine, tables)
    }

    /// Drop a table's cached rows and every index built over them.
    pub fn evict(&mut self, table: &str) {
        self.store.evict(table);
        self.indexes.drop_table(table);
    }

    /// Whether a table is currently materialized.
    pub fn is_cached(&self, table: &str) -> bool {
        self.store.is_loaded(table)
    }

    /// Build (or rebuild) the equality index for `table.column`.
    pub fn build_index(&mut self, table: &str, column: &str) -> Result<()> {
        self.indexes.build(&self.store, table, column)
    }

    /// Drop the index for `table.column`. Returns whether one existed.
    pub fn drop_index(&mut self, table: &str, column: &str) -> bool {
        self.indexes.drop_index(table, column)
    }

    // ---- statements ----

    /// Run a statement, serving it from the cache when eligible.
    ///
    /// The returned cursor is engine-backed or cache-backed; both obey the
    /// same contract. A statement recognized as a write evicts its target
    /// table before reaching the engine.
    pub fn query(&mut self, sql: &str) -> Result<Cursor> {
        let engine = Rc::clone(self.engine()?);
        if let Some(table) = router::write_target(sql) {
            self.evict(&table);
        }
        match router::route(&self.store, &self.indexes, sql)? {
            Route::Cached(result) => Ok(Cursor::Cached(CachedCursor::new(result))),
            Route::Delegate => {
                let stmt = Statement::prepare(&engine, sql)?;
                Ok(Cursor::Engine(EngineCursor::new(stmt)))
            }
        }
    }

    /// Execute a statement to completion, returning the changed-row count.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        let engine = Rc::clone(self.engine()?);
        if let Some(table) = router::write_target(sql) {
            self.evict(&table);
        }
        engine.exec(sql)?;
        engine.changes()
    }

    /// Execute a statement with bound parameters.
    pub fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let engine = Rc::clone(self.engine()?);
        if let Some(table) = router::write_target(sql) {
            self.evict(&table);
        }
        let mut stmt = Statement::prepare(&engine, sql)?;
        for (slot, value) in params.iter().enumerate() {
            stmt.bind(slot + 1, value)?;
        }
        while stmt.step()? {}
        stmt.finalize()?;
        engine.changes()
    }

    /// Row identifier assigned by the most recent INSERT.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        self.engine()?.last_insert_rowid()
    }

    // ---- transaction control ----

    /// Begin a transaction. Nested begin is a caller error.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::invariant("BEGIN while a transaction is open"));
        }
        self.engine()?.exec("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::invariant("COMMIT without an open transaction"));
        }
        self.engine()?.exec("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::invariant("ROLLBACK without an open transaction"));
        }
        self.engine()?.exec("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }

    /// Whether a transaction is open on this wrapper.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // ---- bulk transfer ----

    /// Export the named engine tables as a line-oriented dump.
    pub fn export_dump<W: Write>(
        &mut self,
        tables: &[&str],
        out: &mut W,
        mut progress: impl FnMut(u8),
    ) -> Result<()> {
        let engine = Rc::clone(self.engine()?);
        dump::export(&engine, tables, out, &mut progress)
    }

    /// Import a dump produced by `export_dump`, replacing each table it
    /// names. Imported tables leave the cache; a failed import clears the
    /// whole cache, since the engine may already have replaced tables the
    /// error message does not name.
    pub fn import_dump(&mut self, text: &str, mut progress: impl FnMut(u8)) -> Result<()> {
        let engine = Rc::clone(self.engine()?);
        match dump::import(&engine, text, &mut progress) {
            Ok(tables) => {
                for table in &tables {
                    self.evict(table);
                }
                Ok(())
            }
            Err(err) => {
                self.store.clear();
                self.indexes.clear();
                Err(err)
            }
        }
    }
}

impl Drop for CacheDb {
    fn drop(&mut self) {
        if self.engine.take().is_some() {
            let _ = self.pool.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Step;

    fn open_db() -> (Rc<EnginePool>, CacheDb) {
        let pool = Rc::new(EnginePool::new());
        let mut db = CacheDb::open(&pool, ":memory:").unwrap();
        db.execute("CREATE TABLE Lexeme (id INTEGER PRIMARY KEY, form TEXT, pos TEXT)")
            .unwrap();
        db.execute(
            "INSERT INTO Lexeme (form, pos) VALUES ('walk', 'Verb'), ('dog', 'Noun')",
        )
        .unwrap();
        (pool, db)
    }

    #[test]
    fn query_serves_from_cache_after_load() {
        let (_pool, mut db) = open_db();
        db.load(&["Lexeme"]).unwrap();

        let cursor = db.query("SELECT form FROM Lexeme").unwrap();
        assert!(cursor.is_cached());
    }

    #[test]
    fn write_evicts_and_next_query_delegates() {
        let (_pool, mut db) = open_db();
        db.load(&["Lexeme"]).unwrap();
        db.build_index("Lexeme", "pos").unwrap();

        db.execute("INSERT INTO Lexeme (form, pos) VALUES ('tree', 'Noun')")
            .unwrap();
        assert!(!db.is_cached("Lexeme"));

        let mut cursor = db.query("SELECT form FROM Lexeme WHERE pos = 'Noun'").unwrap();
        assert!(!cursor.is_cached());
        let mut forms = Vec::new();
        while cursor.next().unwrap() == Step::Row {
            forms.push(cursor.column_text(0).unwrap());
        }
        assert_eq!(forms, ["dog", "tree"]);
    }

    #[test]
    fn execute_with_binds_parameters() {
        let (_pool, mut db) = open_db();
        let changed = db
            .execute_with(
                "INSERT INTO Lexeme (form, pos) VALUES (?1, ?2)",
                &[Value::Text("run".to_string()), Value::Text("Verb".to_string())],
            )
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(db.last_insert_rowid().unwrap(), 3);
    }

    #[test]
    fn nested_begin_is_invariant_violation() {
        let (_pool, mut db) = open_db();
        db.begin().unwrap();
        assert!(matches!(db.begin(), Err(Error::Invariant(_))));
        db.rollback().unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn commit_without_begin_is_invariant_violation() {
        let (_pool, mut db) = open_db();
        assert!(matches!(db.commit(), Err(Error::Invariant(_))));
        assert!(matches!(db.rollback(), Err(Error::Invariant(_))));
    }

    #[test]
    fn transaction_rolls_back_writes() {
        let (_pool, mut db) = open_db();
        db.begin().unwrap();
        db.execute("INSERT INTO Lexeme (form, pos) VALUES ('x', 'Y')")
            .unwrap();
        db.rollback().unwrap();

        let mut cursor = db.query("SELECT COUNT(*) FROM Lexeme").unwrap();
        assert_eq!(cursor.next().unwrap(), Step::Row);
        assert_eq!(cursor.column_i64(0).unwrap(), 2);
    }

    #[test]
    fn queries_after_close_are_no_connection() {
        let (_pool, mut db) = open_db();
        db.close().unwrap();
        assert!(matches!(db.query("SELECT 1"), Err(Error::NoConnection)));
        assert!(matches!(db.execute("SELECT 1"), Err(Error::NoConnection)));
        // Close is idempotent on an already-detached wrapper.
        db.close().unwrap();
    }
}
