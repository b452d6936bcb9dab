//! The row store: in-memory materialization of engine tables.

use crate::router::quote_ident;
use relcache_core::{ColumnInfo, Result, Row};
use relcache_sqlite::{Engine, Statement};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// One materialized table: column schema plus rows in load order.
///
/// Every load gets a fresh generation stamp. Indices remember the stamp
/// they were built against, so a reference into an evicted or reloaded
/// table can be detected instead of silently reading the wrong rows.
pub struct TableEntry {
    pub generation: u64,
    pub columns: Arc<ColumnInfo>,
    pub rows: Vec<Row>,
}

/// Ordered rows per table name; the cache's single owner of row data.
pub struct RowStore {
    tables: HashMap<String, TableEntry>,
    next_generation: u64,
}

impl RowStore {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Materialize the named tables with a full scan each.
    ///
    /// Prior entries for the named tables are dropped first. The scans are
    /// staged and committed together, so a failing scan leaves none of the
    /// named tables partially loaded.
    pub fn load(&mut self, engine: &Rc<Engine>, tables: &[&str]) -> Result<()> {
        for name in tables {
            self.tables.remove(*name);
        }
        let mut staged = Vec::with_capacity(tables.len());
        for name in tables {
            staged.push(((*name).to_string(), self.scan(engine, name)?));
        }
        for (name, entry) in staged {
            self.tables.insert(name, entry);
        }
        Ok(())
    }

    fn scan(&mut self, engine: &Rc<Engine>, table: &str) -> Result<TableEntry> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let mut stmt = Statement::prepare(engine, &sql)?;

        // The column list comes from the statement schema, once.
        let names: Vec<String> = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).unwrap_or_else(|| format!("col{}", i)))
            .collect();
        let columns = Arc::new(ColumnInfo::new(names));

        let mut rows = Vec::new();
        while stmt.step()? {
            let values = (0..columns.len()).map(|i| stmt.column_text(i)).collect();
            rows.push(Row::with_columns(Arc::clone(&columns), values));
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        tracing::debug!(table, rows = rows.len(), generation, "loaded table into cache");
        Ok(TableEntry {
            generation,
            columns,
            rows,
        })
    }

    /// Drop a table's cached rows. Returns whether an entry existed.
    /// The caller is responsible for dropping the table's indices with it.
    pub fn evict(&mut self, table: &str) -> bool {
        let evicted = self.tables.remove(table).is_some();
        if evicted {
            tracing::debug!(table, "evicted table from cache");
        }
        evicted
    }

    /// Drop every cached table.
    pub fn clear(&mut self) {
        self.tables.clear();
    }

    /// The cached entry for a table, if loaded.
    pub fn get(&self, table: &str) -> Option<&TableEntry> {
        self.tables.get(table)
    }

    /// Whether a table is currently cached.
    pub fn is_loaded(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Names of the currently cached tables.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new()
    }
}
