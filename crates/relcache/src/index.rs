//! Secondary equality indices over cached tables.

use crate::store::RowStore;
use relcache_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};

const NO_ROWS: &[usize] = &[];

/// One value -> row-positions multi-map over a single column.
///
/// Positions refer into the row store entry whose generation stamp the
/// index carries; they are logical references, never pointers into the
/// row vector, so an eviction or reload can only make the index stale,
/// never dangling. A stale index fails loudly on lookup.
struct TableIndex {
    generation: u64,
    buckets: BTreeMap<String, Vec<usize>>,
}

/// All built indices, keyed by table then column.
pub struct IndexSet {
    indexes: HashMap<String, HashMap<String, TableIndex>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self {
            indexes: HashMap::new(),
        }
    }

    /// Build (or rebuild) the index for `table.column` from the current
    /// row store contents. Ties on equal values keep row order.
    pub fn build(&mut self, store: &RowStore, table: &str, column: &str) -> Result<()> {
        let entry = store
            .get(table)
            .ok_or_else(|| Error::no_such_table(table))?;
        let col = entry
            .columns
            .index_of(column)
            .ok_or_else(|| Error::missing_column(table, column))?;

        let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (pos, row) in entry.rows.iter().enumerate() {
            let value = row
                .get(col)
                .ok_or_else(|| Error::missing_column(table, column))?;
            buckets.entry(value.to_string()).or_default().push(pos);
        }

        tracing::debug!(table, column, keys = buckets.len(), "built secondary index");
        self.indexes.entry(table.to_string()).or_default().insert(
            column.to_string(),
            TableIndex {
                generation: entry.generation,
                buckets,
            },
        );
        Ok(())
    }

    /// Whether an index exists for `table.column` and matches the current
    /// load of the table.
    pub fn fresh(&self, store: &RowStore, table: &str, column: &str) -> bool {
        match (self.get(table, column), store.get(table)) {
            (Some(ix), Some(entry)) => ix.generation == entry.generation,
            _ => false,
        }
    }

    /// Whether an index has been built for `table.column` at all.
    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.get(table, column).is_some()
    }

    /// Ordered positions of the rows whose `column` equals `value`; empty
    /// when the value is absent. Looking through an index whose table was
    /// reloaded since the build is an invariant violation, not a silent
    /// read of the wrong rows.
    pub fn lookup(
        &self,
        store: &RowStore,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<&[usize]> {
        let ix = self.get(table, column).ok_or_else(|| {
            Error::invariant(format!("no index built for {table}.{column}"))
        })?;
        let entry = store
            .get(table)
            .ok_or_else(|| Error::no_such_table(table))?;
        if ix.generation != entry.generation {
            return Err(Error::invariant(format!(
                "index {table}.{column} is stale: table was reloaded after the build"
            )));
        }
        Ok(ix.buckets.get(value).map_or(NO_ROWS, Vec::as_slice))
    }

    /// Drop every index built over `table`.
    pub fn drop_table(&mut self, table: &str) {
        if self.indexes.remove(table).is_some() {
            tracing::debug!(table, "dropped table indices");
        }
    }

    /// Drop the index for `table.column`. Returns whether one existed.
    pub fn drop_index(&mut self, table: &str, column: &str) -> bool {
        let Some(columns) = self.indexes.get_mut(table) else {
            return false;
        };
        let dropped = columns.remove(column).is_some();
        if columns.is_empty() {
            self.indexes.remove(table);
        }
        dropped
    }

    /// Drop every index.
    pub fn clear(&mut self) {
        self.indexes.clear();
    }

    fn get(&self, table: &str, column: &str) -> Option<&TableIndex> {
        self.indexes.get(table).and_then(|m| m.get(column))
    }
}

impl Default for IndexSet {
    fn default() -> Self {
        Self::new()
    }
}
