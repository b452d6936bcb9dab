//! Materialized table rows.
//!
//! The row store holds every value in its text form; type-directed reads
//! happen at the cursor, mirroring the engine's own coercion rules.

use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared by all rows of a cached table.
///
/// Wrapped in `Arc` so every row of a table shares one copy.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in schema order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// All column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single cached row: text values over shared column metadata.
///
/// Rows are immutable once stored; the row store removes them only through
/// eviction, never in place.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<String>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a row with its own column metadata.
    ///
    /// For multiple rows of the same table, prefer `with_columns` to share
    /// the metadata.
    pub fn new(column_names: Vec<String>, values: Vec<String>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a row over shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<String>) -> Self {
        Self { values, columns }
    }

    /// The shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Number of values in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value by column index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Value by column name.
    pub fn get_named(&self, name: &str) -> Option<&str> {
        self.columns.index_of(name).and_then(|i| self.get(i))
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Iterate over (column name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}
