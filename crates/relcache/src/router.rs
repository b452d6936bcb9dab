//! Statement classification and the cache-vs-delegate decision.
//!
//! Exactly two SELECT shapes are cache-eligible, kept as a closed
//! enumeration so adding a third is a deliberate change:
//!
//! ```text
//! SELECT <cols> FROM <table>
//! SELECT <cols> FROM <table> WHERE <col> = <value>
//! ```
//!
//! Keywords are case-insensitive, `<cols>` is `*` or a comma-separated
//! column list, and `<value>` may be quoted with `'` or `"`. Anything
//! else delegates to the engine.

use crate::index::IndexSet;
use crate::store::RowStore;
use relcache_core::{Result, Row};

/// The projected column set of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnList {
    /// `SELECT *`
    All,
    /// An explicit comma-separated list, trimmed, in query order.
    Named(Vec<String>),
}

/// Typed classification of a statement's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectShape {
    /// Unconditional projection over one table.
    Projection { table: String, columns: ColumnList },
    /// Projection filtered by a single column equality.
    Equality {
        table: String,
        columns: ColumnList,
        column: String,
        value: String,
    },
    /// Everything else: joins, ordering, aggregation, multiple predicates,
    /// or not a SELECT at all.
    Unsupported,
}

/// A fully materialized cache-served result: the projected column names
/// and one value vector per matching row, in row-store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Where a statement gets answered.
#[derive(Debug)]
pub enum Route {
    /// Served from the row store; the result is already materialized.
    Cached(CachedResult),
    /// Handed to the engine.
    Delegate,
}

/// Classify a statement's text. Deterministic and total: every input maps
/// to exactly one shape.
pub fn classify(sql: &str) -> SelectShape {
    let text = sql.trim();
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();

    let Some(rest) = strip_keyword(text, "SELECT") else {
        return SelectShape::Unsupported;
    };
    let Some((cols_part, after_from)) = split_at_keyword(rest, "FROM") else {
        return SelectShape::Unsupported;
    };
    let Some(columns) = parse_columns(cols_part) else {
        return SelectShape::Unsupported;
    };

    let (table, tail) = match after_from.split_once(char::is_whitespace) {
        Some((table, tail)) => (table, tail.trim_start()),
        None => (after_from, ""),
    };
    if !is_identifier(table) {
        return SelectShape::Unsupported;
    }

    if tail.is_empty() {
        return SelectShape::Projection {
            table: table.to_string(),
            columns,
        };
    }

    let Some(condition) = strip_keyword(tail, "WHERE") else {
        return SelectShape::Unsupported;
    };
    match parse_equality(condition) {
        Some((column, value)) => SelectShape::Equality {
            table: table.to_string(),
            columns,
            column,
            value,
        },
        None => SelectShape::Unsupported,
    }
}

/// Decide whether `sql` can be served from the cache, materializing the
/// projected rows if so.
///
/// Ineligible statements are not errors: an unloaded table, a missing
/// index, or a projection column absent from the cached schema all mean
/// delegation. A partial result is never produced.
pub fn route(store: &RowStore, indexes: &IndexSet, sql: &str) -> Result<Route> {
    let (table, columns, filter) = match classify(sql) {
        SelectShape::Projection { table, columns } => (table, columns, None),
        SelectShape::Equality {
            table,
            columns,
            column,
            value,
        } => (table, columns, Some((column, value))),
        SelectShape::Unsupported => {
            tracing::trace!(sql, "statement shape not cache-eligible");
            return Ok(Route::Delegate);
        }
    };

    let Some(entry) = store.get(&table) else {
        tracing::trace!(table = %table, "table not loaded, delegating");
        return Ok(Route::Delegate);
    };

    let names: Vec<String> = match &columns {
        ColumnList::All => entry.columns.names().to_vec(),
        ColumnList::Named(cols) => cols.clone(),
    };
    let mut selected = Vec::with_capacity(names.len());
    for name in &names {
        match entry.columns.index_of(name) {
            Some(i) => selected.push(i),
            None => {
                tracing::debug!(table = %table, column = %name, "projection column not cached, delegating");
                return Ok(Route::Delegate);
            }
        }
    }

    let rows: Vec<Vec<String>> = match &filter {
        None => entry.rows.iter().map(|row| project(row, &selected)).collect(),
        Some((column, value)) => {
            if !indexes.fresh(store, &table, column) {
                tracing::debug!(table = %table, column = %column, "no index for equality filter, delegating");
                return Ok(Route::Delegate);
            }
            let positions = indexes.lookup(store, &table, column, value)?;
            positions
                .iter()
                .filter_map(|&pos| entry.rows.get(pos))
                .map(|row| project(row, &selected))
                .collect()
        }
    };

    tracing::debug!(table = %table, rows = rows.len(), "serving query from cache");
    Ok(Route::Cached(CachedResult {
        columns: names,
        rows,
    }))
}

/// The table a write statement targets, if it is a write.
///
/// Used to evict that table's cache before the write is acknowledged.
pub fn write_target(sql: &str) -> Option<String> {
    let mut tokens = sql.split_whitespace();
    let first = tokens.next()?.to_ascii_uppercase();
    let table = match first.as_str() {
        // INSERT [OR <action>] INTO <table>, REPLACE INTO <table>
        "INSERT" | "REPLACE" => {
            let mut token = tokens.next()?;
            while !token.eq_ignore_ascii_case("INTO") {
                token = tokens.next()?;
            }
            tokens.next()?
        }
        // UPDATE [OR <action>] <table>
        "UPDATE" => {
            let mut token = tokens.next()?;
            if token.eq_ignore_ascii_case("OR") {
                tokens.next()?;
                token = tokens.next()?;
            }
            token
        }
        // DELETE FROM <table>
        "DELETE" => {
            let token = tokens.next()?;
            if !token.eq_ignore_ascii_case("FROM") {
                return None;
            }
            tokens.next()?
        }
        // DDL: only the TABLE forms touch cached state
        "DROP" | "ALTER" | "CREATE" => {
            let mut token = tokens.next()?;
            while !token.eq_ignore_ascii_case("TABLE") {
                if token.eq_ignore_ascii_case("INDEX")
                    || token.eq_ignore_ascii_case("VIEW")
                    || token.eq_ignore_ascii_case("TRIGGER")
                {
                    return None;
                }
                token = tokens.next()?;
            }
            let mut token = tokens.next()?;
            while token.eq_ignore_ascii_case("IF")
                || token.eq_ignore_ascii_case("NOT")
                || token.eq_ignore_ascii_case("EXISTS")
            {
                token = tokens.next()?;
            }
            token
        }
        _ => return None,
    };
    clean_table_token(table)
}

/// Quote an identifier for statement text built from caller-supplied names.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn project(row: &Row, selected: &[usize]) -> Vec<String> {
    selected
        .iter()
        .map(|&i| row.get(i).unwrap_or_default().to_string())
        .collect()
}

/// Strip a leading keyword (case-insensitive) and the whitespace after it.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let prefix = text.get(..keyword.len())?;
    if !prefix.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &text[keyword.len()..];
    match rest.chars().next() {
        Some(c) if c.is_whitespace() => Some(rest.trim_start()),
        _ => None,
    }
}

/// Split at the first whitespace-delimited occurrence of a keyword,
/// returning the trimmed halves.
fn split_at_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let lower = text.to_ascii_lowercase();
    let needle = keyword.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut start = 0;
    while let Some(found) = lower[start..].find(&needle) {
        let at = start + found;
        let end = at + needle.len();
        let before_ok = at == 0 || bytes[at - 1].is_ascii_whitespace();
        let after_ok = end == bytes.len() || bytes[end].is_ascii_whitespace();
        if before_ok && after_ok {
            return Some((text[..at].trim(), text[end..].trim()));
        }
        start = at + 1;
    }
    None
}

fn parse_columns(text: &str) -> Option<ColumnList> {
    if text == "*" {
        return Some(ColumnList::All);
    }
    let mut columns = Vec::new();
    for part in text.split(',') {
        let name = part.trim();
        if !is_identifier(name) {
            return None;
        }
        columns.push(name.to_string());
    }
    Some(ColumnList::Named(columns))
}

fn parse_equality(condition: &str) -> Option<(String, String)> {
    let (left, right) = condition.split_once('=')?;
    let column = left.trim();
    if !is_identifier(column) {
        return None;
    }
    let value = parse_value(right.trim())?;
    Some((column.to_string(), value))
}

/// A single literal: quoted with `'` or `"`, or one bare token. Embedded
/// quotes or trailing tokens (boolean combinators) disqualify the shape.
fn parse_value(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let bytes = raw.as_bytes();
    let quote = bytes[0];
    if raw.len() >= 2 && (quote == b'\'' || quote == b'"') && bytes[raw.len() - 1] == quote {
        let inner = &raw[1..raw.len() - 1];
        if inner.bytes().any(|b| b == quote) {
            return None;
        }
        return Some(inner.to_string());
    }
    if raw
        .chars()
        .any(|c| c.is_whitespace() || c == '\'' || c == '"')
    {
        return None;
    }
    Some(raw.to_string())
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_star_projection() {
        assert_eq!(
            classify("SELECT * FROM Lexeme"),
            SelectShape::Projection {
                table: "Lexeme".to_string(),
                columns: ColumnList::All,
            }
        );
    }

    #[test]
    fn classifies_column_list_with_whitespace() {
        assert_eq!(
            classify("select form ,  pos from Lexeme ;"),
            SelectShape::Projection {
                table: "Lexeme".to_string(),
                columns: ColumnList::Named(vec!["form".to_string(), "pos".to_string()]),
            }
        );
    }

    #[test]
    fn classifies_equality_with_quoted_values() {
        let expected = SelectShape::Equality {
            table: "Lexeme".to_string(),
            columns: ColumnList::Named(vec!["form".to_string()]),
            column: "pos".to_string(),
            value: "Noun".to_string(),
        };
        assert_eq!(
            classify("SELECT form FROM Lexeme WHERE pos = \"Noun\""),
            expected
        );
        assert_eq!(
            classify("SELECT form FROM Lexeme WHERE pos = 'Noun'"),
            expected
        );
        assert_eq!(
            classify("select form from lexeme where pos = Noun"),
            SelectShape::Equality {
                table: "lexeme".to_string(),
                columns: ColumnList::Named(vec!["form".to_string()]),
                column: "pos".to_string(),
                value: "Noun".to_string(),
            }
        );
    }

    #[test]
    fn quoted_value_keeps_spaces() {
        assert_eq!(
            classify("SELECT a FROM t WHERE b = 'two words'"),
            SelectShape::Equality {
                table: "t".to_string(),
                columns: ColumnList::Named(vec!["a".to_string()]),
                column: "b".to_string(),
                value: "two words".to_string(),
            }
        );
    }

    #[test]
    fn rejects_everything_else() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "SELECT * FROM a JOIN b ON a.id = b.id",
            "SELECT * FROM t ORDER BY id",
            "SELECT count(id) FROM t",
            "SELECT * FROM t WHERE a = 1 AND b = 2",
            "SELECT * FROM t WHERE a > 1",
            "SELECT * FROM t LIMIT 5",
            "SELECT FROM t",
            "SELECT *",
            "",
        ] {
            assert_eq!(classify(sql), SelectShape::Unsupported, "sql: {sql}");
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let sql = "SELECT form FROM Lexeme WHERE pos = 'Noun'";
        assert_eq!(classify(sql), classify(sql));
    }

    #[test]
    fn write_targets() {
        assert_eq!(
            write_target("INSERT INTO Lexeme (form) VALUES ('x')").as_deref(),
            Some("Lexeme")
        );
        assert_eq!(
            write_target("insert or ignore into t values (1)").as_deref(),
            Some("t")
        );
        assert_eq!(write_target("UPDATE t SET a = 1").as_deref(), Some("t"));
        assert_eq!(write_target("DELETE FROM t WHERE a = 1").as_deref(), Some("t"));
        assert_eq!(write_target("DROP TABLE IF EXISTS t").as_deref(), Some("t"));
        assert_eq!(write_target("ALTER TABLE t ADD COLUMN x TEXT").as_deref(), Some("t"));
        assert_eq!(
            write_target("CREATE TABLE t (id INTEGER)").as_deref(),
            Some("t")
        );
        assert_eq!(write_target("INSERT INTO t(a,b) VALUES (1,2)").as_deref(), Some("t"));

        assert_eq!(write_target("SELECT * FROM t"), None);
        assert_eq!(write_target("CREATE INDEX ix ON t (a)"), None);
        assert_eq!(write_target("BEGIN"), None);
    }

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("t"), "\"t\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    mod routing {
        use super::*;
        use relcache_sqlite::{Engine, EngineConfig};
        use std::rc::Rc;

        fn fixture() -> (Rc<Engine>, RowStore, IndexSet) {
            let engine = Rc::new(Engine::open(&EngineConfig::memory()).unwrap());
            engine
                .exec("CREATE TABLE Lexeme (id INTEGER PRIMARY KEY, form TEXT, pos TEXT)")
                .unwrap();
            engine
                .exec(
                    "INSERT INTO Lexeme (form, pos) VALUES
                     ('walk', 'Verb'), ('dog', 'Noun'), ('tree', 'Noun')",
                )
                .unwrap();
            let mut store = RowStore::new();
            store.load(&engine, &["Lexeme"]).unwrap();
            let mut indexes = IndexSet::new();
            indexes.build(&store, "Lexeme", "pos").unwrap();
            (engine, store, indexes)
        }

        #[test]
        fn unconditional_projection_serves_all_rows() {
            let (_engine, store, indexes) = fixture();
            match route(&store, &indexes, "SELECT form FROM Lexeme").unwrap() {
                Route::Cached(result) => {
                    assert_eq!(result.columns, ["form"]);
                    assert_eq!(result.rows, [["walk"], ["dog"], ["tree"]]);
                }
                Route::Delegate => panic!("expected cache serve"),
            }
        }

        #[test]
        fn star_projects_all_columns_in_schema_order() {
            let (_engine, store, indexes) = fixture();
            match route(&store, &indexes, "SELECT * FROM Lexeme").unwrap() {
                Route::Cached(result) => {
                    assert_eq!(result.columns, ["id", "form", "pos"]);
                    assert_eq!(result.rows[0], ["1", "walk", "Verb"]);
                }
                Route::Delegate => panic!("expected cache serve"),
            }
        }

        #[test]
        fn equality_uses_index_buckets() {
            let (_engine, store, indexes) = fixture();
            match route(
                &store,
                &indexes,
                "SELECT form FROM Lexeme WHERE pos = 'Noun'",
            )
            .unwrap()
            {
                Route::Cached(result) => {
                    assert_eq!(result.rows, [["dog"], ["tree"]]);
                }
                Route::Delegate => panic!("expected cache serve"),
            }
        }

        #[test]
        fn equality_miss_is_empty_not_delegate() {
            let (_engine, store, indexes) = fixture();
            match route(
                &store,
                &indexes,
                "SELECT form FROM Lexeme WHERE pos = 'Adverb'",
            )
            .unwrap()
            {
                Route::Cached(result) => assert!(result.rows.is_empty()),
                Route::Delegate => panic!("expected cache serve"),
            }
        }

        #[test]
        fn missing_index_delegates() {
            let (_engine, store, indexes) = fixture();
            assert!(matches!(
                route(
                    &store,
                    &indexes,
                    "SELECT form FROM Lexeme WHERE form = 'dog'"
                )
                .unwrap(),
                Route::Delegate
            ));
        }

        #[test]
        fn unknown_projection_column_delegates() {
            let (_engine, store, indexes) = fixture();
            assert!(matches!(
                route(&store, &indexes, "SELECT form, stem FROM Lexeme").unwrap(),
                Route::Delegate
            ));
        }

        #[test]
        fn unloaded_table_delegates() {
            let (_engine, store, indexes) = fixture();
            assert!(matches!(
                route(&store, &indexes, "SELECT * FROM Other").unwrap(),
                Route::Delegate
            ));
        }
    }
}
