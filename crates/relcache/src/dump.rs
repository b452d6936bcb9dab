//! Line-oriented bulk transfer between engine tables and text dumps.
//!
//! Dump format: per table, a name line, a `|`-joined header line, one
//! `|`-joined line per row, then a blank separator line. The first header
//! column is the 64-bit row identifier; on import it becomes an
//! auto-assigned INTEGER PRIMARY KEY, so identifiers re-sequence.

use crate::router::quote_ident;
use relcache_core::{Error, ImportError, Progress, Result, Value};
use relcache_sqlite::{Engine, Statement};
use std::io::Write;
use std::rc::Rc;

/// Write the named tables to `out`.
///
/// Progress is cumulative rows written over the total row count across
/// all tables; 100 is always reported at completion.
pub fn export<W: Write>(
    engine: &Rc<Engine>,
    tables: &[&str],
    out: &mut W,
    progress: &mut dyn FnMut(u8),
) -> Result<()> {
    let mut progress = Progress::new(progress);

    let mut total = 0u64;
    for table in tables {
        total += count_rows(engine, table)?;
    }

    let mut written = 0u64;
    for table in tables {
        let mut stmt =
            Statement::prepare(engine, &format!("SELECT * FROM {}", quote_ident(table)))?;
        let columns: Vec<String> = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).unwrap_or_default())
            .collect();

        writeln!(out, "{}", table)?;
        writeln!(out, "{}", columns.join("|"))?;
        while stmt.step()? {
            let fields: Vec<String> = (0..columns.len()).map(|i| stmt.column_text(i)).collect();
            writeln!(out, "{}", fields.join("|"))?;
            written += 1;
            progress.report(written, total);
        }
        writeln!(out)?;
        tracing::debug!(table = %table, "exported table");
    }

    progress.finish();
    Ok(())
}

/// Read a dump, replacing every table it names. Returns the imported
/// table names in dump order.
///
/// Each table's rows are inserted inside one transaction; a data line
/// whose field count differs from its header aborts the whole import
/// after rolling that transaction back. Progress is characters consumed
/// over the total text length.
pub fn import(
    engine: &Rc<Engine>,
    text: &str,
    progress: &mut dyn FnMut(u8),
) -> Result<Vec<String>> {
    let mut progress = Progress::new(progress);
    let total = text.len() as u64;
    let mut consumed = 0u64;

    let lines: Vec<&str> = text.lines().collect();
    let mut imported = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            consumed += lines[i].len() as u64 + 1;
            progress.report(consumed, total);
            i += 1;
            continue;
        }

        let table = lines[i].trim().to_string();
        if i + 1 >= lines.len() {
            // name line without a header line
            return Err(Error::Import(ImportError {
                line: i + 2,
                expected: 1,
                found: 0,
            }));
        }
        let header: Vec<&str> = lines[i + 1].split('|').collect();
        consumed += lines[i].len() as u64 + lines[i + 1].len() as u64 + 2;
        i += 2;

        create_table(engine, &table, &header)?;
        let insert = insert_sql(&table, &header);

        engine.exec("BEGIN")?;
        while i < lines.len() && !lines[i].trim().is_empty() {
            let fields: Vec<&str> = lines[i].split('|').collect();
            if fields.len() != header.len() {
                let _ = engine.exec("ROLLBACK");
                return Err(Error::Import(ImportError {
                    line: i + 1,
                    expected: header.len(),
                    found: fields.len(),
                }));
            }
            if let Err(err) = insert_row(engine, &insert, &fields[1..]) {
                let _ = engine.exec("ROLLBACK");
                return Err(err);
            }
            consumed += lines[i].len() as u64 + 1;
            progress.report(consumed, total);
            i += 1;
        }
        engine.exec("COMMIT")?;

        tracing::debug!(table = %table, "imported table");
        imported.push(table);
    }

    progress.finish();
    Ok(imported)
}

fn count_rows(engine: &Rc<Engine>, table: &str) -> Result<u64> {
    let mut stmt = Statement::prepare(
        engine,
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
    )?;
    if stmt.step()? {
        Ok(stmt.column_i64(0) as u64)
    } else {
        Ok(0)
    }
}

fn create_table(engine: &Rc<Engine>, table: &str, header: &[&str]) -> Result<()> {
    engine.exec(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
    let mut ddl = format!(
        "CREATE TABLE {} ({} INTEGER PRIMARY KEY",
        quote_ident(table),
        quote_ident(header[0])
    );
    for column in &header[1..] {
        ddl.push_str(&format!(", {} TEXT", quote_ident(column)));
    }
    ddl.push(')');
    engine.exec(&ddl)
}

fn insert_sql(table: &str, header: &[&str]) -> String {
    if header.len() == 1 {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table));
    }
    let columns: Vec<String> = header[1..].iter().map(|c| quote_ident(c)).collect();
    let slots: Vec<String> = (1..header.len()).map(|n| format!("?{}", n)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        slots.join(", ")
    )
}

fn insert_row(engine: &Rc<Engine>, sql: &str, fields: &[&str]) -> Result<()> {
    let mut stmt = Statement::prepare(engine, sql)?;
    for (slot, field) in fields.iter().enumerate() {
        stmt.bind(slot + 1, &Value::Text((*field).to_string()))?;
    }
    while stmt.step()? {}
    stmt.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_skips_identifier_column() {
        assert_eq!(
            insert_sql("T", &["id", "a", "b"]),
            "INSERT INTO \"T\" (\"a\", \"b\") VALUES (?1, ?2)"
        );
        assert_eq!(insert_sql("T", &["id"]), "INSERT INTO \"T\" DEFAULT VALUES");
    }
}
