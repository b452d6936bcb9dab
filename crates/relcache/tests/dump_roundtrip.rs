//! The bulk import/export pipeline and its progress contract.

use relcache::{CacheDb, EnginePool, Error, Step};
use std::rc::Rc;

fn fresh_db() -> (Rc<EnginePool>, CacheDb) {
    let pool = Rc::new(EnginePool::new());
    let db = CacheDb::open(&pool, ":memory:").unwrap();
    (pool, db)
}

fn rows_of(db: &mut CacheDb, sql: &str) -> Vec<Vec<String>> {
    let mut cursor = db.query(sql).unwrap();
    let mut rows = Vec::new();
    while cursor.next().unwrap() == Step::Row {
        rows.push(
            (0..cursor.column_count())
                .map(|i| cursor.column_text(i).unwrap())
                .collect(),
        );
    }
    rows
}

#[test]
fn import_creates_tables_and_rows_in_order() {
    let (_pool, mut db) = fresh_db();
    let dump = "T\nid|a|b\n1|x|y\n2|p|q\n";

    db.import_dump(dump, |_| {}).unwrap();

    assert_eq!(
        rows_of(&mut db, "SELECT * FROM T"),
        vec![
            vec!["1".to_string(), "x".to_string(), "y".to_string()],
            vec!["2".to_string(), "p".to_string(), "q".to_string()],
        ]
    );
}

#[test]
fn export_format_is_block_per_table() {
    let (_pool, mut db) = fresh_db();
    db.execute("CREATE TABLE T (id INTEGER PRIMARY KEY, a TEXT, b TEXT)")
        .unwrap();
    db.execute("INSERT INTO T (a, b) VALUES ('x', 'y'), ('p', 'q')")
        .unwrap();

    let mut out = Vec::new();
    db.export_dump(&["T"], &mut out, |_| {}).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "T\nid|a|b\n1|x|y\n2|p|q\n\n");
}

#[test]
fn roundtrip_reproduces_content_with_resequenced_ids() {
    let (_pool, mut db) = fresh_db();
    db.execute("CREATE TABLE Lexeme (id INTEGER PRIMARY KEY, form TEXT, pos TEXT)")
        .unwrap();
    db.execute("CREATE TABLE Feature (id INTEGER PRIMARY KEY, name TEXT)")
        .unwrap();
    // A deleted row leaves a gap, so re-sequencing is observable.
    db.execute(
        "INSERT INTO Lexeme (form, pos) VALUES ('walk', 'Verb'), ('dog', 'Noun'), ('tree', 'Noun')",
    )
    .unwrap();
    db.execute("DELETE FROM Lexeme WHERE form = 'walk'").unwrap();
    db.execute("INSERT INTO Feature (name) VALUES ('animate')")
        .unwrap();

    let mut out = Vec::new();
    db.export_dump(&["Lexeme", "Feature"], &mut out, |_| {})
        .unwrap();
    let dump = String::from_utf8(out).unwrap();

    let (_pool2, mut target) = fresh_db();
    target.import_dump(&dump, |_| {}).unwrap();

    // Identical row content and column order, identifiers re-sequenced.
    assert_eq!(
        rows_of(&mut target, "SELECT form, pos FROM Lexeme"),
        vec![
            vec!["dog".to_string(), "Noun".to_string()],
            vec!["tree".to_string(), "Noun".to_string()],
        ]
    );
    assert_eq!(
        rows_of(&mut target, "SELECT id FROM Lexeme"),
        vec![vec!["1".to_string()], vec!["2".to_string()]]
    );
    assert_eq!(
        rows_of(&mut target, "SELECT name FROM Feature"),
        vec![vec!["animate".to_string()]]
    );
}

#[test]
fn import_replaces_an_existing_table() {
    let (_pool, mut db) = fresh_db();
    db.execute("CREATE TABLE T (id INTEGER PRIMARY KEY, a TEXT)")
        .unwrap();
    db.execute("INSERT INTO T (a) VALUES ('old')").unwrap();

    db.import_dump("T\nid|a\n1|new\n", |_| {}).unwrap();
    assert_eq!(rows_of(&mut db, "SELECT a FROM T"), vec![vec!["new".to_string()]]);
}

#[test]
fn malformed_line_aborts_whole_import() {
    let (_pool, mut db) = fresh_db();
    let dump = "Good\nid|a\n1|x\n\nBad\nid|a|b\n1|only\n";

    let err = db.import_dump(dump, |_| {}).unwrap_err();
    match err {
        Error::Import(e) => {
            assert_eq!(e.line, 7);
            assert_eq!(e.expected, 3);
            assert_eq!(e.found, 2);
        }
        other => panic!("expected import error, got {other:?}"),
    }

    // The earlier block committed; the failing block rolled back empty.
    assert_eq!(rows_of(&mut db, "SELECT a FROM Good"), vec![vec!["x".to_string()]]);
    assert!(rows_of(&mut db, "SELECT * FROM Bad").is_empty());
}

#[test]
fn import_evicts_cached_tables_it_replaces() {
    let (_pool, mut db) = fresh_db();
    db.execute("CREATE TABLE T (id INTEGER PRIMARY KEY, a TEXT)")
        .unwrap();
    db.execute("INSERT INTO T (a) VALUES ('old')").unwrap();
    db.load(&["T"]).unwrap();

    db.import_dump("T\nid|a\n1|new\n", |_| {}).unwrap();
    assert!(!db.is_cached("T"));

    let mut cursor = db.query("SELECT a FROM T").unwrap();
    assert!(!cursor.is_cached());
    assert_eq!(cursor.next().unwrap(), Step::Row);
    assert_eq!(cursor.column_text(0).unwrap(), "new");
}

#[test]
fn progress_is_monotone_and_ends_at_100() {
    let (_pool, mut db) = fresh_db();
    db.execute("CREATE TABLE T (id INTEGER PRIMARY KEY, a TEXT)")
        .unwrap();
    for i in 0..50 {
        db.execute_with(
            "INSERT INTO T (a) VALUES (?1)",
            &[relcache::Value::Text(format!("row{i}"))],
        )
        .unwrap();
    }

    let mut out = Vec::new();
    let mut export_seen = Vec::new();
    db.export_dump(&["T"], &mut out, |p| export_seen.push(p))
        .unwrap();
    assert!(export_seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(export_seen.last(), Some(&100));
    assert!(export_seen.iter().all(|&p| p <= 100));

    let (_pool2, mut target) = fresh_db();
    let mut import_seen = Vec::new();
    target
        .import_dump(&String::from_utf8(out).unwrap(), |p| import_seen.push(p))
        .unwrap();
    assert!(import_seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(import_seen.last(), Some(&100));
}

#[test]
fn exporting_no_tables_still_reports_completion() {
    let (_pool, mut db) = fresh_db();
    let mut out = Vec::new();
    let mut seen = Vec::new();
    db.export_dump(&[], &mut out, |p| seen.push(p)).unwrap();
    assert_eq!(seen, vec![100]);
    assert!(out.is_empty());
}

#[test]
fn export_of_missing_table_is_an_engine_error() {
    let (_pool, mut db) = fresh_db();
    let mut out = Vec::new();
    let err = db.export_dump(&["Missing"], &mut out, |_| {}).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
}
