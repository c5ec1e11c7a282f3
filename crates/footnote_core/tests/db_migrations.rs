use footnote_core::db::migrations::latest_version;
use footnote_core::db::{open_db, open_db_in_memory, DbError};
use footnote_core::{RepoError, SqliteQuoteRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "quotes");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("footnote.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "quotes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn quotes_schema_has_recency_index_and_never_reuses_seq() {
    let conn = open_db_in_memory().unwrap();

    let index_sql: String = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = 'idx_quotes_recency';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(index_sql.contains("date_created DESC, seq DESC"));

    conn.execute(
        "INSERT INTO quotes (uuid, date_created) VALUES ('a', 1);",
        [],
    )
    .unwrap();
    let first_seq = conn.last_insert_rowid();
    conn.execute("DELETE FROM quotes WHERE uuid = 'a';", []).unwrap();
    conn.execute(
        "INSERT INTO quotes (uuid, date_created) VALUES ('b', 1);",
        [],
    )
    .unwrap();

    assert!(conn.last_insert_rowid() > first_seq);
}

#[test]
fn opened_connection_has_fold_function() {
    let conn = open_db_in_memory().unwrap();
    let folded: String = conn
        .query_row("SELECT quote_fold('Résumé');", [], |row| row.get(0))
        .unwrap();
    assert_eq!(folded, "resume");
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteQuoteRepository::try_new(conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::SchemaNotMigrated {
            db_version: 0,
            ..
        }
    ));
}

#[test]
fn repository_rejects_missing_quotes_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE quotes;").unwrap();
    let err = SqliteQuoteRepository::try_new(conn).err().unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable("quotes")));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
