use rusq::{params, Error, IsolationMode, Rusq};

fn count(conn: &rusq::Connection, sql: &str) -> anyhow::Result<i64> {
    let row = conn.execute(sql, ())?.fetchone()?;
    Ok(row.and_then(|r| r.get(0).ok().and_then(|c| c.as_integer())).unwrap_or(-1))
}

#[test]
fn test_open_and_close_is_idempotent() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    assert!(!conn.is_closed());

    conn.close()?;
    assert!(conn.is_closed());

    // a second close is a no-op
    conn.close()?;
    Ok(())
}

#[test]
fn test_operations_after_close_fail() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.close()?;

    assert!(matches!(
        conn.execute("SELECT 1", ()).unwrap_err(),
        Error::ConnectionClosed
    ));
    assert!(matches!(conn.commit().unwrap_err(), Error::ConnectionClosed));
    assert!(matches!(
        conn.rollback().unwrap_err(),
        Error::ConnectionClosed
    ));
    assert!(matches!(
        conn.last_insert_rowid().unwrap_err(),
        Error::ConnectionClosed
    ));
    Ok(())
}

#[test]
fn test_close_cascades_to_cursors() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2), (3)", ())?;

    let mut cursor = conn.execute("SELECT x FROM t", ())?;
    conn.close()?;

    assert!(matches!(
        cursor.fetchone().unwrap_err(),
        Error::CursorClosed
    ));
    Ok(())
}

#[test]
fn test_commit_and_rollback_without_transaction_are_noops() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.commit()?;
    conn.rollback()?;
    conn.commit()?;
    Ok(())
}

#[test]
fn test_implicit_transaction_rollback_discards_writes() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    conn.execute("INSERT INTO t VALUES (1)", ())?;
    conn.rollback()?;
    assert_eq!(count(&conn, "SELECT count(*) FROM t")?, 0);

    conn.execute("INSERT INTO t VALUES (1)", ())?;
    conn.commit()?;
    assert_eq!(count(&conn, "SELECT count(*) FROM t")?, 1);
    Ok(())
}

#[test]
fn test_autocommit_mode_commits_each_statement() -> anyhow::Result<()> {
    let conn = Rusq::new()
        .isolation_mode(IsolationMode::Autocommit)
        .open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    conn.execute("INSERT INTO t VALUES (1)", ())?;
    // already committed; rollback has nothing to undo
    conn.rollback()?;
    assert_eq!(count(&conn, "SELECT count(*) FROM t")?, 1);
    Ok(())
}

#[test]
fn test_set_isolation_mode_takes_effect() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    conn.set_isolation_mode(IsolationMode::Autocommit)?;
    conn.execute("INSERT INTO t VALUES (1)", ())?;
    conn.rollback()?;
    assert_eq!(count(&conn, "SELECT count(*) FROM t")?, 1);
    Ok(())
}

#[test]
fn test_close_rolls_back_open_transaction() -> anyhow::Result<()> {
    let dir = tempdir::TempDir::new("rusq-test")?;
    let path = dir.path().join("roll.db");

    let conn = Rusq::new().create_if_missing(true).open(&path)?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1)", ())?;
    // transaction left open
    conn.close()?;

    let conn = Rusq::new().open(&path)?;
    assert_eq!(count(&conn, "SELECT count(*) FROM t")?, 0);
    Ok(())
}

#[test]
fn test_open_missing_file_fails_without_create() {
    let dir = tempdir::TempDir::new("rusq-test").unwrap();
    let path = dir.path().join("missing.db");

    let err = Rusq::new().open(&path).unwrap_err();
    assert!(matches!(err, Error::Open(_)));
}

#[test]
fn test_read_only_connection_rejects_writes() -> anyhow::Result<()> {
    let dir = tempdir::TempDir::new("rusq-test")?;
    let path = dir.path().join("ro.db");

    let conn = Rusq::new().create_if_missing(true).open(&path)?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.close()?;

    let conn = Rusq::new().read_only(true).open(&path)?;
    let err = conn.execute("INSERT INTO t VALUES (1)", ()).unwrap_err();
    assert!(err.sqlite_error().is_some());
    Ok(())
}

#[test]
fn test_change_counters() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    conn.execute("INSERT INTO t VALUES (1)", params![])?;
    assert_eq!(conn.last_insert_rowid()?, 1);
    assert_eq!(conn.changes()?, 1);

    conn.execute("INSERT INTO t VALUES (2), (3)", ())?;
    assert_eq!(conn.changes()?, 2);
    assert_eq!(conn.total_changes()?, 3);
    Ok(())
}
