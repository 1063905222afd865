use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rusq::{params, Error, Param, Params, Rusq};

#[test]
fn test_execute_and_fetch_round_trip() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (?)", params![5])?;

    let rows = conn.execute("SELECT x FROM t", ())?.fetchall()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get(0)?.as_integer(), Some(5));
    Ok(())
}

#[test]
fn test_fetchone_returns_none_when_exhausted() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2)", ())?;

    let mut cursor = conn.execute("SELECT x FROM t ORDER BY x", ())?;
    assert_eq!(cursor.fetchone()?.unwrap().get(0)?.as_integer(), Some(1));
    assert_eq!(cursor.fetchone()?.unwrap().get(0)?.as_integer(), Some(2));
    assert!(cursor.fetchone()?.is_none());
    // stays exhausted
    assert!(cursor.fetchone()?.is_none());
    Ok(())
}

#[test]
fn test_fetchone_before_any_execute_returns_none() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    let mut cursor = conn.cursor();
    assert!(cursor.fetchone()?.is_none());
    Ok(())
}

#[test]
fn test_fetchmany_respects_size_and_arraysize() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    for i in 0..5 {
        conn.execute("INSERT INTO t VALUES (?)", params![i])?;
    }

    let mut cursor = conn.execute("SELECT x FROM t ORDER BY x", ())?;
    assert_eq!(cursor.fetchmany(Some(2))?.len(), 2);

    // defaults to arraysize, which defaults to 1
    assert_eq!(cursor.fetchmany(None)?.len(), 1);

    cursor.set_arraysize(10);
    let rest = cursor.fetchmany(None)?;
    assert_eq!(rest.len(), 2);
    assert!(cursor.fetchone()?.is_none());
    Ok(())
}

#[test]
fn test_reexecute_restarts_result_set() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2), (3)", ())?;

    let mut cursor = conn.cursor();
    cursor.execute("SELECT x FROM t ORDER BY x", ())?;
    assert_eq!(cursor.fetchone()?.unwrap().get(0)?.as_integer(), Some(1));

    // re-executing mid-iteration abandons the rest of the previous set
    cursor.execute("SELECT x FROM t ORDER BY x", ())?;
    let rows = cursor.fetchall()?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get(0)?.as_integer(), Some(1));
    Ok(())
}

#[test]
fn test_rowcount() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    let cursor = conn.execute("INSERT INTO t VALUES (1), (2)", ())?;
    assert_eq!(cursor.rowcount(), 2);

    let cursor = conn.execute("UPDATE t SET x = x + 1", ())?;
    assert_eq!(cursor.rowcount(), 2);

    // not a data-modifying statement
    let cursor = conn.execute("SELECT x FROM t", ())?;
    assert_eq!(cursor.rowcount(), -1);
    Ok(())
}

#[test]
fn test_executemany_accumulates_rowcount() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    let sets: Vec<Vec<Param>> = (0..4).map(|i| params![i]).collect();
    let cursor = conn.executemany("INSERT INTO t VALUES (?)", sets)?;
    assert_eq!(cursor.rowcount(), 4);

    let row = conn.execute("SELECT count(*) FROM t", ())?.fetchone()?;
    assert_eq!(row.unwrap().get(0)?.as_integer(), Some(4));
    Ok(())
}

#[test]
fn test_executemany_rejects_row_returning_statements() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    let err = conn
        .executemany("SELECT * FROM t", vec![params![]])
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    Ok(())
}

#[test]
fn test_positional_parameter_count_mismatch() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT, y INT)", ())?;

    let err = conn
        .execute("INSERT INTO t VALUES (?, ?)", params![1])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ParameterCount {
            expected: 2,
            supplied: 1
        }
    ));
    Ok(())
}

#[test]
fn test_named_parameters_with_and_without_prefix() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT, y TEXT)", ())?;

    conn.execute(
        "INSERT INTO t VALUES (:x, :y)",
        Params::named([("x", Param::from(7)), (":y", Param::from("seven"))]),
    )?;

    let row = conn
        .execute("SELECT y FROM t WHERE x = :x", Params::named([("x", 7)]))?
        .fetchone()?
        .unwrap();
    assert_eq!(row.get(0)?.as_text(), Some("seven"));
    Ok(())
}

#[test]
fn test_unknown_named_parameter_fails() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    let err = conn
        .execute(
            "INSERT INTO t VALUES (:x)",
            Params::named([("x", 1), ("bogus", 2)]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ParameterNotFound(name) if name == "bogus"));
    Ok(())
}

#[test]
fn test_missing_named_parameter_fails() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT, y INT)", ())?;

    let err = conn
        .execute("INSERT INTO t VALUES (:x, :y)", Params::named([("x", 1)]))
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    Ok(())
}

#[test]
fn test_null_round_trip() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (?)", params![None::<i64>])?;

    let row = conn.execute("SELECT x FROM t", ())?.fetchone()?.unwrap();
    assert!(row.get(0)?.is_null());
    Ok(())
}

#[test]
fn test_multiple_statements_in_one_call_are_rejected() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    let err = conn
        .execute("CREATE TABLE t (x INT); INSERT INTO t VALUES (1)", ())
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    Ok(())
}

#[test]
fn test_empty_sql_is_rejected() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    assert!(matches!(
        conn.execute("", ()).unwrap_err(),
        Error::Protocol(_)
    ));
    assert!(matches!(
        conn.execute("-- just a comment", ()).unwrap_err(),
        Error::Protocol(_)
    ));
    Ok(())
}

#[test]
fn test_constraint_violation_surfaces_and_cursor_stays_usable() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT PRIMARY KEY)", ())?;

    let mut cursor = conn.cursor();
    cursor.execute("INSERT INTO t VALUES (1)", ())?;

    let err = cursor.execute("INSERT INTO t VALUES (1)", ()).unwrap_err();
    assert!(err.is_constraint_violation());

    // the failure left the cursor and the cached statement reusable
    cursor.execute("INSERT INTO t VALUES (2)", ())?;
    let row = conn.execute("SELECT count(*) FROM t", ())?.fetchone()?;
    assert_eq!(row.unwrap().get(0)?.as_integer(), Some(2));
    Ok(())
}

#[test]
fn test_cursor_close_is_idempotent_and_final() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;

    let mut cursor = conn.execute("SELECT x FROM t", ())?;
    cursor.close()?;
    cursor.close()?;

    assert!(matches!(
        cursor.fetchone().unwrap_err(),
        Error::CursorClosed
    ));
    assert!(matches!(
        cursor.execute("SELECT 1", ()).unwrap_err(),
        Error::CursorClosed
    ));
    Ok(())
}

#[test]
fn test_cursor_iteration() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2), (3)", ())?;

    let cursor = conn.execute("SELECT x FROM t", ())?;
    let mut total = 0;
    for row in cursor {
        total += row?.get(0)?.as_integer().unwrap_or(0);
    }
    assert_eq!(total, 6);
    Ok(())
}

#[test]
fn test_row_factory_is_applied_to_fetched_rows() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2)", ())?;

    let mut cursor = conn.execute("SELECT x FROM t", ())?;
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    cursor.set_row_factory(Arc::new(move |row| {
        counter.fetch_add(1, Ordering::SeqCst);
        row
    }));

    assert_eq!(cursor.fetchall()?.len(), 2);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_cursor_is_debuggable() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;

    // Result<Cursor> must satisfy the Debug bound unwrap_err and friends
    // require, and the rendering should reflect the cursor's state
    let cursor: Result<rusq::Cursor, Error> = conn.execute("SELECT 1", ());
    let rendered = format!("{:?}", cursor.unwrap());
    assert!(rendered.contains("Cursor"));
    assert!(rendered.contains("rowcount"));
    Ok(())
}

#[test]
fn test_column_metadata_and_named_access() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (id INTEGER, label TEXT)", ())?;
    conn.execute("INSERT INTO t VALUES (1, 'one')", ())?;

    let mut cursor = conn.execute("SELECT id, label FROM t", ())?;
    let columns = cursor.columns();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name(), "id");
    assert_eq!(columns[1].decl_type(), Some("TEXT"));

    let row = cursor.fetchone()?.unwrap();
    assert_eq!(row.get_named("label")?.as_text(), Some("one"));
    assert!(matches!(
        row.get_named("nope").unwrap_err(),
        Error::ColumnNotFound(_)
    ));
    assert!(matches!(
        row.get(9).unwrap_err(),
        Error::ColumnIndexOutOfBounds { index: 9, len: 2 }
    ));
    Ok(())
}
