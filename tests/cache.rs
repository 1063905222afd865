use rusq::{params, Rusq};

#[test]
fn test_repeated_sql_is_prepared_once() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1)", ())?;

    conn.execute("SELECT x FROM t", ())?.fetchall()?;
    let after_first = conn.total_prepares();

    for _ in 0..5 {
        conn.execute("SELECT x FROM t", ())?.fetchall()?;
    }
    assert_eq!(conn.total_prepares(), after_first);
    Ok(())
}

#[test]
fn test_distinct_sql_occupies_distinct_entries() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    let before = conn.cached_statements_size();

    conn.execute("SELECT 1", ())?.fetchall()?;
    conn.execute("SELECT 2", ())?.fetchall()?;
    // whitespace differences count as different SQL text
    conn.execute("SELECT  1", ())?.fetchall()?;

    assert_eq!(conn.cached_statements_size(), before + 3);
    Ok(())
}

#[test]
fn test_capacity_bounds_the_cache() -> anyhow::Result<()> {
    let conn = Rusq::new().statement_cache_capacity(2).open_in_memory()?;

    conn.execute("SELECT 1", ())?.fetchall()?;
    conn.execute("SELECT 2", ())?.fetchall()?;
    conn.execute("SELECT 3", ())?.fetchall()?;

    assert_eq!(conn.cached_statements_size(), 2);
    Ok(())
}

#[test]
fn test_zero_capacity_disables_caching() -> anyhow::Result<()> {
    let conn = Rusq::new().statement_cache_capacity(0).open_in_memory()?;

    conn.execute("SELECT 1", ())?.fetchall()?;
    conn.execute("SELECT 1", ())?.fetchall()?;

    assert_eq!(conn.cached_statements_size(), 0);
    assert_eq!(conn.total_prepares(), 2);
    Ok(())
}

#[test]
fn test_overlapping_executions_of_identical_sql() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2), (3)", ())?;

    // the first cursor still holds the cached statement when the second
    // executes the same text; the second is served without disturbing it
    let mut a = conn.execute("SELECT x FROM t ORDER BY x", ())?;
    let mut b = conn.execute("SELECT x FROM t ORDER BY x", ())?;

    assert_eq!(a.fetchone()?.unwrap().get(0)?.as_integer(), Some(1));
    assert_eq!(b.fetchone()?.unwrap().get(0)?.as_integer(), Some(1));
    assert_eq!(a.fetchone()?.unwrap().get(0)?.as_integer(), Some(2));
    assert_eq!(b.fetchall()?.len(), 2);
    assert_eq!(a.fetchall()?.len(), 1);
    Ok(())
}

#[test]
fn test_schema_change_invalidates_cached_statements() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1)", ())?;
    conn.execute("SELECT x FROM t", ())?.fetchall()?;
    assert!(conn.cached_statements_size() > 0);

    conn.execute("CREATE TABLE u (y INT)", ())?;
    assert_eq!(conn.cached_statements_size(), 0);

    // the old query re-prepares against the new schema and still works
    let rows = conn.execute("SELECT x FROM t", ())?.fetchall()?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[test]
fn test_schema_change_with_statement_checked_out() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2)", ())?;

    // leave a result set open across the schema change
    let mut cursor = conn.execute("SELECT x FROM t ORDER BY x", ())?;
    assert_eq!(cursor.fetchone()?.unwrap().get(0)?.as_integer(), Some(1));

    conn.execute("CREATE TABLE u (y INT)", ())?;

    // the in-flight statement finishes normally and is dropped on
    // exhaustion instead of returning to the cache
    assert_eq!(cursor.fetchone()?.unwrap().get(0)?.as_integer(), Some(2));
    assert!(cursor.fetchone()?.is_none());
    assert_eq!(conn.cached_statements_size(), 0);
    Ok(())
}

#[test]
fn test_clear_cached_statements() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("SELECT 1", ())?.fetchall()?;
    conn.execute("SELECT 2", ())?.fetchall()?;
    assert_eq!(conn.cached_statements_size(), 2);

    conn.clear_cached_statements()?;
    assert_eq!(conn.cached_statements_size(), 0);
    Ok(())
}

#[test]
fn test_cached_statement_survives_parameter_changes() -> anyhow::Result<()> {
    let conn = Rusq::new().open_in_memory()?;
    conn.execute("CREATE TABLE t (x INT)", ())?;
    conn.execute("INSERT INTO t VALUES (1), (2), (3)", ())?;

    let sql = "SELECT x FROM t WHERE x > ? ORDER BY x";
    let first = conn.execute(sql, params![0])?.fetchall()?;
    let prepares = conn.total_prepares();

    // reuse must not leak the previous execution's bindings or position
    let second = conn.execute(sql, params![2])?.fetchall()?;
    assert_eq!(conn.total_prepares(), prepares);

    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].get(0)?.as_integer(), Some(3));
    Ok(())
}
