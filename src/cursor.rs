use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use smallvec::SmallVec;

use crate::{
    adapt::{adapt, convert, Params},
    column::Column,
    connection::{classify_statement, ConnectionInner, ConnectionState, StatementKind},
    error::Error,
    logger::QueryLogger,
    row::{Row, RowFactory},
    sqlite::statement::{StatementHandle, Step},
    statement_cache::CheckedOut,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No statement has been executed yet.
    Idle,
    /// A row-returning statement is mid-iteration.
    HasRows,
    /// The last statement ran to completion.
    Exhausted,
    Closed,
}

pub(crate) struct CursorState {
    /// The statement acquired for the current execution, returned to the
    /// cache (or finalized) on exhaustion, error, re-execute, or close.
    checkout: Option<CheckedOut>,
    columns: Arc<Vec<Column>>,
    column_names: Arc<HashMap<Arc<str>, usize>>,
    /// The first result row is read during execute to learn whether the
    /// statement returns rows at all; it is buffered here until fetched.
    pending: Option<Row>,
    phase: Phase,
    /// Rows affected by the last data-modifying statement, -1 otherwise.
    rowcount: i64,
    /// Default batch size for [`Cursor::fetchmany`].
    arraysize: usize,
    row_factory: Option<RowFactory>,
}

impl CursorState {
    /// Close a cursor from the connection's close cascade. Any uncached
    /// statement handle must be finalized before the native connection
    /// closes; cached entries die with the cache itself.
    pub(crate) fn close_orphaned(state: &Mutex<CursorState>) {
        let mut cursor = state.lock().unwrap_or_else(PoisonError::into_inner);
        cursor.pending = None;
        cursor.checkout = None;
        cursor.phase = Phase::Closed;
    }
}

/// Executes statements on its connection and iterates result rows.
///
/// A cursor runs one statement at a time; re-executing releases whatever
/// the previous statement held. Cursors are cheap, and any number may be
/// open on one connection at once.
pub struct Cursor {
    connection: Arc<ConnectionInner>,
    state: Arc<Mutex<CursorState>>,
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let cursor = self.lock();
        f.debug_struct("Cursor")
            .field("phase", &cursor.phase)
            .field("rowcount", &cursor.rowcount)
            .finish()
    }
}

impl Cursor {
    pub(crate) fn new(connection: Arc<ConnectionInner>) -> Self {
        Self {
            connection,
            state: Arc::new(Mutex::new(CursorState {
                checkout: None,
                columns: Arc::new(Vec::new()),
                column_names: Arc::new(HashMap::new()),
                pending: None,
                phase: Phase::Idle,
                rowcount: -1,
                arraysize: 1,
                row_factory: None,
            })),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<CursorState>> {
        Arc::downgrade(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute one statement with the given parameters.
    ///
    /// The statement is stepped once immediately. A data-modifying
    /// statement completes here and updates [`rowcount`][Cursor::rowcount];
    /// a row-returning statement leaves the cursor holding rows for the
    /// fetch methods. Exactly one statement is accepted per call.
    pub fn execute(&mut self, sql: &str, params: impl Into<Params>) -> Result<()> {
        let params = params.into();

        // lock order is always cursor state, then connection state
        let mut cursor = self.lock();
        if cursor.phase == Phase::Closed {
            return Err(Error::CursorClosed);
        }

        let mut guard = self.connection.lock_state();
        let conn = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        if let Some(previous) = cursor.checkout.take() {
            release(conn, previous);
        }
        cursor.pending = None;
        cursor.phase = Phase::Idle;
        cursor.rowcount = -1;

        let kind = classify_statement(sql);
        conn.maybe_begin_implicit(kind)?;

        let mut checkout = conn.statements.checkout(&conn.handle, sql)?;
        let outcome = run_statement(conn, &mut checkout, sql, params);

        match outcome {
            Ok((columns, column_names, StepOutcome::Row(row))) => {
                cursor.columns = columns;
                cursor.column_names = column_names;
                cursor.pending = Some(row);
                cursor.checkout = Some(checkout);
                cursor.phase = Phase::HasRows;
                Ok(())
            }
            Ok((columns, column_names, StepOutcome::Done { changes })) => {
                cursor.columns = columns;
                cursor.column_names = column_names;
                if kind == StatementKind::DataModifying {
                    cursor.rowcount = changes;
                }
                release(conn, checkout);
                if kind == StatementKind::SchemaAltering {
                    // cached plans may reference the old schema
                    conn.statements.invalidate_all();
                }
                cursor.phase = Phase::Exhausted;
                Ok(())
            }
            Err(e) => {
                release(conn, checkout);
                cursor.phase = Phase::Exhausted;
                Err(e)
            }
        }
    }

    /// Execute one data-modifying statement repeatedly over a single
    /// prepared statement, once per parameter set.
    /// [`rowcount`][Cursor::rowcount] accumulates across the whole batch.
    ///
    /// Only INSERT, UPDATE, DELETE, and REPLACE are accepted, and the
    /// statement must not return rows.
    pub fn executemany<P>(&mut self, sql: &str, param_sets: impl IntoIterator<Item = P>) -> Result<()>
    where
        P: Into<Params>,
    {
        let kind = classify_statement(sql);
        if kind != StatementKind::DataModifying {
            return Err(Error::Protocol(
                "executemany is only for statements that modify data".into(),
            ));
        }

        let mut cursor = self.lock();
        if cursor.phase == Phase::Closed {
            return Err(Error::CursorClosed);
        }

        let mut guard = self.connection.lock_state();
        let conn = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        if let Some(previous) = cursor.checkout.take() {
            release(conn, previous);
        }
        cursor.pending = None;
        cursor.phase = Phase::Idle;
        cursor.rowcount = -1;

        conn.maybe_begin_implicit(kind)?;

        let mut checkout = conn.statements.checkout(&conn.handle, sql)?;
        let result = run_batch(conn, &mut checkout, sql, param_sets);
        release(conn, checkout);

        cursor.phase = Phase::Exhausted;
        cursor.rowcount = result?;
        Ok(())
    }

    /// Fetch the next row, or `None` once the result set is exhausted.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        let mut cursor = self.lock();

        match cursor.phase {
            Phase::Closed => return Err(Error::CursorClosed),
            Phase::Idle | Phase::Exhausted => return Ok(None),
            Phase::HasRows => {}
        }

        if let Some(row) = cursor.pending.take() {
            return Ok(Some(apply_factory(&cursor, row)));
        }

        let mut guard = self.connection.lock_state();
        let conn = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        let columns = Arc::clone(&cursor.columns);
        let column_names = Arc::clone(&cursor.column_names);

        let stepped = {
            let Some(checkout) = cursor.checkout.as_mut() else {
                cursor.phase = Phase::Exhausted;
                return Ok(None);
            };

            let stmt = resolve(conn, checkout)?;
            match stmt.step() {
                Ok(Step::Row) => materialize_row(stmt, &columns, &column_names).map(Some),
                Ok(Step::Done) => Ok(None),
                Err(e) => {
                    // leave the statement reusable before surfacing
                    let _ = stmt.reset();
                    Err(Error::Sqlite(e))
                }
            }
        };

        match stepped {
            Ok(Some(row)) => Ok(Some(apply_factory(&cursor, row))),
            Ok(None) => {
                if let Some(checkout) = cursor.checkout.take() {
                    release(conn, checkout);
                }
                cursor.phase = Phase::Exhausted;
                Ok(None)
            }
            Err(e) => {
                if let Some(checkout) = cursor.checkout.take() {
                    release(conn, checkout);
                }
                cursor.phase = Phase::Exhausted;
                Err(e)
            }
        }
    }

    /// Fetch up to `size` rows, defaulting to [`arraysize`][Cursor::arraysize].
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = size.unwrap_or_else(|| self.lock().arraysize);
        let mut rows = Vec::with_capacity(size);
        while rows.len() < size {
            match self.fetchone()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Fetch every remaining row.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetchone()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// The result columns of the last executed statement. Empty before the
    /// first execution and for statements that return no rows.
    pub fn columns(&self) -> Vec<Column> {
        self.lock().columns.as_ref().clone()
    }

    /// Rows affected by the last data-modifying statement, or -1 when the
    /// last statement was not one (or nothing has been executed).
    pub fn rowcount(&self) -> i64 {
        self.lock().rowcount
    }

    /// The default number of rows [`fetchmany`][Cursor::fetchmany] returns.
    pub fn arraysize(&self) -> usize {
        self.lock().arraysize
    }

    pub fn set_arraysize(&self, size: usize) {
        self.lock().arraysize = size.max(1);
    }

    /// Install a function mapping each row before it is handed out, e.g.
    /// to restructure rows into a domain type's raw form. Applies to rows
    /// fetched from now on, including buffered ones.
    pub fn set_row_factory(&self, factory: RowFactory) {
        self.lock().row_factory = Some(factory);
    }

    pub fn clear_row_factory(&self) {
        self.lock().row_factory = None;
    }

    /// Explicitly close this cursor, releasing any statement it holds.
    /// Idempotent; fetching or executing afterwards fails with
    /// [`Error::CursorClosed`].
    pub fn close(&self) -> Result<()> {
        let mut cursor = self.lock();
        if cursor.phase == Phase::Closed {
            return Ok(());
        }

        cursor.pending = None;
        cursor.phase = Phase::Closed;

        if let Some(checkout) = cursor.checkout.take() {
            let mut guard = self.connection.lock_state();
            match guard.as_mut() {
                Some(conn) => release(conn, checkout),
                None => drop(checkout),
            }
        }
        Ok(())
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Iterator for Cursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetchone().transpose()
    }
}

enum StepOutcome {
    Row(Row),
    Done { changes: i64 },
}

/// Return a checked-out statement to the cache, or finalize it if it was
/// never cached.
fn release(conn: &mut ConnectionState, checkout: CheckedOut) {
    match checkout {
        CheckedOut::Cached(key) => conn.statements.checkin(&key),
        CheckedOut::Uncached(statement) => drop(statement),
    }
}

fn resolve<'a>(
    conn: &'a mut ConnectionState,
    checkout: &'a mut CheckedOut,
) -> Result<&'a mut StatementHandle> {
    match checkout {
        CheckedOut::Uncached(statement) => Ok(statement),
        CheckedOut::Cached(key) => conn
            .statements
            .statement(key)
            .ok_or_else(|| Error::Protocol("cached statement disappeared while in use".into())),
    }
}

/// Bind, step once, and capture column metadata for one execution.
fn run_statement(
    conn: &mut ConnectionState,
    checkout: &mut CheckedOut,
    sql: &str,
    params: Params,
) -> Result<(Arc<Vec<Column>>, Arc<HashMap<Arc<str>, usize>>, StepOutcome)> {
    let log_settings = conn.log_settings.clone();
    let stmt = resolve(conn, checkout)?;

    let (columns, column_names) = capture_columns(stmt);
    bind_params(stmt, params)?;

    let mut logger = QueryLogger::new(sql, log_settings);

    match stmt.step() {
        Ok(Step::Row) => {
            logger.inc_rows_returned();
            let row = materialize_row(stmt, &columns, &column_names)?;
            Ok((columns, column_names, StepOutcome::Row(row)))
        }
        Ok(Step::Done) => {
            let changes = stmt.changes();
            logger.inc_rows_affected(changes.max(0) as u64);
            Ok((columns, column_names, StepOutcome::Done { changes }))
        }
        Err(e) => {
            let _ = stmt.reset();
            Err(Error::Sqlite(e))
        }
    }
}

/// Run one data-modifying statement once per parameter set, returning the
/// accumulated change count.
fn run_batch<P>(
    conn: &mut ConnectionState,
    checkout: &mut CheckedOut,
    sql: &str,
    param_sets: impl IntoIterator<Item = P>,
) -> Result<i64>
where
    P: Into<Params>,
{
    let log_settings = conn.log_settings.clone();
    let stmt = resolve(conn, checkout)?;

    let mut logger = QueryLogger::new(sql, log_settings);
    let mut total: i64 = 0;

    for (i, params) in param_sets.into_iter().enumerate() {
        if i > 0 {
            stmt.reset().map_err(Error::Sqlite)?;
            stmt.clear_bindings();
        }

        bind_params(stmt, params.into())?;

        match stmt.step() {
            Ok(Step::Row) => {
                return Err(Error::Protocol(
                    "executemany cannot be used with statements that return rows".into(),
                ));
            }
            Ok(Step::Done) => {
                let changes = stmt.changes();
                logger.inc_rows_affected(changes.max(0) as u64);
                total += changes;
            }
            Err(e) => {
                let _ = stmt.reset();
                return Err(Error::Sqlite(e));
            }
        }
    }

    Ok(total)
}

fn capture_columns(stmt: &StatementHandle) -> (Arc<Vec<Column>>, Arc<HashMap<Arc<str>, usize>>) {
    let count = stmt.column_count();
    let mut columns = Vec::with_capacity(count);
    let mut column_names = HashMap::with_capacity(count);

    for i in 0..count {
        let name: Arc<str> = stmt.column_name(i).into();
        column_names.insert(Arc::clone(&name), i);
        columns.push(Column {
            name,
            decl_type: stmt.column_decltype(i),
        });
    }

    (Arc::new(columns), Arc::new(column_names))
}

/// Adapt every parameter up front, then bind. A failing adapter surfaces
/// before any value reaches the statement, so no partial bind is left
/// behind.
fn bind_params(stmt: &mut StatementHandle, params: Params) -> Result<()> {
    let expected = stmt.bind_parameter_count();

    match params {
        Params::None => {
            if expected != 0 {
                return Err(Error::ParameterCount {
                    expected,
                    supplied: 0,
                });
            }
        }
        Params::Positional(params) => {
            if expected != params.len() {
                return Err(Error::ParameterCount {
                    expected,
                    supplied: params.len(),
                });
            }

            let mut values: SmallVec<[crate::Value; 8]> = SmallVec::with_capacity(params.len());
            for param in params {
                values.push(adapt(param)?);
            }
            for (i, value) in values.iter().enumerate() {
                stmt.bind_value(i + 1, value)?;
            }
        }
        Params::Named(pairs) => {
            let mut values: SmallVec<[(usize, crate::Value); 8]> =
                SmallVec::with_capacity(pairs.len());
            for (name, param) in pairs {
                let index = resolve_parameter_index(stmt, &name)
                    .ok_or(Error::ParameterNotFound(name))?;
                values.push((index, adapt(param)?));
            }

            let mut bound: SmallVec<[usize; 8]> = SmallVec::with_capacity(values.len());
            for (index, value) in &values {
                stmt.bind_value(*index, value)?;
                bound.push(*index);
            }

            // every parameter in the statement must have received a value
            for i in 1..=expected {
                if !bound.contains(&i) {
                    let name = stmt
                        .bind_parameter_name(i)
                        .unwrap_or_else(|| format!("?{i}"));
                    return Err(Error::Protocol(format!(
                        "no value supplied for parameter {name}"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Resolve a caller-supplied parameter name to its 1-based index. Names
/// may be given exactly as written in the SQL (`:x`, `@x`, `$x`, `?5`) or
/// bare, in which case each prefix the engine supports is tried.
fn resolve_parameter_index(stmt: &StatementHandle, name: &str) -> Option<usize> {
    let index = stmt.bind_parameter_index(name);
    if index != 0 {
        return Some(index);
    }

    if name.starts_with([':', '@', '$', '?']) {
        return None;
    }

    for prefix in [':', '@', '$'] {
        let index = stmt.bind_parameter_index(&format!("{prefix}{name}"));
        if index != 0 {
            return Some(index);
        }
    }
    None
}

fn materialize_row(
    stmt: &StatementHandle,
    columns: &Arc<Vec<Column>>,
    column_names: &Arc<HashMap<Arc<str>, usize>>,
) -> Result<Row> {
    let mut cells = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let value = stmt.column_value(i)?;
        cells.push(convert(value, column.decl_type())?);
    }
    Ok(Row::new(cells, Arc::clone(columns), Arc::clone(column_names)))
}

fn apply_factory(cursor: &CursorState, row: Row) -> Row {
    match &cursor.row_factory {
        Some(factory) => factory(row),
        None => row,
    }
}
