use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use crate::{
    adapt::Params,
    cursor::{Cursor, CursorState},
    error::Error,
    logger::LogSettings,
    sqlite::connection::{ConnectionHandle, EstablishParams},
    statement_cache::StatementCache,
    Result, Rusq,
};

/// Transaction handling mode for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Every statement completes in its own implicit transaction.
    Autocommit,
    /// A deferred transaction is opened before the first data-modifying
    /// statement and stays open until an explicit commit or rollback.
    /// Closing the connection rolls back. This is the default.
    #[default]
    ImplicitTransaction,
}

/// Classification of a statement by its leading keyword, driving the
/// implicit-transaction state machine and cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementKind {
    /// INSERT / UPDATE / DELETE / REPLACE
    DataModifying,
    /// CREATE / DROP / ALTER: completing one of these invalidates every
    /// cached prepared statement, since cached plans may reference the
    /// old schema.
    SchemaAltering,
    Other,
}

pub(crate) fn classify_statement(sql: &str) -> StatementKind {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();

    match keyword.as_str() {
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => StatementKind::DataModifying,
        "CREATE" | "DROP" | "ALTER" => StatementKind::SchemaAltering,
        _ => StatementKind::Other,
    }
}

/// Everything that lives behind the connection lock: the native handle,
/// the statement cache, and transaction policy.
pub(crate) struct ConnectionState {
    pub(crate) handle: ConnectionHandle,
    pub(crate) statements: StatementCache,
    pub(crate) isolation_mode: IsolationMode,
    pub(crate) log_settings: LogSettings,
}

impl ConnectionState {
    /// Open the implicit transaction if the isolation mode calls for one
    /// before this statement runs.
    pub(crate) fn maybe_begin_implicit(&mut self, kind: StatementKind) -> Result<()> {
        if self.isolation_mode == IsolationMode::ImplicitTransaction
            && kind == StatementKind::DataModifying
            && self.handle.autocommit_active()
        {
            self.handle.exec("BEGIN DEFERRED")?;
        }
        Ok(())
    }
}

impl Drop for ConnectionState {
    fn drop(&mut self) {
        // all statement handles must be finalized before the connection
        // handle is dropped
        self.statements.clear();
    }
}

pub(crate) struct ConnectionInner {
    /// `None` once the connection has been closed.
    state: Mutex<Option<ConnectionState>>,
    /// Live cursors, closed in cascade when the connection closes. The
    /// connection never owns a cursor's lifetime beyond that.
    cursors: Mutex<Vec<Weak<Mutex<CursorState>>>>,
}

impl ConnectionInner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, Option<ConnectionState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A connection to an open SQLite database.
///
/// All native access is synchronous and serialized through an internal
/// mutex, so a connection and its cursors may be shared across threads;
/// calls block for the duration of native I/O.
///
/// Dropping the connection closes it. Prefer calling
/// [`close`][Connection::close] explicitly to observe any error.
pub struct Connection {
    pub(crate) inner: Arc<ConnectionInner>,
}

impl Debug for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    pub(crate) fn establish(options: &Rusq) -> Result<Self> {
        let handle = EstablishParams::from_options(options)?.establish()?;

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                state: Mutex::new(Some(ConnectionState {
                    handle,
                    statements: StatementCache::new(options.statement_cache_capacity),
                    isolation_mode: options.isolation_mode,
                    log_settings: options.log_settings.clone(),
                })),
                cursors: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Create a new cursor bound to this connection.
    pub fn cursor(&self) -> Cursor {
        let cursor = Cursor::new(Arc::clone(&self.inner));

        let mut cursors = self
            .inner
            .cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cursors.retain(|weak| weak.strong_count() > 0);
        cursors.push(cursor.downgrade());

        cursor
    }

    /// Execute one statement and return the cursor that ran it.
    ///
    /// ```no_run
    /// # fn main() -> rusq::Result<()> {
    /// use rusq::params;
    ///
    /// let conn = rusq::Rusq::new().open_in_memory()?;
    /// conn.execute("CREATE TABLE t (x INT)", ())?;
    /// conn.execute("INSERT INTO t VALUES (?)", params![5])?;
    /// let rows = conn.execute("SELECT x FROM t", ())?.fetchall()?;
    /// assert_eq!(rows[0].get(0)?.as_integer(), Some(5));
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<Cursor> {
        let mut cursor = self.cursor();
        cursor.execute(sql, params)?;
        Ok(cursor)
    }

    /// Execute one data-modifying statement repeatedly, once per parameter
    /// set, over a single prepared statement.
    pub fn executemany<P>(&self, sql: &str, param_sets: impl IntoIterator<Item = P>) -> Result<Cursor>
    where
        P: Into<Params>,
    {
        let mut cursor = self.cursor();
        cursor.executemany(sql, param_sets)?;
        Ok(cursor)
    }

    /// Commit the open transaction. A no-op when no transaction is open.
    pub fn commit(&self) -> Result<()> {
        let mut guard = self.inner.lock_state();
        let state = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        if state.handle.autocommit_active() {
            return Ok(());
        }
        state.handle.exec("COMMIT")
    }

    /// Roll back the open transaction. A no-op when no transaction is open.
    pub fn rollback(&self) -> Result<()> {
        let mut guard = self.inner.lock_state();
        let state = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        if state.handle.autocommit_active() {
            return Ok(());
        }
        state.handle.exec("ROLLBACK")
    }

    /// Explicitly close this connection.
    ///
    /// Closes every open cursor, rolls back any open transaction, finalizes
    /// every cached statement, and releases the native handle. Idempotent;
    /// a second close is a no-op. Every operation on the connection or its
    /// cursors afterwards fails with [`Error::ConnectionClosed`].
    pub fn close(&self) -> Result<()> {
        // Cursors go first: any uncached statement handles they own must be
        // finalized before the native connection closes.
        let cursors: Vec<_> = {
            let mut cursors = self
                .inner
                .cursors
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            cursors.drain(..).collect()
        };

        for weak in cursors {
            if let Some(state) = weak.upgrade() {
                CursorState::close_orphaned(&state);
            }
        }

        // Taking the state makes the close idempotent and fails every
        // subsequent operation. ConnectionState's drop order finalizes
        // cached statements before the handle.
        let state = self.inner.lock_state().take();
        if let Some(state) = state {
            if !state.handle.autocommit_active() {
                state.handle.exec("ROLLBACK")?;
            }
        }

        Ok(())
    }

    /// True once [`close`][Connection::close] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().is_none()
    }

    /// The rowid of the most recent successful INSERT on this connection.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let guard = self.inner.lock_state();
        let state = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        Ok(state.handle.last_insert_rowid())
    }

    /// Rows affected by the most recent data-modifying statement.
    pub fn changes(&self) -> Result<i64> {
        let guard = self.inner.lock_state();
        let state = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        Ok(state.handle.changes())
    }

    /// Total rows affected since the connection opened.
    pub fn total_changes(&self) -> Result<i64> {
        let guard = self.inner.lock_state();
        let state = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        Ok(state.handle.total_changes())
    }

    /// The number of statements currently held by the statement cache.
    pub fn cached_statements_size(&self) -> usize {
        self.inner
            .lock_state()
            .as_ref()
            .map(|state| state.statements.len())
            .unwrap_or(0)
    }

    /// Native statement prepares issued on behalf of this connection's
    /// cache so far (cache hits excluded).
    pub fn total_prepares(&self) -> u64 {
        self.inner
            .lock_state()
            .as_ref()
            .map(|state| state.statements.total_prepares())
            .unwrap_or(0)
    }

    /// Drop all cached prepared statements that are not checked out.
    pub fn clear_cached_statements(&self) -> Result<()> {
        let mut guard = self.inner.lock_state();
        let state = guard.as_mut().ok_or(Error::ConnectionClosed)?;
        state.statements.invalidate_all();
        Ok(())
    }

    /// Change the transaction handling mode. Takes effect from the next
    /// statement; an already-open transaction is unaffected.
    pub fn set_isolation_mode(&self, mode: IsolationMode) -> Result<()> {
        let mut guard = self.inner.lock_state();
        let state = guard.as_mut().ok_or(Error::ConnectionClosed)?;
        state.isolation_mode = mode;
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // best effort; errors surface only via an explicit close
        let _ = self.close();
    }
}
