use std::{path::{Path, PathBuf}, time::Duration};

use indexmap::IndexMap;
use log::LevelFilter;

use crate::{
    connection::{Connection, IsolationMode},
    logger::LogSettings,
    Result,
};

/// Refer to [SQLite documentation] for the meaning of the database journaling mode.
///
/// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_journal_mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    #[default]
    Wal,
    Off,
}

impl JournalMode {
    /// The pragma value, as SQLite spells it.
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

/// Refer to [SQLite documentation] for the meaning of various synchronous settings.
///
/// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_synchronous
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Synchronous {
    Off,
    Normal,
    #[default]
    Full,
    Extra,
}

impl Synchronous {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Synchronous::Off => "OFF",
            Synchronous::Normal => "NORMAL",
            Synchronous::Full => "FULL",
            Synchronous::Extra => "EXTRA",
        }
    }
}

/// Builder for a rusq [`Connection`].
///
/// ```no_run
/// # fn main() -> rusq::Result<()> {
/// let conn = rusq::Rusq::new()
///     .create_if_missing(true)
///     .foreign_keys(true)
///     .open("app.db")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Rusq {
    pub(crate) filename: PathBuf,
    pub(crate) in_memory: bool,
    pub(crate) read_only: bool,
    pub(crate) create_if_missing: bool,
    pub(crate) busy_timeout: Duration,
    pub(crate) log_settings: LogSettings,
    pub(crate) pragmas: IndexMap<String, Option<String>>,
    pub(crate) statement_cache_capacity: usize,
    pub(crate) isolation_mode: IsolationMode,
}

impl Default for Rusq {
    fn default() -> Self {
        let mut pragmas: IndexMap<String, Option<String>> = IndexMap::new();

        // Pragmas are applied in insertion order; inserting the keys up
        // front pins the order even when the setters run later.

        // Normally, page_size must be set before any other action on the
        // database. Defaults to 4096 for new databases.
        pragmas.insert("page_size".into(), None);

        // Don't set `journal_mode` unless the user requested it. WAL mode
        // is a permanent setting for created databases and changing into or
        // out of it requires an exclusive lock.
        pragmas.insert("journal_mode".into(), None);

        // We choose to enable foreign key enforcement by default, though
        // SQLite normally leaves it off for backward compatibility:
        // https://www.sqlite.org/foreignkeys.html#fk_enable
        pragmas.insert("foreign_keys".into(), Some("ON".into()));

        // The `synchronous` pragma defaults to FULL
        // https://www.sqlite.org/compile.html#default_synchronous.
        pragmas.insert("synchronous".into(), None);

        Self {
            filename: ":memory:".into(),
            in_memory: false,
            read_only: false,
            create_if_missing: false,
            busy_timeout: Duration::from_secs(5),
            log_settings: Default::default(),
            pragmas,
            statement_cache_capacity: crate::statement_cache::DEFAULT_CAPACITY,
            isolation_mode: IsolationMode::default(),
        }
    }
}

impl Rusq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a pragma for the new connection. Pragmas are applied on open, in
    /// the order they were first set.
    #[must_use]
    pub fn pragma(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pragmas.insert(key.into(), Some(value.into()));
        self
    }

    /// Set the enforcement of [foreign key constraints](https://www.sqlite.org/pragma.html#pragma_foreign_keys).
    ///
    /// rusq enables this by default so that foreign keys function as
    /// expected, compared to other database flavors.
    #[must_use]
    pub fn foreign_keys(self, on: bool) -> Self {
        self.pragma("foreign_keys", if on { "ON" } else { "OFF" })
    }

    /// Sets the [journal mode](https://www.sqlite.org/pragma.html#pragma_journal_mode)
    /// for the database connection.
    ///
    /// rusq does not set a journal mode by default, to avoid unintentionally
    /// changing a database into or out of WAL mode.
    #[must_use]
    pub fn journal_mode(self, mode: JournalMode) -> Self {
        self.pragma("journal_mode", mode.as_str())
    }

    /// Sets the [synchronous](https://www.sqlite.org/pragma.html#pragma_synchronous)
    /// setting for the database connection.
    #[must_use]
    pub fn synchronous(self, synchronous: Synchronous) -> Self {
        self.pragma("synchronous", synchronous.as_str())
    }

    /// Set this connection as read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set whether the database file should be created if it does not exist.
    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets the busy timeout, the total time the engine will sleep waiting
    /// for a lock before giving up with a busy error. Defaults to 5 seconds.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the capacity of the connection's prepared-statement cache.
    ///
    /// A capacity of 0 disables statement caching entirely; every execution
    /// prepares a fresh statement.
    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Sets the transaction handling mode for the connection. Defaults to
    /// [`IsolationMode::ImplicitTransaction`].
    #[must_use]
    pub fn isolation_mode(mut self, mode: IsolationMode) -> Self {
        self.isolation_mode = mode;
        self
    }

    /// Configure statement logging level.
    #[must_use]
    pub fn log_statements(mut self, level: LevelFilter) -> Self {
        self.log_settings.log_statements(level);
        self
    }

    /// Configure slow statement logging level and threshold.
    #[must_use]
    pub fn log_slow_statements(mut self, level: LevelFilter, duration: Duration) -> Self {
        self.log_settings.log_slow_statements(level, duration);
        self
    }

    /// Open a database file.
    pub fn open(mut self, filename: impl AsRef<Path>) -> Result<Connection> {
        self.filename = filename.as_ref().to_owned();
        Connection::establish(&self)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(mut self) -> Result<Connection> {
        self.filename = ":memory:".into();
        self.in_memory = true;
        Connection::establish(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults_and_spellings() {
        assert_eq!(JournalMode::default(), JournalMode::Wal);
        assert_eq!(Synchronous::default(), Synchronous::Full);
        assert_eq!(JournalMode::Off.as_str(), "OFF");
        assert_eq!(Synchronous::Extra.as_str(), "EXTRA");
    }

    #[test]
    fn test_mode_setters_feed_the_pragma_map() {
        let options = Rusq::new()
            .journal_mode(JournalMode::Memory)
            .synchronous(Synchronous::Normal);

        assert_eq!(
            options.pragmas.get("journal_mode"),
            Some(&Some("MEMORY".to_owned()))
        );
        assert_eq!(
            options.pragmas.get("synchronous"),
            Some(&Some("NORMAL".to_owned()))
        );
    }
}
