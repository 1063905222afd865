use indexmap::IndexMap;

use crate::{
    sqlite::{connection::ConnectionHandle, statement::StatementHandle},
    Result,
};

/// Default capacity for [`StatementCache`].
pub(crate) const DEFAULT_CAPACITY: usize = 128;

/// One cached prepared statement plus its bookkeeping.
///
/// Entries are owned exclusively by the cache. A cursor that checks an
/// entry out holds only the SQL key and re-resolves through the cache on
/// every access, so eviction can never leave a dangling reference.
#[derive(Debug)]
struct CacheEntry {
    statement: StatementHandle,
    /// Checked out by exactly one cursor. Never evicted while set.
    in_use: bool,
    /// Invalidated while checked out; finalized on checkin instead of
    /// being returned to circulation.
    stale: bool,
    last_used: u64,
}

/// What a checkout handed back: a slot in the cache, or a one-off
/// statement prepared outside it.
///
/// The cache keeps a single in-flight slot per SQL text. When the same
/// text is executed again while the cached statement is still running
/// (a nested re-entry of one query), the second execution is served by an
/// uncached statement owned by the caller.
#[derive(Debug)]
pub(crate) enum CheckedOut {
    Cached(String),
    Uncached(StatementHandle),
}

/// A per-connection cache of prepared statements, keyed by the literal SQL
/// text. When full, the least recently used statement that is not checked
/// out gets removed.
#[derive(Debug)]
pub(crate) struct StatementCache {
    entries: IndexMap<String, CacheEntry>,
    capacity: usize,
    /// Monotonic recency counter, bumped on every checkout.
    tick: u64,
    /// Native prepares issued through this cache, hits excluded.
    prepares: u64,
}

impl StatementCache {
    /// Create a new cache with the given `capacity`. A capacity of 0
    /// disables caching; every checkout prepares an uncached statement.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
            tick: 0,
            prepares: 0,
        }
    }

    /// Acquire a prepared statement for `sql`, preparing one on a cache
    /// miss. The returned entry is exclusively the caller's until it is
    /// checked back in.
    pub(crate) fn checkout(
        &mut self,
        conn: &ConnectionHandle,
        sql: &str,
    ) -> Result<CheckedOut> {
        if self.capacity == 0 {
            self.prepares += 1;
            return Ok(CheckedOut::Uncached(StatementHandle::prepare(
                conn, sql, false,
            )?));
        }

        self.tick += 1;

        if let Some(entry) = self.entries.get_mut(sql) {
            if entry.in_use {
                // the single in-flight slot for this text is taken; serve
                // this execution directly from the engine
                self.prepares += 1;
                return Ok(CheckedOut::Uncached(StatementHandle::prepare(
                    conn, sql, false,
                )?));
            }

            // executed before; reset to a clean baseline before reuse
            entry.statement.reset()?;
            entry.statement.clear_bindings();
            entry.in_use = true;
            entry.last_used = self.tick;
            return Ok(CheckedOut::Cached(sql.to_owned()));
        }

        let statement = StatementHandle::prepare(conn, sql, true)?;
        self.prepares += 1;

        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        self.entries.insert(
            sql.to_owned(),
            CacheEntry {
                statement,
                in_use: true,
                stale: false,
                last_used: self.tick,
            },
        );

        Ok(CheckedOut::Cached(sql.to_owned()))
    }

    /// Return a checked-out entry, resetting its execution state so it is
    /// immediately reusable, or finalizing it if it went stale while out.
    pub(crate) fn checkin(&mut self, key: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };

        if entry.stale {
            self.entries.shift_remove(key);
            return;
        }

        // reset failures here replay the step error that was already
        // surfaced to the caller; the entry stays usable either way
        let _ = entry.statement.reset();
        entry.statement.clear_bindings();
        entry.in_use = false;
    }

    /// Resolve a checked-out entry's statement. Returns `None` if the
    /// entry was invalidated and removed since checkout.
    pub(crate) fn statement(&mut self, key: &str) -> Option<&mut StatementHandle> {
        self.entries
            .get_mut(key)
            .map(|entry| &mut entry.statement)
    }

    /// Drop every cached statement. Prepared plans can go stale when the
    /// schema changes; entries currently checked out are marked stale and
    /// die on checkin rather than being yanked mid-execution.
    pub(crate) fn invalidate_all(&mut self) {
        self.entries.retain(|_, entry| {
            if entry.in_use {
                entry.stale = true;
                true
            } else {
                false
            }
        });
    }

    /// Finalize every cached statement, checked out or not. Only for
    /// connection teardown, after all cursors are closed.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// The number of statements in the cache.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// The maximum number of statements the cache can hold.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Native prepares issued through this cache so far.
    pub(crate) fn total_prepares(&self) -> u64 {
        self.prepares
    }

    /// True if the cache holds an entry for this SQL text.
    #[cfg(test)]
    pub(crate) fn contains_key(&self, sql: &str) -> bool {
        self.entries.contains_key(sql)
    }

    /// Remove the least recently used entry that is not checked out. An
    /// in-use entry is never the victim, even when it is the oldest.
    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.in_use)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            self.entries.shift_remove(&key);
        }
    }
}
