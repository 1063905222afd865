use std::{
    ffi::CString,
    io,
    ptr::{null, null_mut, NonNull},
    time::Duration,
};

use libsqlite3_sys::{
    sqlite3, SQLITE_OPEN_CREATE, SQLITE_OPEN_MEMORY, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_PRIVATECACHE,
    SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE,
};

use crate::{
    error::Error,
    sqlite::ffi,
    Rusq,
};

/// Managed handle to the raw SQLite3 database handle.
///
/// Owned by exactly one `ConnectionState`; the underlying database is
/// closed exactly once, when this is dropped.
#[derive(Debug)]
pub(crate) struct ConnectionHandle(NonNull<sqlite3>);

// A SQLite3 handle is safe to send between threads, provided not more than
// one thread accesses it at the same time. The connection mutex in
// `crate::connection` upholds this.
unsafe impl Send for ConnectionHandle {}

impl ConnectionHandle {
    pub(crate) unsafe fn new(ptr: *mut sqlite3) -> Self {
        Self(unsafe { NonNull::new_unchecked(ptr) })
    }

    pub(crate) fn as_ptr(&self) -> *mut sqlite3 {
        self.0.as_ptr()
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        ffi::last_insert_rowid(self.as_ptr())
    }

    pub(crate) fn changes(&self) -> i64 {
        ffi::changes(self.as_ptr())
    }

    pub(crate) fn total_changes(&self) -> i64 {
        ffi::total_changes(self.as_ptr())
    }

    /// True when the connection is outside any explicit or implicit
    /// transaction.
    pub(crate) fn autocommit_active(&self) -> bool {
        ffi::get_autocommit(self.as_ptr())
    }

    /// Run one or more statements that take no parameters and return no rows.
    pub(crate) fn exec(&self, query: impl Into<String>) -> Result<(), Error> {
        let query = CString::new(query.into())
            .map_err(|_| Error::Protocol("query contains nul bytes".into()))?;
        ffi::exec(self.as_ptr(), query.as_ptr())?;
        Ok(())
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        // https://sqlite.org/c3ref/close.html
        //
        // All statement handles belonging to this connection are finalized
        // before the owning `ConnectionState` drops this field, so a failure
        // here indicates a handle-lifecycle bug.
        if let Err(e) = ffi::close(self.0.as_ptr()) {
            panic!("{}", e);
        }
    }
}

pub(crate) struct EstablishParams {
    filename: CString,
    open_flags: i32,
    busy_timeout: Duration,
    pragmas: Vec<String>,
}

impl EstablishParams {
    pub(crate) fn from_options(options: &Rusq) -> Result<Self, Error> {
        let filename = options
            .filename
            .to_str()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "filename passed to SQLite must be valid UTF-8",
                )
            })?
            .to_owned();

        // [SQLITE_OPEN_NOMUTEX] asks for a connection object without its own
        // serializing mutex; all access goes through the connection lock in
        // `crate::connection`.
        let mut flags = SQLITE_OPEN_NOMUTEX | SQLITE_OPEN_PRIVATECACHE;

        flags |= if options.read_only {
            SQLITE_OPEN_READONLY
        } else if options.create_if_missing {
            SQLITE_OPEN_CREATE | SQLITE_OPEN_READWRITE
        } else {
            SQLITE_OPEN_READWRITE
        };

        if options.in_memory {
            flags |= SQLITE_OPEN_MEMORY;
        }

        let filename = CString::new(filename).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "filename passed to SQLite must not contain nul bytes",
            )
        })?;

        // Pragmas are applied in the insertion order of the builder's map.
        let pragmas = options
            .pragmas
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|value| format!("PRAGMA {key} = {value};"))
            })
            .collect();

        Ok(Self {
            filename,
            open_flags: flags,
            busy_timeout: options.busy_timeout,
            pragmas,
        })
    }

    /// Open the native connection and bring it to the configured baseline.
    pub(crate) fn establish(&self) -> Result<ConnectionHandle, Error> {
        let mut handle = null_mut();

        // <https://www.sqlite.org/c3ref/open.html>
        let open_res = ffi::open_v2(self.filename.as_ptr(), &mut handle, self.open_flags, null());

        if handle.is_null() {
            // Failed to allocate memory
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "SQLite is unable to allocate memory to hold the sqlite3 object",
            )));
        }

        if let Err(e) = open_res {
            // handle is already closed inside `open_v2`
            return Err(Error::Open(e));
        }

        // SAFETY: tested for NULL just above and open_v2 succeeded
        let handle = unsafe { ConnectionHandle::new(handle) };

        // Enable extended result codes
        // https://www.sqlite.org/c3ref/extended_result_codes.html
        // NOTE: ignore the failure here
        let _ = ffi::extended_result_codes(handle.as_ptr(), 1);

        // Configure a busy timeout. This causes SQLite to sleep in increasing
        // intervals when something is locked during a step, up to the
        // configured total. Clamp to `i32::MAX` ms to comply with the API.
        let ms = i32::try_from(self.busy_timeout.as_millis()).unwrap_or(i32::MAX);
        ffi::busy_timeout(handle.as_ptr(), ms).map_err(Error::Open)?;

        for pragma in &self.pragmas {
            handle.exec(pragma.clone())?;
        }

        Ok(handle)
    }
}
