use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr::{null, null_mut, NonNull};

use libsqlite3_sys::{sqlite3_stmt, SQLITE_PREPARE_PERSISTENT, SQLITE_ROW};

use crate::{
    error::{Error, Result},
    sqlite::{connection::ConnectionHandle, error::SqliteError, ffi, Value},
};

/// Outcome of stepping a statement once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Row,
    Done,
}

/// Exclusive owner of one prepared statement inside the engine.
///
/// The handle is finalized exactly once, on drop. Reuse across executions
/// goes through `reset` + `clear_bindings`, never re-preparation.
#[derive(Debug)]
pub(crate) struct StatementHandle(NonNull<sqlite3_stmt>);

// Statement handles may be sent between threads as long as all calls on
// them are serialized, which the connection mutex guarantees.
unsafe impl Send for StatementHandle {}

impl StatementHandle {
    /// Compile `sql` into a prepared statement.
    ///
    /// Exactly one statement is accepted per call: trailing content other
    /// than whitespace or semicolons is rejected, as is input containing no
    /// statement at all. `persistent` sets [`SQLITE_PREPARE_PERSISTENT`]
    /// and should be used for statements headed for the cache.
    pub(crate) fn prepare(
        conn: &ConnectionHandle,
        sql: &str,
        persistent: bool,
    ) -> Result<StatementHandle> {
        let sql = sql.trim();

        if sql.len() > i32::MAX as usize {
            return Err(Error::Protocol(format!(
                "query string must be smaller than {} bytes",
                i32::MAX
            )));
        }

        let flags = if persistent {
            SQLITE_PREPARE_PERSISTENT
        } else {
            0
        };

        let mut stmt: *mut sqlite3_stmt = null_mut();
        let mut tail: *const c_char = null();

        // <https://www.sqlite.org/c3ref/prepare.html>
        ffi::prepare_v3(
            conn.as_ptr(),
            sql.as_ptr() as *const c_char,
            sql.len() as i32,
            flags as u32,
            &mut stmt,
            &mut tail,
        )
        .map_err(Error::Prepare)?;

        // tail points at the first byte past the end of the first statement;
        // only that first statement was compiled.
        let consumed = (tail as usize) - (sql.as_ptr() as usize);
        let rest = sql[consumed..].trim_matches(|c: char| c.is_whitespace() || c == ';');
        if !rest.is_empty() {
            if let Some(stmt) = NonNull::new(stmt) {
                // finalize the statement we did compile before bailing
                drop(StatementHandle(stmt));
            }
            return Err(Error::Protocol(
                "can only execute one statement at a time".into(),
            ));
        }

        match NonNull::new(stmt) {
            Some(stmt) => Ok(StatementHandle(stmt)),
            // prepare succeeded but compiled nothing: input was empty or
            // consisted only of comments
            None => Err(Error::Protocol("query contains no statements".into())),
        }
    }

    fn as_ptr(&self) -> *mut sqlite3_stmt {
        self.0.as_ptr()
    }

    pub(crate) fn column_count(&self) -> usize {
        ffi::column_count(self.as_ptr()) as usize
    }

    pub(crate) fn column_name(&self, index: usize) -> String {
        let name = ffi::column_name(self.as_ptr(), index as i32);
        debug_assert!(!name.is_null());
        unsafe { CStr::from_ptr(name).to_string_lossy().into_owned() }
    }

    /// The declared type of a result column, if the column maps directly to
    /// a table column. Expressions and subqueries have no declared type.
    pub(crate) fn column_decltype(&self, index: usize) -> Option<String> {
        let decl = ffi::column_decltype(self.as_ptr(), index as i32);
        if decl.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(decl).to_string_lossy().into_owned() })
    }

    pub(crate) fn bind_parameter_count(&self) -> usize {
        ffi::bind_parameter_count(self.as_ptr()) as usize
    }

    /// The name of a bind parameter, prefix included. The first parameter
    /// has index 1.
    pub(crate) fn bind_parameter_name(&self, index: usize) -> Option<String> {
        let name = ffi::bind_parameter_name(self.as_ptr(), index as i32);
        if name.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(name).to_string_lossy().into_owned() })
    }

    /// Resolve a parameter name (with prefix) to its 1-based index, or 0 if
    /// no such parameter exists.
    pub(crate) fn bind_parameter_index(&self, name: &str) -> usize {
        let Ok(name) = CString::new(name) else {
            return 0;
        };
        ffi::bind_parameter_index(self.as_ptr(), name.as_ptr()) as usize
    }

    /// Bind one native value at the given 1-based index.
    pub(crate) fn bind_value(&mut self, index: usize, value: &Value) -> Result<()> {
        let i = index as i32;
        let res = match value {
            Value::Null => ffi::bind_null(self.as_ptr(), i),
            Value::Integer(v) => ffi::bind_int64(self.as_ptr(), i, *v),
            Value::Real(v) => ffi::bind_double(self.as_ptr(), i, *v),
            Value::Text(v) => ffi::bind_text64(
                self.as_ptr(),
                i,
                v.as_ptr() as *const c_char,
                v.len() as u64,
            ),
            Value::Blob(v) => {
                ffi::bind_blob64(self.as_ptr(), i, v.as_ptr() as *const _, v.len() as u64)
            }
        };

        res.map_err(|source| Error::Bind { index, source })
    }

    /// Read one result column as an owned native value.
    ///
    /// TEXT is required to be valid UTF-8; the engine stores whatever bytes
    /// were bound, so a blob smuggled in as text surfaces here as an error
    /// rather than being silently altered.
    pub(crate) fn column_value(&self, index: usize) -> Result<Value> {
        let i = index as i32;
        Ok(match ffi::column_type(self.as_ptr(), i) {
            libsqlite3_sys::SQLITE_NULL => Value::Null,
            libsqlite3_sys::SQLITE_INTEGER => Value::Integer(ffi::column_int64(self.as_ptr(), i)),
            libsqlite3_sys::SQLITE_FLOAT => Value::Real(ffi::column_double(self.as_ptr(), i)),
            libsqlite3_sys::SQLITE_TEXT => {
                let bytes = self.column_bytes(i);
                Value::Text(String::from_utf8(bytes).map_err(|e| {
                    Error::Protocol(format!("column {index} contains invalid UTF-8 text: {e}"))
                })?)
            }
            libsqlite3_sys::SQLITE_BLOB => Value::Blob(self.column_bytes(i)),
            code => {
                return Err(Error::Protocol(format!(
                    "unknown column type code {code} for column {index}"
                )))
            }
        })
    }

    fn column_bytes(&self, index: i32) -> Vec<u8> {
        let len = ffi::column_bytes(self.as_ptr(), index) as usize;
        if len == 0 {
            return Vec::new();
        }
        let ptr = ffi::column_blob(self.as_ptr(), index) as *const u8;
        // SAFETY: sqlite guarantees `ptr` is valid for `len` bytes until the
        // next statement call; we copy out immediately.
        unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
    }

    pub(crate) fn changes(&self) -> i64 {
        // number of changes of the *last* statement on this connection
        ffi::changes(ffi::db_handle(self.as_ptr()))
    }

    pub(crate) fn step(&mut self) -> std::result::Result<Step, SqliteError> {
        match ffi::step(self.as_ptr())? {
            SQLITE_ROW => Ok(Step::Row),
            _ => Ok(Step::Done),
        }
    }

    pub(crate) fn reset(&mut self) -> std::result::Result<(), SqliteError> {
        ffi::reset(self.as_ptr())
    }

    pub(crate) fn clear_bindings(&mut self) {
        ffi::clear_bindings(self.as_ptr());
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        // Reset before finalizing so sqlite3_finalize does not report the
        // error of an interrupted statement as a finalize failure.
        if ffi::reset(self.as_ptr()).is_err() {
            // the step error was already surfaced when it happened
        }

        // https://sqlite.org/c3ref/finalize.html
        if let Err(e) = ffi::finalize(self.as_ptr()) {
            tracing::error!("sqlite3_finalize failed: {}", e);
        }
    }
}
