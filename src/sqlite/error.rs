use std::ffi::CStr;

use libsqlite3_sys::{self, sqlite3};

use crate::sqlite::ffi;

// Error Codes And Messages
// https://www.sqlite.org/c3ref/errcode.html

/// Primary SQLite result codes.
///
/// **Note:** This enum is marked `#[non_exhaustive]`; avoid exhaustive
/// matches as new variants may be introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    Error,
    Internal,
    Perm,
    Abort,
    Busy,
    Locked,
    NoMem,
    ReadOnly,
    Interrupt,
    IoErr,
    Corrupt,
    NotFound,
    Full,
    CantOpen,
    Protocol,
    Empty,
    Schema,
    TooBig,
    Constraint,
    Mismatch,
    Misuse,
    NoLfs,
    Auth,
    Format,
    Range,
    NotADB,
    Notice,
    Warning,
    Unknown(i32),
}

impl ErrorCode {
    pub(crate) fn from_code(code: i32) -> ErrorCode {
        match code & 255 {
            libsqlite3_sys::SQLITE_ERROR => ErrorCode::Error,
            libsqlite3_sys::SQLITE_INTERNAL => ErrorCode::Internal,
            libsqlite3_sys::SQLITE_PERM => ErrorCode::Perm,
            libsqlite3_sys::SQLITE_ABORT => ErrorCode::Abort,
            libsqlite3_sys::SQLITE_BUSY => ErrorCode::Busy,
            libsqlite3_sys::SQLITE_LOCKED => ErrorCode::Locked,
            libsqlite3_sys::SQLITE_NOMEM => ErrorCode::NoMem,
            libsqlite3_sys::SQLITE_READONLY => ErrorCode::ReadOnly,
            libsqlite3_sys::SQLITE_INTERRUPT => ErrorCode::Interrupt,
            libsqlite3_sys::SQLITE_IOERR => ErrorCode::IoErr,
            libsqlite3_sys::SQLITE_CORRUPT => ErrorCode::Corrupt,
            libsqlite3_sys::SQLITE_NOTFOUND => ErrorCode::NotFound,
            libsqlite3_sys::SQLITE_FULL => ErrorCode::Full,
            libsqlite3_sys::SQLITE_CANTOPEN => ErrorCode::CantOpen,
            libsqlite3_sys::SQLITE_PROTOCOL => ErrorCode::Protocol,
            libsqlite3_sys::SQLITE_EMPTY => ErrorCode::Empty,
            libsqlite3_sys::SQLITE_SCHEMA => ErrorCode::Schema,
            libsqlite3_sys::SQLITE_TOOBIG => ErrorCode::TooBig,
            libsqlite3_sys::SQLITE_CONSTRAINT => ErrorCode::Constraint,
            libsqlite3_sys::SQLITE_MISMATCH => ErrorCode::Mismatch,
            libsqlite3_sys::SQLITE_MISUSE => ErrorCode::Misuse,
            libsqlite3_sys::SQLITE_NOLFS => ErrorCode::NoLfs,
            libsqlite3_sys::SQLITE_AUTH => ErrorCode::Auth,
            libsqlite3_sys::SQLITE_FORMAT => ErrorCode::Format,
            libsqlite3_sys::SQLITE_RANGE => ErrorCode::Range,
            libsqlite3_sys::SQLITE_NOTADB => ErrorCode::NotADB,
            libsqlite3_sys::SQLITE_NOTICE => ErrorCode::Notice,
            libsqlite3_sys::SQLITE_WARNING => ErrorCode::Warning,
            _ => ErrorCode::Unknown(code),
        }
    }
}

/// An error reported by the SQLite engine.
///
/// Carries the primary result code, the raw extended result code, and the
/// engine's message verbatim so callers can correlate failures with other
/// engine-level diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("(code: {code:?}, extended: {extended}) {message}")]
pub struct SqliteError {
    pub(crate) code: ErrorCode,
    pub(crate) extended: i32,
    pub message: String,
}

impl SqliteError {
    pub(crate) fn new(handle: *mut sqlite3) -> Self {
        let extended = ffi::extended_errcode(handle);
        let message = unsafe {
            let msg = ffi::errmsg(handle);
            debug_assert!(!msg.is_null());
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        };

        Self {
            code: ErrorCode::from_code(extended),
            extended,
            message,
        }
    }

    /// The primary result code for this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The raw extended result code for this error.
    pub fn extended_code(&self) -> i32 {
        self.extended
    }

    pub(crate) fn is_constraint(&self) -> bool {
        self.code == ErrorCode::Constraint
    }
}
