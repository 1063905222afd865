//! Types for working with errors produced by rusq.

use std::io;

use crate::sqlite::SqliteError;

/// A specialized `Result` type for rusq.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents all the ways a method can fail within rusq.
///
/// Native engine diagnostics are preserved verbatim wherever one exists;
/// the binding never swallows an engine error, and always resets native
/// statement state to a reusable baseline before surfacing one.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file could not be opened.
    #[error("unable to open database: {0}")]
    Open(#[source] SqliteError),

    /// Statement compilation failed: a syntax error, or a reference to a
    /// schema object that does not exist. The statement is not cached.
    #[error("failed to prepare statement: {0}")]
    Prepare(#[source] SqliteError),

    /// The engine rejected a bound parameter value.
    #[error("failed to bind parameter {index}: {source}")]
    Bind {
        index: usize,
        #[source]
        source: SqliteError,
    },

    /// The number of supplied positional parameters does not match the
    /// statement. No partial bind is retained.
    #[error("statement expects {expected} parameters, {supplied} supplied")]
    ParameterCount { expected: usize, supplied: usize },

    /// A named parameter that does not occur in the statement.
    #[error("no parameter named {0:?} in statement")]
    ParameterNotFound(String),

    /// Error returned by the engine during execution, e.g. a constraint
    /// violation.
    #[error("error returned from database: {0}")]
    Sqlite(#[from] SqliteError),

    /// A host value that could not be adapted to a native storage value:
    /// either no adapter is registered for its type, or the adapter itself
    /// rejected the value. Raised before any native call is made.
    #[error("cannot adapt host value of type {type_name}: {message}")]
    Adapt { type_name: String, message: String },

    /// A registered converter rejected a column value.
    #[error("converter for declared type {declared_type:?} failed: {message}")]
    Convert {
        declared_type: String,
        message: String,
    },

    /// Operation on a connection after `close`.
    #[error("connection is closed")]
    ConnectionClosed,

    /// Operation on a cursor after `close`.
    #[error("cursor is closed")]
    CursorClosed,

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// No column found for the given name.
    #[error("no column found for name: {0}")]
    ColumnNotFound(String),

    /// Unexpected or invalid data encountered at the engine boundary, or a
    /// misuse of the statement interface (multiple statements in one call,
    /// empty queries, and the like).
    #[error("{0}")]
    Protocol(String),

    #[error("error communicating with database: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The underlying engine diagnostic, when this error carries one.
    pub fn sqlite_error(&self) -> Option<&SqliteError> {
        match self {
            Error::Open(e)
            | Error::Prepare(e)
            | Error::Bind { source: e, .. }
            | Error::Sqlite(e) => Some(e),
            _ => None,
        }
    }

    /// True for execution errors caused by a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::Sqlite(e) if e.is_constraint())
    }
}
