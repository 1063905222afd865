//! Safe lifecycle layer over the embedded SQLite engine: connection and
//! statement handles, native values, and error codes. No policy lives
//! here; caching and transaction rules belong to the layers above.

pub(crate) mod connection;
pub mod error;
pub(crate) mod ffi;
pub(crate) mod statement;
mod value;

pub use error::{ErrorCode, SqliteError};
pub use value::Value;
