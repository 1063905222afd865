//! A synchronous SQLite binding built around two ideas: a per-connection
//! LRU cache of prepared statements, so repeated SQL is compiled once, and
//! a process-wide type adaptation protocol mapping host types to and from
//! native storage values.
//!
//! ```no_run
//! # fn main() -> rusq::Result<()> {
//! use rusq::{params, Rusq};
//!
//! let conn = Rusq::new().open_in_memory()?;
//! conn.execute("CREATE TABLE people (name TEXT, age INT)", ())?;
//! conn.execute("INSERT INTO people VALUES (?, ?)", params!["ada", 36])?;
//! conn.commit()?;
//!
//! let mut cursor = conn.execute("SELECT name, age FROM people", ())?;
//! while let Some(row) = cursor.fetchone()? {
//!     println!("{}: {:?}", row.get_named("name")?.as_text().unwrap_or(""), row.get(1)?);
//! }
//! # Ok(())
//! # }
//! ```

mod column;
mod connection;
mod cursor;
mod error;
mod logger;
mod row;
mod rusq;
mod sqlite;
mod statement_cache;

pub mod adapt;

pub use crate::{
    adapt::{
        defaults::register_default_adapters, register_adapter, register_converter, Param, Params,
    },
    column::Column,
    connection::{Connection, IsolationMode},
    cursor::Cursor,
    error::{Error, Result},
    logger::LogSettings,
    row::{Cell, CustomValue, Row, RowFactory},
    rusq::{JournalMode, Rusq, Synchronous},
    sqlite::{ErrorCode, SqliteError, Value},
};
