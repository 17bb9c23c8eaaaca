#![warn(missing_docs)]

//! # oracle-exec
//!
//! Statement execution and result binding for Oracle drivers built on a
//! native client library.
//!
//! The crate takes a prepared statement plus caller-supplied argument values,
//! converts the values into native bind variables, executes the statement
//! once or once per array row, and for queries prepares typed column buffers
//! for row retrieval. The native library itself is reached through the
//! [`NativeConnection`] and [`NativeStatement`] traits; the crate owns every
//! bind and fetch buffer and only hands out opaque handles.
//!
//! ## Features
//!
//! - **Async/await** - Built on Tokio; blocking native calls run on the blocking pool
//! - **Cancellation** - A canceled [`CancellationToken`] interrupts a running execution
//! - **Batching** - Array arguments execute once per row, or bind as PL/SQL arrays
//! - **LOB streaming** - [`Lob`] arguments are streamed into temporary LOBs in chunks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oracle_exec::{Argument, Connection};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(native: std::sync::Arc<dyn oracle_exec::NativeConnection>) -> oracle_exec::Result<()> {
//! let conn = Connection::new(native);
//! let ctx = CancellationToken::new();
//!
//! // DML commits on success outside a transaction
//! let stmt = conn.prepare("INSERT INTO users (id, name) VALUES (:1, :2)")?;
//! stmt.exec(&ctx, vec![Argument::positional(1, 1), Argument::positional(2, "Alice")]).await?;
//!
//! // Equal length arrays run the statement once per element
//! stmt.exec(&ctx, vec![
//!     Argument::positional(1, vec![2, 3]),
//!     Argument::positional(2, vec!["Bob", "Carol"]),
//! ]).await?;
//!
//! // Queries return column buffers ready for fetching
//! let query = conn.prepare("SELECT id, name FROM users WHERE id > :1")?;
//! let rows = query.query(&ctx, vec![Argument::positional(1, 0)]).await?;
//! for column in rows.columns() {
//!     println!("{}: {:?}", column.name, column.native_type);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Value Kinds
//!
//! | Rust Type | Oracle Type | Native Type |
//! |-----------|-------------|-------------|
//! | `i8` .. `i64`, `isize` | NUMBER | Int64 |
//! | `u8` .. `u64`, `usize` | NUMBER | Uint64 |
//! | `f32` / `f64` | NUMBER | Float / Double |
//! | `bool` | BOOLEAN | Boolean |
//! | `Vec<u8>`, `&[u8]` | RAW | Bytes |
//! | `String`, `&str` | VARCHAR2 | Bytes |
//! | `chrono::DateTime<FixedOffset>` | TIMESTAMP WITH TIME ZONE | Timestamp |
//! | [`Lob`] | CLOB / BLOB | Lob |
//!
//! A `Vec` of any of these (other than `u8`) is an array argument.

pub mod batch;
pub mod bind;
pub mod config;
pub mod connection;
pub mod constants;
pub mod encode;
pub mod error;
pub mod execute;
pub mod native;
pub mod rows;
pub mod statement;
pub mod types;
pub mod value;
pub mod variable;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use batch::BatchBuilder;
pub use bind::BindPlan;
pub use config::StatementConfig;
pub use connection::Connection;
pub use constants::{ExecMode, NativeType, OracleType};
pub use encode::BindKind;
pub use error::{Error, Result};
pub use execute::{Execution, Interrupter};
pub use native::{
    LobHandle, NativeConnection, NativeError, NativeResult, NativeStatement, ObjectTypeHandle,
    QueryInfo, VarHandle, VarSpec,
};
pub use rows::{Column, OpenRowsError, Rows};
pub use statement::{ExecResult, Statement};
pub use types::{Lob, Timestamp};
pub use value::{Argument, Array, BindName, ExecOption, Value};
pub use variable::{DataSlot, VarArena, Variable};

// Re-export the cancellation token used by every execution entry point
pub use tokio_util::sync::CancellationToken;
