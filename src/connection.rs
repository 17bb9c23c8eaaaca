//! Connection facade
//!
//! A [`Connection`] wraps a native connection handle established elsewhere,
//! carries the [`StatementConfig`] inherited by its statements, and tracks
//! whether a transaction is active so that statements know when to commit
//! on success.
//!
//! # Example
//!
//! ```rust,ignore
//! use oracle_exec::{Argument, Connection, StatementConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let conn = Connection::with_config(native, StatementConfig::new().fetch_array_size(256));
//! let stmt = conn.prepare("INSERT INTO users (id, name) VALUES (:1, :2)")?;
//!
//! let ctx = CancellationToken::new();
//! let result = stmt
//!     .exec(&ctx, vec![Argument::positional(1, vec![1, 2]), Argument::positional(2, vec!["a", "b"])])
//!     .await?;
//! println!("Rows affected: {:?}", result.rows_affected);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::config::StatementConfig;
use crate::error::Result;
use crate::native::NativeConnection;
use crate::statement::Statement;

// Connection ID counter
static CONNECTION_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

struct ConnectionInner {
    native: Arc<dyn NativeConnection>,
    in_transaction: AtomicBool,
    config: StatementConfig,
    id: u32,
}

/// Handle to a native connection.
///
/// Cloning is cheap; clones share the transaction flag.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Wrap a native connection with the default configuration
    pub fn new(native: Arc<dyn NativeConnection>) -> Self {
        Self::with_config(native, StatementConfig::default())
    }

    /// Wrap a native connection with the given configuration
    pub fn with_config(native: Arc<dyn NativeConnection>, config: StatementConfig) -> Self {
        let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::new(ConnectionInner {
                native,
                in_transaction: AtomicBool::new(false),
                config,
                id,
            }),
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Configuration inherited by prepared statements
    pub fn config(&self) -> &StatementConfig {
        &self.inner.config
    }

    /// Underlying native connection
    pub fn native(&self) -> &Arc<dyn NativeConnection> {
        &self.inner.native
    }

    /// Whether a transaction is active
    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction.load(Ordering::SeqCst)
    }

    /// Mark a transaction as started or finished.
    ///
    /// While a transaction is active, statements do not commit on success.
    pub fn set_in_transaction(&self, active: bool) {
        self.inner.in_transaction.store(active, Ordering::SeqCst);
        tracing::trace!(conn = self.inner.id, active, "Transaction flag changed");
    }

    /// Prepare a statement
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        let native = self.inner.native.prepare(sql)?;
        tracing::trace!(conn = self.inner.id, sql = sql, "Prepared statement");
        Ok(Statement::new(self.clone(), sql, native))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("in_transaction", &self.in_transaction())
            .field("config", &self.inner.config)
            .finish()
    }
}
