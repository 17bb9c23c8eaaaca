//! Cancellable native execution
//!
//! The native execute call blocks, so it runs on the blocking thread pool.
//! For the duration of the call a watcher task races the caller's
//! [`CancellationToken`] against a completion handshake; if the token fires
//! first the watcher asks the native statement to break the running call.
//! The watcher is always joined before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::constants::ExecMode;
use crate::error::{Error, Result};
use crate::native::NativeStatement;

/// How the statement is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Execute once
    Single,
    /// Execute once per row of the bound array variables
    Many(u32),
    /// Parse without executing
    ParseOnly,
}

impl Execution {
    /// Batch width reported in errors
    pub fn batch_len(&self) -> usize {
        match self {
            Execution::Many(n) => *n as usize,
            Execution::Single | Execution::ParseOnly => 0,
        }
    }

    fn mode(&self, mode: ExecMode) -> ExecMode {
        match self {
            Execution::ParseOnly => mode | ExecMode::PARSE_ONLY,
            Execution::Single | Execution::Many(_) => mode,
        }
    }
}

/// Sends at most one break request to a native statement
#[derive(Debug)]
pub struct Interrupter {
    stmt: Arc<dyn NativeStatement>,
    fired: AtomicBool,
}

impl Interrupter {
    /// Create an interrupter for a statement
    pub fn new(stmt: Arc<dyn NativeStatement>) -> Self {
        Self {
            stmt,
            fired: AtomicBool::new(false),
        }
    }

    /// Ask the native layer to break the running call.
    ///
    /// Only the first call reaches the native layer. A failing break is
    /// logged and otherwise ignored. Returns whether this call sent it.
    pub fn interrupt(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.stmt.break_execution() {
            Ok(()) => tracing::debug!("Interrupted native execution"),
            Err(e) => tracing::warn!(error = %e, "Failed to interrupt native execution"),
        }
        true
    }

    /// Whether an interrupt has been sent
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Run a native execution, interrupting it if `ctx` is canceled.
///
/// Returns the number of query columns reported by the native layer (0 for
/// execute-many). A token that is already canceled returns
/// [`Error::Canceled`] without calling into the native layer; an execution
/// that fails after being interrupted reports [`Error::Interrupted`].
pub async fn run_cancellable(
    ctx: &CancellationToken,
    stmt: Arc<dyn NativeStatement>,
    mode: ExecMode,
    execution: Execution,
) -> Result<u32> {
    if ctx.is_cancelled() {
        return Err(Error::Canceled);
    }

    let mode = execution.mode(mode);
    let interrupter = Arc::new(Interrupter::new(stmt.clone()));
    let (done_tx, done_rx) = oneshot::channel::<()>();

    let watcher = {
        let ctx = ctx.clone();
        let interrupter = interrupter.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                // Completion, or the sender dropped by a panicking call
                _ = done_rx => {}
                _ = ctx.cancelled() => {
                    interrupter.interrupt();
                }
            }
        })
    };

    tracing::trace!(mode = %mode, batch_len = execution.batch_len(), "Executing statement");
    let joined = tokio::task::spawn_blocking(move || {
        let result = match execution {
            Execution::Single | Execution::ParseOnly => stmt.execute(mode),
            Execution::Many(iterations) => stmt.execute_many(mode, iterations).map(|()| 0),
        };
        let _ = done_tx.send(());
        result
    })
    .await;

    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "Cancellation watcher failed");
    }

    let result = joined
        .map_err(|e| Error::Internal(format!("native execution task failed: {}", e)))?;
    match result {
        Ok(columns) => Ok(columns),
        Err(source) if interrupter.fired() => {
            tracing::debug!(error = %source, "Execution ended after interrupt");
            Err(Error::Interrupted {
                mode,
                batch_len: execution.batch_len(),
                source,
            })
        }
        Err(source) => Err(Error::NativeExecution {
            mode,
            batch_len: execution.batch_len(),
            source,
        }),
    }
}
