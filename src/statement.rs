//! Prepared statement execution
//!
//! A [`Statement`] binds caller arguments, executes, and for queries opens
//! the result set. One async mutex per statement covers the whole
//! bind → execute → open sequence, so callers sharing a statement are
//! serialized. The blocking native work runs on the blocking thread pool.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::bind::{self, BindPlan};
use crate::connection::Connection;
use crate::constants::ExecMode;
use crate::error::{Error, Result};
use crate::execute::{self, Execution};
use crate::native::NativeStatement;
use crate::rows::{self, OpenRowsError, Rows};
use crate::value::{Argument, ExecOption, Value};
use crate::variable::VarArena;

/// Outcome of a non-query execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows affected, `None` when the native layer could not tell
    pub rows_affected: Option<u64>,
}

#[derive(Debug)]
struct StatementState {
    native: Option<Arc<dyn NativeStatement>>,
    arena: VarArena,
    plsql_arrays: bool,
    array_len: Option<usize>,
}

impl StatementState {
    fn native(&self) -> Result<Arc<dyn NativeStatement>> {
        self.native.clone().ok_or(Error::StatementClosed)
    }

    /// Strip option markers from the arguments, applying them
    fn take_options(&mut self, args: Vec<Argument>) -> Vec<Argument> {
        args.into_iter()
            .filter(|arg| match arg.value {
                Value::Option(ExecOption::PlSqlArrays) => {
                    self.plsql_arrays = true;
                    false
                }
                _ => true,
            })
            .collect()
    }
}

/// A prepared statement
#[derive(Debug)]
pub struct Statement {
    conn: Connection,
    sql: String,
    state: Arc<Mutex<StatementState>>,
}

impl Statement {
    pub(crate) fn new(conn: Connection, sql: &str, native: Arc<dyn NativeStatement>) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            state: Arc::new(Mutex::new(StatementState {
                native: Some(native),
                arena: VarArena::new(),
                plsql_arrays: false,
                array_len: None,
            })),
        }
    }

    /// SQL text the statement was prepared with
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Leave array arguments as PL/SQL arrays instead of executing once per
    /// element
    pub async fn set_plsql_arrays(&self, enabled: bool) {
        self.state.lock().await.plsql_arrays = enabled;
    }

    /// Whether array arguments are bound as PL/SQL arrays
    pub async fn plsql_arrays(&self) -> bool {
        self.state.lock().await.plsql_arrays
    }

    /// Batch length of the last bind, `None` if it had no array argument
    pub async fn array_len(&self) -> Option<usize> {
        self.state.lock().await.array_len
    }

    /// Execute a statement that does not return rows.
    ///
    /// Array arguments of equal length run the statement once per element
    /// unless PL/SQL arrays are enabled. Outside a transaction the execution
    /// commits on success.
    pub async fn exec(&self, ctx: &CancellationToken, args: Vec<Argument>) -> Result<ExecResult> {
        if ctx.is_cancelled() {
            return Err(Error::Canceled);
        }

        let state = self.state.clone().lock_owned().await;
        let (state, native, plan) = self.bind(state, args).await?;

        let mode = if self.conn.in_transaction() {
            ExecMode::DEFAULT
        } else {
            ExecMode::COMMIT_ON_SUCCESS
        };
        let execution = if plan.exec_many {
            Execution::Many(plan.iterations() as u32)
        } else {
            Execution::Single
        };

        execute::run_cancellable(ctx, native.clone(), mode, execution).await?;

        let rows_affected = match native.row_count() {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(error = %e, "Rows affected unavailable");
                None
            }
        };
        drop(state);

        tracing::debug!(sql = %self.sql, mode = %mode, rows_affected = ?rows_affected, "Executed statement");
        Ok(ExecResult { rows_affected })
    }

    /// Execute a query and open its result set
    pub async fn query(&self, ctx: &CancellationToken, args: Vec<Argument>) -> Result<Rows> {
        if ctx.is_cancelled() {
            return Err(Error::Canceled);
        }

        let state = self.state.clone().lock_owned().await;
        let (state, native, _) = self.bind(state, args).await?;

        let column_count =
            execute::run_cancellable(ctx, native.clone(), ExecMode::DEFAULT, Execution::Single)
                .await?;

        let opened = rows::open_rows(
            self.conn.native().clone(),
            native,
            self.conn.config(),
            column_count as usize,
        );
        drop(state);

        match opened {
            Ok(rows) => Ok(rows),
            Err(OpenRowsError { rows, source }) => {
                if let Err(e) = rows.close() {
                    tracing::warn!(error = %e, "Failed to release partial result set");
                }
                Err(source)
            }
        }
    }

    /// Execute without cancellation
    pub async fn exec_background(&self, args: Vec<Argument>) -> Result<ExecResult> {
        self.exec(&CancellationToken::new(), args).await
    }

    /// Query without cancellation
    pub async fn query_background(&self, args: Vec<Argument>) -> Result<Rows> {
        self.query(&CancellationToken::new(), args).await
    }

    /// Number of placeholders, found by a parse-only execution.
    ///
    /// `None` when the native layer cannot tell.
    pub async fn num_input(&self) -> Option<usize> {
        let state = self.state.lock().await;
        let native = state.native().ok()?;
        let ctx = CancellationToken::new();
        let parsed =
            execute::run_cancellable(&ctx, native.clone(), ExecMode::DEFAULT, Execution::ParseOnly)
                .await;
        if let Err(e) = parsed {
            tracing::debug!(error = %e, "Parse failed");
            return None;
        }
        match native.bind_count() {
            Ok(n) => Some(n as usize),
            Err(e) => {
                tracing::debug!(error = %e, "Bind count unavailable");
                None
            }
        }
    }

    /// Release the bind variables and the native statement.
    ///
    /// Later executions fail with [`Error::StatementClosed`]. Closing twice
    /// is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.native.take().is_none() {
            return Ok(());
        }
        state.array_len = None;
        state.arena.release_all(self.conn.native().as_ref())?;
        tracing::trace!(sql = %self.sql, "Closed statement");
        Ok(())
    }

    /// Consume options and bind the arguments on the blocking thread pool
    async fn bind(
        &self,
        mut state: OwnedMutexGuard<StatementState>,
        args: Vec<Argument>,
    ) -> Result<(OwnedMutexGuard<StatementState>, Arc<dyn NativeStatement>, BindPlan)> {
        let native = state.native()?;
        let args = state.take_options(args);

        let conn = self.conn.native().clone();
        let config = self.conn.config().clone();
        let stmt = native.clone();
        let (mut state, plan) = tokio::task::spawn_blocking(move || {
            let plsql_arrays = state.plsql_arrays;
            let plan = bind::bind(
                conn.as_ref(),
                stmt.as_ref(),
                &config,
                &mut state.arena,
                plsql_arrays,
                args,
            );
            (state, plan)
        })
        .await
        .map_err(|e| Error::Internal(format!("bind task failed: {}", e)))?;

        let plan = plan?;
        state.array_len = plan.array_len;
        Ok((state, native, plan))
    }
}
