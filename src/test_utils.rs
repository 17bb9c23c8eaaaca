//! In-memory native backend for tests
//!
//! [`MemoryConnection`] and [`MemoryStatement`] simulate the native client
//! library: they hand out handles, keep a snapshot of every bound and defined
//! variable, store temporary LOB contents, and can be scripted to be slow or
//! to fail at specific calls.
//!
//! Enabled for the crate's own tests and behind the `test-utils` feature.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::constants::{ExecMode, NativeType, OracleType};
use crate::native::{
    LobHandle, NativeConnection, NativeError, NativeResult, NativeStatement, QueryInfo,
    VarHandle, VarSpec,
};
use crate::variable::{DataSlot, Variable};

/// ORA-01013: user requested cancel of current operation
pub const CANCEL_ERROR_CODE: i32 = 1013;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build column metadata for a scripted query
pub fn column_info(
    name: &str,
    oracle_type: OracleType,
    default_native_type: NativeType,
    client_size_in_bytes: u32,
) -> QueryInfo {
    QueryInfo {
        name: name.to_string(),
        oracle_type,
        default_native_type,
        client_size_in_bytes,
        precision: 0,
        scale: 0,
        null_ok: true,
        object_type: None,
    }
}

/// Scripted behaviour of a statement prepared by [`MemoryConnection`]
#[derive(Debug, Clone)]
pub struct MemoryScript {
    bind_count: Option<u32>,
    columns: Vec<QueryInfo>,
    row_count: Option<u64>,
    exec_delay: Duration,
    execute_error: Option<NativeError>,
    parse_error: Option<NativeError>,
    bind_error: Option<(String, NativeError)>,
    query_info_error_at: Option<u32>,
    define_error_at: Option<u32>,
    break_error: Option<NativeError>,
}

impl Default for MemoryScript {
    fn default() -> Self {
        Self {
            bind_count: Some(0),
            columns: Vec::new(),
            row_count: Some(0),
            exec_delay: Duration::ZERO,
            execute_error: None,
            parse_error: None,
            bind_error: None,
            query_info_error_at: None,
            define_error_at: None,
            break_error: None,
        }
    }
}

impl MemoryScript {
    /// Create a script with default behaviour
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of placeholders reported after a parse
    pub fn bind_count(mut self, count: u32) -> Self {
        self.bind_count = Some(count);
        self
    }

    /// Report the placeholder count as unavailable
    pub fn bind_count_unavailable(mut self) -> Self {
        self.bind_count = None;
        self
    }

    /// Add a query column
    pub fn column(mut self, info: QueryInfo) -> Self {
        self.columns.push(info);
        self
    }

    /// Rows affected reported after execution
    pub fn row_count(mut self, count: u64) -> Self {
        self.row_count = Some(count);
        self
    }

    /// Fail the rows-affected call
    pub fn row_count_unavailable(mut self) -> Self {
        self.row_count = None;
        self
    }

    /// Make every execution take this long unless interrupted
    pub fn delay(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    /// Fail every execution
    pub fn fail_execute(mut self, err: NativeError) -> Self {
        self.execute_error = Some(err);
        self
    }

    /// Fail parse-only executions
    pub fn fail_parse(mut self, err: NativeError) -> Self {
        self.parse_error = Some(err);
        self
    }

    /// Fail attaching a variable to the given target (position or name)
    pub fn fail_bind(mut self, target: impl Into<String>, err: NativeError) -> Self {
        self.bind_error = Some((target.into(), err));
        self
    }

    /// Fail reading the metadata of a 1-based column
    pub fn fail_query_info_at(mut self, pos: u32) -> Self {
        self.query_info_error_at = Some(pos);
        self
    }

    /// Fail defining a 1-based column
    pub fn fail_define_at(mut self, pos: u32) -> Self {
        self.define_error_at = Some(pos);
        self
    }

    /// Fail interrupt requests
    pub fn fail_break(mut self, err: NativeError) -> Self {
        self.break_error = Some(err);
        self
    }
}

#[derive(Debug)]
struct MemoryLob {
    oracle_type: OracleType,
    open: bool,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct ConnState {
    next_handle: u64,
    vars: BTreeMap<VarHandle, VarSpec>,
    allocations: Vec<VarSpec>,
    new_var_budget: Option<usize>,
    lobs: BTreeMap<LobHandle, MemoryLob>,
    lob_writes: usize,
    fail_lob_writes: bool,
    scripts: HashMap<String, MemoryScript>,
    prepared: Vec<Arc<MemoryStatement>>,
}

impl ConnState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// Simulated native connection
#[derive(Debug, Default)]
pub struct MemoryConnection {
    state: Mutex<ConnState>,
}

impl MemoryConnection {
    /// Create a new connection
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the behaviour of statements prepared for `sql`
    pub fn script(&self, sql: &str, script: MemoryScript) {
        lock(&self.state).scripts.insert(sql.to_string(), script);
    }

    /// Most recently prepared statement for `sql`
    pub fn statement(&self, sql: &str) -> Option<Arc<MemoryStatement>> {
        lock(&self.state)
            .prepared
            .iter()
            .rev()
            .find(|s| s.sql == sql)
            .cloned()
    }

    /// Let `n` more variable allocations succeed, then fail
    pub fn fail_new_var_after(&self, n: usize) {
        lock(&self.state).new_var_budget = Some(n);
    }

    /// Fail every LOB write
    pub fn fail_lob_writes(&self, fail: bool) {
        lock(&self.state).fail_lob_writes = fail;
    }

    /// Number of variables allocated and not yet released
    pub fn live_vars(&self) -> usize {
        lock(&self.state).vars.len()
    }

    /// Every variable shape requested so far
    pub fn allocations(&self) -> Vec<VarSpec> {
        lock(&self.state).allocations.clone()
    }

    /// Contents of a temporary LOB
    pub fn lob_data(&self, lob: LobHandle) -> Option<Vec<u8>> {
        lock(&self.state).lobs.get(&lob).map(|l| l.data.clone())
    }

    /// Type of a temporary LOB
    pub fn lob_type(&self, lob: LobHandle) -> Option<OracleType> {
        lock(&self.state).lobs.get(&lob).map(|l| l.oracle_type)
    }

    /// Whether a temporary LOB is still open
    pub fn lob_is_open(&self, lob: LobHandle) -> Option<bool> {
        lock(&self.state).lobs.get(&lob).map(|l| l.open)
    }

    /// Number of temporary LOBs not yet released
    pub fn live_lobs(&self) -> usize {
        lock(&self.state).lobs.len()
    }

    /// Number of LOB write calls so far
    pub fn lob_writes(&self) -> usize {
        lock(&self.state).lob_writes
    }
}

impl NativeConnection for MemoryConnection {
    fn prepare(&self, sql: &str) -> NativeResult<Arc<dyn NativeStatement>> {
        let mut state = lock(&self.state);
        let script = state.scripts.get(sql).cloned().unwrap_or_default();
        let stmt = Arc::new(MemoryStatement::new(sql, script));
        state.prepared.push(stmt.clone());
        Ok(stmt)
    }

    fn new_var(&self, spec: &VarSpec) -> NativeResult<VarHandle> {
        let mut state = lock(&self.state);
        if let Some(budget) = state.new_var_budget.as_mut() {
            if *budget == 0 {
                return Err(NativeError::new(4031, "unable to allocate shared memory")
                    .with_fn_name("dpiConn_newVar"));
            }
            *budget -= 1;
        }
        let handle = VarHandle(state.next_handle());
        state.vars.insert(handle, *spec);
        state.allocations.push(*spec);
        Ok(handle)
    }

    fn release_var(&self, var: &Variable) -> NativeResult<()> {
        let mut state = lock(&self.state);
        let handle = var.handle();
        if state.vars.remove(&handle).is_none() {
            return Err(NativeError::new(0, format!("invalid variable handle {}", handle.0)));
        }
        for lob in var.slots().iter().filter_map(DataSlot::as_lob) {
            state.lobs.remove(&lob);
        }
        Ok(())
    }

    fn new_temp_lob(&self, oracle_type: OracleType) -> NativeResult<LobHandle> {
        let mut state = lock(&self.state);
        let handle = LobHandle(state.next_handle());
        state.lobs.insert(
            handle,
            MemoryLob {
                oracle_type,
                open: false,
                data: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn lob_open_resource(&self, lob: LobHandle) -> NativeResult<()> {
        let mut state = lock(&self.state);
        let lob = state
            .lobs
            .get_mut(&lob)
            .ok_or_else(|| NativeError::new(22275, "invalid LOB locator specified"))?;
        lob.open = true;
        Ok(())
    }

    fn lob_write_bytes(&self, lob: LobHandle, offset: u64, data: &[u8]) -> NativeResult<()> {
        let mut state = lock(&self.state);
        if state.fail_lob_writes {
            return Err(NativeError::new(1691, "unable to extend lob segment"));
        }
        state.lob_writes += 1;
        let lob = state
            .lobs
            .get_mut(&lob)
            .ok_or_else(|| NativeError::new(22275, "invalid LOB locator specified"))?;
        if offset == 0 {
            return Err(NativeError::new(24801, "illegal parameter value in OCI lob function"));
        }
        let start = (offset - 1) as usize;
        if lob.data.len() < start + data.len() {
            lob.data.resize(start + data.len(), 0);
        }
        lob.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn lob_close_resource(&self, lob: LobHandle) -> NativeResult<()> {
        let mut state = lock(&self.state);
        let lob = state
            .lobs
            .get_mut(&lob)
            .ok_or_else(|| NativeError::new(22275, "invalid LOB locator specified"))?;
        lob.open = false;
        Ok(())
    }

    fn release_lob(&self, lob: LobHandle) -> NativeResult<()> {
        lock(&self.state)
            .lobs
            .remove(&lob)
            .map(|_| ())
            .ok_or_else(|| NativeError::new(22275, "invalid LOB locator specified"))
    }
}

/// Placeholder a variable was attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// 1-based position
    Pos(u32),
    /// Placeholder name
    Name(String),
}

/// One call to execute or execute-many
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// Mode passed to the call
    pub mode: ExecMode,
    /// Iteration count for execute-many
    pub iterations: Option<u32>,
    /// Whether the call ended because of an interrupt
    pub interrupted: bool,
}

#[derive(Debug, Default)]
struct StmtState {
    executions: Vec<ExecutionRecord>,
    binds: Vec<(BindTarget, Variable)>,
    defines: BTreeMap<u32, Variable>,
    fetch_array_size: Option<u32>,
}

impl StmtState {
    fn bind(&mut self, target: BindTarget, var: &Variable) {
        match self.binds.iter_mut().find(|(t, _)| *t == target) {
            Some(entry) => entry.1 = var.clone(),
            None => self.binds.push((target, var.clone())),
        }
    }
}

/// Simulated native statement
#[derive(Debug)]
pub struct MemoryStatement {
    sql: String,
    script: MemoryScript,
    state: Mutex<StmtState>,
    interrupted: AtomicBool,
    break_calls: AtomicUsize,
}

impl MemoryStatement {
    fn new(sql: &str, script: MemoryScript) -> Self {
        Self {
            sql: sql.to_string(),
            script,
            state: Mutex::new(StmtState::default()),
            interrupted: AtomicBool::new(false),
            break_calls: AtomicUsize::new(0),
        }
    }

    /// SQL text the statement was prepared with
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Every execute call so far
    pub fn executions(&self) -> Vec<ExecutionRecord> {
        lock(&self.state).executions.clone()
    }

    /// Snapshot of every attached variable, in attach order
    pub fn binds(&self) -> Vec<(BindTarget, Variable)> {
        lock(&self.state).binds.clone()
    }

    /// Variable attached to a 1-based position
    pub fn bound_at(&self, pos: u32) -> Option<Variable> {
        self.bound(&BindTarget::Pos(pos))
    }

    /// Variable attached to a placeholder name
    pub fn bound_to(&self, name: &str) -> Option<Variable> {
        self.bound(&BindTarget::Name(name.to_string()))
    }

    fn bound(&self, target: &BindTarget) -> Option<Variable> {
        lock(&self.state)
            .binds
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, v)| v.clone())
    }

    /// Variable defined for a 1-based column
    pub fn defined_at(&self, pos: u32) -> Option<Variable> {
        lock(&self.state).defines.get(&pos).cloned()
    }

    /// Fetch array size set on the statement
    pub fn fetch_array_size(&self) -> Option<u32> {
        lock(&self.state).fetch_array_size
    }

    /// Number of interrupt requests received
    pub fn break_calls(&self) -> usize {
        self.break_calls.load(Ordering::SeqCst)
    }

    fn run(&self, mode: ExecMode, iterations: Option<u32>) -> NativeResult<()> {
        let deadline = Instant::now() + self.script.exec_delay;
        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                lock(&self.state).executions.push(ExecutionRecord {
                    mode,
                    iterations,
                    interrupted: true,
                });
                return Err(NativeError::new(
                    CANCEL_ERROR_CODE,
                    "user requested cancel of current operation",
                ));
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }

        lock(&self.state).executions.push(ExecutionRecord {
            mode,
            iterations,
            interrupted: false,
        });
        match &self.script.execute_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn check_bind(&self, target: &str) -> NativeResult<()> {
        match &self.script.bind_error {
            Some((t, err)) if t == target => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

impl NativeStatement for MemoryStatement {
    fn execute(&self, mode: ExecMode) -> NativeResult<u32> {
        if mode.contains(ExecMode::PARSE_ONLY) {
            if let Some(err) = &self.script.parse_error {
                return Err(err.clone());
            }
            lock(&self.state).executions.push(ExecutionRecord {
                mode,
                iterations: None,
                interrupted: false,
            });
        } else {
            self.run(mode, None)?;
        }
        Ok(self.script.columns.len() as u32)
    }

    fn execute_many(&self, mode: ExecMode, iterations: u32) -> NativeResult<()> {
        self.run(mode, Some(iterations))
    }

    fn bind_count(&self) -> NativeResult<u32> {
        self.script
            .bind_count
            .ok_or_else(|| NativeError::new(0, "bind count unavailable"))
    }

    fn bind_by_pos(&self, pos: u32, var: &Variable) -> NativeResult<()> {
        self.check_bind(&pos.to_string())?;
        lock(&self.state).bind(BindTarget::Pos(pos), var);
        Ok(())
    }

    fn bind_by_name(&self, name: &str, var: &Variable) -> NativeResult<()> {
        self.check_bind(name)?;
        lock(&self.state).bind(BindTarget::Name(name.to_string()), var);
        Ok(())
    }

    fn row_count(&self) -> NativeResult<u64> {
        self.script
            .row_count
            .ok_or_else(|| NativeError::new(0, "row count unavailable"))
    }

    fn set_fetch_array_size(&self, rows: u32) -> NativeResult<()> {
        lock(&self.state).fetch_array_size = Some(rows);
        Ok(())
    }

    fn query_info(&self, pos: u32) -> NativeResult<QueryInfo> {
        if self.script.query_info_error_at == Some(pos) {
            return Err(NativeError::new(1007, "variable not in select list"));
        }
        pos.checked_sub(1)
            .and_then(|i| self.script.columns.get(i as usize))
            .cloned()
            .ok_or_else(|| NativeError::new(1007, "variable not in select list"))
    }

    fn define(&self, pos: u32, var: &Variable) -> NativeResult<()> {
        if self.script.define_error_at == Some(pos) {
            return Err(NativeError::new(1007, "variable not in select list"));
        }
        lock(&self.state).defines.insert(pos, var.clone());
        Ok(())
    }

    fn break_execution(&self) -> NativeResult<()> {
        self.break_calls.fetch_add(1, Ordering::SeqCst);
        self.interrupted.store(true, Ordering::SeqCst);
        match &self.script.break_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
