//! Boundary to the native client library
//!
//! The engine never touches native memory directly. A binding for the native
//! library implements [`NativeConnection`] and [`NativeStatement`]; the engine
//! only passes opaque handles and read-only views of the data slots it owns.
//!
//! Implementations are expected to turn a failure status of the underlying
//! call into a [`NativeError`] by fetching the library's last error.

use std::fmt;
use std::sync::Arc;

use crate::constants::{ExecMode, NativeType, OracleType};
use crate::variable::Variable;

/// Error reported by the native client library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Oracle error code (ORA-xxxxx)
    pub code: i32,
    /// Error message
    pub message: String,
    /// Native function that failed, if known
    pub fn_name: Option<String>,
    /// Internal action being performed, if known
    pub action: Option<String>,
}

impl NativeError {
    /// Create a new native error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fn_name: None,
            action: None,
        }
    }

    /// Attach the name of the failing native function
    pub fn with_fn_name(mut self, fn_name: impl Into<String>) -> Self {
        self.fn_name = Some(fn_name.into());
        self
    }

    /// Attach the internal action being performed
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORA-{:05}: {}", self.code, self.message)?;
        if let Some(fn_name) = &self.fn_name {
            write!(f, " ({}", fn_name)?;
            if let Some(action) = &self.action {
                write!(f, ": {}", action)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for NativeError {}

/// Result of a native call
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Opaque handle to a native variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarHandle(pub u64);

/// Opaque handle to a native LOB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LobHandle(pub u64);

/// Opaque handle to a native object type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectTypeHandle(pub u64);

/// Shape of a variable requested from the native library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarSpec {
    /// Database side type
    pub wire_type: OracleType,
    /// Transport representation
    pub native_type: NativeType,
    /// Number of rows (maximum array size), always at least 1
    pub rows: u32,
    /// Per-element buffer size for variable length native types
    pub buffer_size: u32,
    /// Whether the variable is bound as a PL/SQL array
    pub is_array: bool,
}

/// Column metadata reported after executing a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInfo {
    /// Column name
    pub name: String,
    /// Database side type
    pub oracle_type: OracleType,
    /// Native type the library would use by default
    pub default_native_type: NativeType,
    /// Size of the column on the client, in bytes
    pub client_size_in_bytes: u32,
    /// NUMBER precision
    pub precision: i16,
    /// NUMBER scale
    pub scale: i8,
    /// Whether NULL values are allowed
    pub null_ok: bool,
    /// Object type descriptor for object columns
    pub object_type: Option<ObjectTypeHandle>,
}

/// Connection-scoped native operations used by the engine
pub trait NativeConnection: Send + Sync + fmt::Debug {
    /// Prepare a statement
    fn prepare(&self, sql: &str) -> NativeResult<Arc<dyn NativeStatement>>;

    /// Allocate a variable with the given shape
    fn new_var(&self, spec: &VarSpec) -> NativeResult<VarHandle>;

    /// Release a variable and every LOB held in its data slots
    fn release_var(&self, var: &Variable) -> NativeResult<()>;

    /// Create a temporary LOB of the given type (CLOB or BLOB)
    fn new_temp_lob(&self, wire_type: OracleType) -> NativeResult<LobHandle>;

    /// Open a LOB for a sequence of writes
    fn lob_open_resource(&self, lob: LobHandle) -> NativeResult<()>;

    /// Write bytes at a 1-based offset
    fn lob_write_bytes(&self, lob: LobHandle, offset: u64, data: &[u8]) -> NativeResult<()>;

    /// Close a LOB opened with [`NativeConnection::lob_open_resource`]
    fn lob_close_resource(&self, lob: LobHandle) -> NativeResult<()>;

    /// Release a LOB that was not handed over to a variable
    fn release_lob(&self, lob: LobHandle) -> NativeResult<()>;
}

/// Statement-scoped native operations used by the engine.
///
/// The native statement handle is released when the last `Arc` goes away.
pub trait NativeStatement: Send + Sync + fmt::Debug {
    /// Execute once, returning the number of query columns
    fn execute(&self, mode: ExecMode) -> NativeResult<u32>;

    /// Execute once per row of the bound array variables
    fn execute_many(&self, mode: ExecMode, iterations: u32) -> NativeResult<()>;

    /// Number of placeholders, valid after a parse
    fn bind_count(&self) -> NativeResult<u32>;

    /// Attach a variable to a 1-based placeholder position
    fn bind_by_pos(&self, pos: u32, var: &Variable) -> NativeResult<()>;

    /// Attach a variable to a named placeholder
    fn bind_by_name(&self, name: &str, var: &Variable) -> NativeResult<()>;

    /// Rows affected by the last execution
    fn row_count(&self) -> NativeResult<u64>;

    /// Set how many rows are fetched per round trip
    fn set_fetch_array_size(&self, rows: u32) -> NativeResult<()>;

    /// Metadata of a 1-based query column
    fn query_info(&self, pos: u32) -> NativeResult<QueryInfo>;

    /// Use a variable as the fetch target of a 1-based query column
    fn define(&self, pos: u32, var: &Variable) -> NativeResult<()>;

    /// Interrupt an execution running on another thread
    fn break_execution(&self) -> NativeResult<()>;
}
