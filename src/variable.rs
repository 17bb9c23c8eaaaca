//! Bind and fetch variables
//!
//! A [`Variable`] pairs an opaque native handle with the data slots the engine
//! writes into, one slot per row. Variables live in a [`VarArena`] owned by the
//! statement, which keeps its capacity across executions and releases the
//! native side explicitly on rebind or close.

use bytes::Bytes;

use crate::constants::{NativeType, OracleType};
use crate::error::{Error, Result};
use crate::native::{LobHandle, NativeConnection, VarHandle, VarSpec};
use crate::types::Timestamp;

/// Contents of one row of a variable
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DataSlot {
    /// NULL
    #[default]
    Null,
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit unsigned integer
    Uint64(u64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Byte buffer (RAW, text encoded as UTF-8, NUMBER as text)
    Bytes(Bytes),
    /// Timestamp fields
    Timestamp(Timestamp),
    /// Temporary or fetched LOB
    Lob(LobHandle),
}

impl DataSlot {
    /// Check if the slot is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, DataSlot::Null)
    }

    /// Try to get as a signed integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataSlot::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as an unsigned integer
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataSlot::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a 32-bit float
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            DataSlot::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a 64-bit float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataSlot::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataSlot::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as raw bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DataSlot::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Try to get as a timestamp
    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            DataSlot::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Try to get as a LOB handle
    pub fn as_lob(&self) -> Option<LobHandle> {
        match self {
            DataSlot::Lob(h) => Some(*h),
            _ => None,
        }
    }
}

/// A native variable and its data slots
#[derive(Debug, Clone)]
pub struct Variable {
    handle: VarHandle,
    spec: VarSpec,
    slots: Vec<DataSlot>,
    num_elements: usize,
}

impl Variable {
    /// Native handle
    pub fn handle(&self) -> VarHandle {
        self.handle
    }

    /// Shape the variable was allocated with
    pub fn spec(&self) -> &VarSpec {
        &self.spec
    }

    /// Database side type
    pub fn oracle_type(&self) -> OracleType {
        self.spec.wire_type
    }

    /// Transport representation
    pub fn native_type(&self) -> NativeType {
        self.spec.native_type
    }

    /// Whether the variable is bound as a PL/SQL array
    pub fn is_array(&self) -> bool {
        self.spec.is_array
    }

    /// Per-element buffer size
    pub fn buffer_size(&self) -> u32 {
        self.spec.buffer_size
    }

    /// Number of data slots
    pub fn rows(&self) -> usize {
        self.slots.len()
    }

    /// Number of meaningful elements (may be 0 for an empty PL/SQL array)
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// All data slots
    pub fn slots(&self) -> &[DataSlot] {
        &self.slots
    }

    /// One data slot
    pub fn slot(&self, row: usize) -> Option<&DataSlot> {
        self.slots.get(row)
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [DataSlot] {
        &mut self.slots
    }
}

/// Allocate a variable of `rows` data slots.
///
/// At least one slot is always reserved so that an empty PL/SQL array still
/// has a backing buffer; `num_elements` keeps the requested count.
/// `max_element_size` only matters for variable length native types.
pub fn allocate(
    conn: &dyn NativeConnection,
    use_array_binding: bool,
    wire_type: OracleType,
    native_type: NativeType,
    rows: usize,
    max_element_size: usize,
) -> Result<Variable> {
    let capacity = rows.max(1);
    let buffer_size = if native_type == NativeType::Bytes {
        u32::try_from(max_element_size).map_err(|_| {
            Error::DataConversionError(format!(
                "buffer size {} exceeds the native limit",
                max_element_size
            ))
        })?
    } else {
        0
    };
    let rows_u32 = u32::try_from(capacity).map_err(|_| {
        Error::DataConversionError(format!("{} rows exceed the native limit", capacity))
    })?;
    let spec = VarSpec {
        wire_type,
        native_type,
        rows: rows_u32,
        buffer_size,
        is_array: use_array_binding,
    };

    let handle = conn.new_var(&spec).map_err(|source| Error::Allocation {
        wire_type,
        native_type,
        rows: capacity,
        buffer_size,
        source,
    })?;

    Ok(Variable {
        handle,
        spec,
        slots: vec![DataSlot::Null; capacity],
        num_elements: rows,
    })
}

/// Variables owned by one statement, indexed by argument or column position
#[derive(Debug, Default)]
pub struct VarArena {
    vars: Vec<Variable>,
}

impl VarArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every variable and prepare room for `expected` new ones,
    /// keeping the allocated capacity.
    pub(crate) fn reset(&mut self, conn: &dyn NativeConnection, expected: usize) {
        for var in self.vars.drain(..) {
            if let Err(e) = conn.release_var(&var) {
                tracing::warn!(handle = var.handle.0, error = %e, "Failed to release variable");
            }
        }
        self.vars.reserve(expected);
    }

    /// Release every variable, returning the first failure
    pub(crate) fn release_all(&mut self, conn: &dyn NativeConnection) -> Result<()> {
        let mut first_err = None;
        for var in self.vars.drain(..) {
            if let Err(e) = conn.release_var(&var) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), |e| Err(Error::Native(e)))
    }

    pub(crate) fn push(&mut self, var: Variable) {
        self.vars.push(var);
    }

    /// Variable at a position
    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.vars.get(index)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Currently reserved capacity
    pub fn capacity(&self) -> usize {
        self.vars.capacity()
    }

    /// Iterate over the variables
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }
}
