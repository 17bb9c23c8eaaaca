//! Caller-supplied argument values
//!
//! [`Value`] is the dynamically typed value model the engine accepts. Every
//! integer width funnels into [`Value::Int64`] or [`Value::Uint64`]; slices
//! become a homogeneous [`Array`] and are bound either for batched execution
//! or as PL/SQL arrays.
//!
//! # Example
//!
//! ```rust
//! use oracle_exec::{Argument, Value};
//!
//! let args = vec![
//!     Argument::positional(1, 42),
//!     Argument::named("name", "Alice"),
//!     Argument::positional(3, vec![1.5f64, 2.5, 3.5]),
//! ];
//!
//! assert!(matches!(args[0].value, Value::Int64(42)));
//! assert_eq!(args[2].value.array_len(), Some(3));
//! ```

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};

use crate::types::Lob;

/// Per-call option passed in place of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOption {
    /// Leave slice arguments as PL/SQL arrays instead of executing once per element
    PlSqlArrays,
}

/// Argument value
#[derive(Debug)]
pub enum Value {
    /// NULL (not bindable without a type)
    Null,
    /// Signed integer of any width
    Int64(i64),
    /// Unsigned integer of any width
    Uint64(u64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Byte sequence
    Bytes(Vec<u8>),
    /// Text
    Text(String),
    /// Point in time with its original offset
    Timestamp(DateTime<FixedOffset>),
    /// Large object stream
    Lob(Lob),
    /// Homogeneous sequence
    Array(Array),
    /// Execution option marker, consumed before binding
    Option(ExecOption),
}

impl Value {
    /// Name of the value's kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int64(_) => "i64",
            Value::Uint64(_) => "u64",
            Value::Float(_) => "f32",
            Value::Double(_) => "f64",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Lob(_) => "lob",
            Value::Array(a) => a.type_name(),
            Value::Option(_) => "option",
        }
    }

    /// Check if this value is an array
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Number of elements, for array values
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.len()),
            _ => None,
        }
    }

    /// Check if this is the given option marker
    pub fn is_option(&self, option: ExecOption) -> bool {
        matches!(self, Value::Option(o) if *o == option)
    }
}

/// Homogeneous sequence of values
#[derive(Debug)]
pub enum Array {
    /// Signed integers
    Int64(Vec<i64>),
    /// Unsigned integers
    Uint64(Vec<u64>),
    /// 32-bit floats
    Float(Vec<f32>),
    /// 64-bit floats
    Double(Vec<f64>),
    /// Booleans
    Bool(Vec<bool>),
    /// Byte sequences
    Bytes(Vec<Vec<u8>>),
    /// Texts
    Text(Vec<String>),
    /// Timestamps
    Timestamp(Vec<DateTime<FixedOffset>>),
    /// Large objects
    Lob(Vec<Lob>),
}

impl Array {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Array::Int64(v) => v.len(),
            Array::Uint64(v) => v.len(),
            Array::Float(v) => v.len(),
            Array::Double(v) => v.len(),
            Array::Bool(v) => v.len(),
            Array::Bytes(v) => v.len(),
            Array::Text(v) => v.len(),
            Array::Timestamp(v) => v.len(),
            Array::Lob(v) => v.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the array's kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Array::Int64(_) => "[]i64",
            Array::Uint64(_) => "[]u64",
            Array::Float(_) => "[]f32",
            Array::Double(_) => "[]f64",
            Array::Bool(_) => "[]bool",
            Array::Bytes(_) => "[]bytes",
            Array::Text(_) => "[]string",
            Array::Timestamp(_) => "[]timestamp",
            Array::Lob(_) => "[]lob",
        }
    }

    /// Split into scalar values, one per element
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Array::Int64(v) => v.into_iter().map(Value::Int64).collect(),
            Array::Uint64(v) => v.into_iter().map(Value::Uint64).collect(),
            Array::Float(v) => v.into_iter().map(Value::Float).collect(),
            Array::Double(v) => v.into_iter().map(Value::Double).collect(),
            Array::Bool(v) => v.into_iter().map(Value::Bool).collect(),
            Array::Bytes(v) => v.into_iter().map(Value::Bytes).collect(),
            Array::Text(v) => v.into_iter().map(Value::Text).collect(),
            Array::Timestamp(v) => v.into_iter().map(Value::Timestamp).collect(),
            Array::Lob(v) => v.into_iter().map(Value::Lob).collect(),
        }
    }
}

/// Bind target of an argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindName {
    /// 1-based ordinal position
    Ordinal(usize),
    /// Placeholder name (without the leading colon)
    Name(String),
}

impl fmt::Display for BindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindName::Ordinal(n) => write!(f, "{}", n),
            BindName::Name(name) => write!(f, "{}", name),
        }
    }
}

/// One argument of an execution
#[derive(Debug)]
pub struct Argument {
    /// Placeholder the value binds to
    pub name: BindName,
    /// The value
    pub value: Value,
}

impl Argument {
    /// Argument bound by 1-based position
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: BindName::Ordinal(ordinal),
            value: value.into(),
        }
    }

    /// Argument bound by placeholder name
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: BindName::Name(name.into()),
            value: value.into(),
        }
    }

    /// Placeholder name, if the argument is named
    pub fn bind_name(&self) -> Option<&str> {
        match &self.name {
            BindName::Name(name) => Some(name),
            BindName::Ordinal(_) => None,
        }
    }

    /// Turn a list of values into positional arguments numbered from 1
    pub fn from_values(values: Vec<Value>) -> Vec<Argument> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Argument {
                name: BindName::Ordinal(i + 1),
                value,
            })
            .collect()
    }
}

macro_rules! impl_from_scalar {
    ($variant:ident, $target:ty, $($src:ty),+) => {
        $(
            impl From<$src> for Value {
                fn from(v: $src) -> Self {
                    Value::$variant(v as $target)
                }
            }

            impl From<Vec<$src>> for Value {
                fn from(v: Vec<$src>) -> Self {
                    Value::Array(Array::$variant(v.into_iter().map(|x| x as $target).collect()))
                }
            }
        )+
    };
}

impl_from_scalar!(Int64, i64, i8, i16, i32, i64, isize);
impl_from_scalar!(Uint64, u64, u16, u32, u64, usize);
impl_from_scalar!(Float, f32, f32);
impl_from_scalar!(Double, f64, f64);

// u8 is not included above: Vec<u8> is a byte sequence.
impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Uint64(v as u64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::Array(Array::Bool(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<Vec<u8>>> for Value {
    fn from(v: Vec<Vec<u8>>) -> Self {
        Value::Array(Array::Bytes(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(Array::Text(v))
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::Array(Array::Text(v.into_iter().map(str::to_string).collect()))
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl From<Vec<DateTime<FixedOffset>>> for Value {
    fn from(v: Vec<DateTime<FixedOffset>>) -> Self {
        Value::Array(Array::Timestamp(v))
    }
}

impl From<Lob> for Value {
    fn from(v: Lob) -> Self {
        Value::Lob(v)
    }
}

impl From<Vec<Lob>> for Value {
    fn from(v: Vec<Lob>) -> Self {
        Value::Array(Array::Lob(v))
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

impl From<ExecOption> for Value {
    fn from(v: ExecOption) -> Self {
        Value::Option(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
