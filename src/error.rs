//! Error types for statement execution
//!
//! This module defines every error the engine can return, from argument
//! validation that happens before any native call, to failures reported by the
//! native client library while allocating, binding or executing.

use std::io;
use thiserror::Error;

use crate::constants::{ExecMode, NativeType, OracleType};
use crate::native::NativeError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the execution engine
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Argument value has no wire type mapping
    #[error("{position}. arg: unknown type {type_name}")]
    UnsupportedType {
        position: usize,
        type_name: &'static str,
    },

    /// Array arguments of different lengths outside PL/SQL array mode
    #[error("PL/SQL arrays are not enabled, but got slices of different length (min={min} < {max}=max)")]
    BatchShape { min: usize, max: usize },

    /// Array argument longer than the configured maximum
    #[error("slice is bigger ({len}) than the maximum ({max})")]
    BatchTooLarge { len: usize, max: usize },

    /// Rows of a batch builder disagree on column count or column type
    #[error("batch row {row}, column {column}: expected {expected}, got {found}")]
    InconsistentBatch {
        row: usize,
        column: usize,
        expected: String,
        found: String,
    },

    // =========================================================================
    // Native Errors
    // =========================================================================
    /// Native library refused to allocate a variable
    #[error("allocate {rows} x {native_type:?} ({wire_type:?}, buffer {buffer_size} bytes): {source}")]
    Allocation {
        wire_type: OracleType,
        native_type: NativeType,
        rows: usize,
        buffer_size: u32,
        #[source]
        source: NativeError,
    },

    /// Writing one value into one data slot failed
    #[error("set(data[{arg}][{row}], {value} ({type_name})): {source}")]
    Encoding {
        arg: usize,
        row: usize,
        value: String,
        type_name: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// The execute call itself failed
    #[error("execute(mode={mode} batch_len={batch_len}): {source}")]
    NativeExecution {
        mode: ExecMode,
        batch_len: usize,
        #[source]
        source: NativeError,
    },

    /// Attaching a variable to the statement failed
    #[error("bind {name}: {source}")]
    BindAttach {
        name: String,
        #[source]
        source: NativeError,
    },

    /// Any other native call failure
    #[error(transparent)]
    Native(#[from] NativeError),

    // =========================================================================
    // Data Type Errors
    // =========================================================================
    /// Unknown Oracle type number
    #[error("invalid Oracle type: {0}")]
    InvalidOracleType(u16),

    /// Unknown native type number
    #[error("invalid native type: {0}")]
    InvalidNativeType(u16),

    /// Value cannot be represented in the native format
    #[error("data conversion error: {0}")]
    DataConversionError(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Reading a LOB source failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// The caller's context was canceled
    #[error("statement execution canceled")]
    Canceled,

    /// The context was canceled while executing and the native call ended
    /// with an error after the break
    #[error("execute(mode={mode} batch_len={batch_len}) canceled: {source}")]
    Interrupted {
        mode: ExecMode,
        batch_len: usize,
        #[source]
        source: NativeError,
    },

    /// The statement has been closed
    #[error("statement is closed")]
    StatementClosed,

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error was raised before any native call was made
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedType { .. }
                | Error::BatchShape { .. }
                | Error::BatchTooLarge { .. }
                | Error::InconsistentBatch { .. }
        )
    }

    /// Check if this error comes from a canceled context
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled | Error::Interrupted { .. })
    }

    /// Native error code, if the error originates in the native library
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::Allocation { source, .. }
            | Error::NativeExecution { source, .. }
            | Error::Interrupted { source, .. }
            | Error::BindAttach { source, .. }
            | Error::Native(source) => Some(source.code),
            Error::Encoding { source, .. } => source.native_code(),
            _ => None,
        }
    }
}
