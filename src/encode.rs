//! Value encoding
//!
//! Maps an argument value to the wire/native type pair of its variable, the
//! per-element buffer width, and writes single values into data slots. LOB
//! arguments are streamed into a temporary native LOB whose handle is stored
//! in the slot.

use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::config::StatementConfig;
use crate::constants::{NativeType, OracleType};
use crate::error::{Error, Result};
use crate::native::{LobHandle, NativeConnection};
use crate::types::{Lob, Timestamp};
use crate::value::{Array, Value};
use crate::variable::DataSlot;

/// Kind of a bindable value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    /// Signed integer
    Int64,
    /// Unsigned integer
    Uint64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Boolean
    Bool,
    /// Raw bytes
    Bytes,
    /// Text
    Text,
    /// Timestamp with time zone
    Timestamp,
    /// Large object
    Lob {
        /// Character LOB
        clob: bool,
    },
}

impl BindKind {
    /// Determine the kind of a scalar or array value.
    ///
    /// `position` is the 1-based argument position used in the error.
    pub fn of(position: usize, value: &Value) -> Result<Self> {
        let kind = match value {
            Value::Int64(_) => BindKind::Int64,
            Value::Uint64(_) => BindKind::Uint64,
            Value::Float(_) => BindKind::Float,
            Value::Double(_) => BindKind::Double,
            Value::Bool(_) => BindKind::Bool,
            Value::Bytes(_) => BindKind::Bytes,
            Value::Text(_) => BindKind::Text,
            Value::Timestamp(_) => BindKind::Timestamp,
            Value::Lob(lob) => BindKind::Lob {
                clob: lob.is_clob(),
            },
            Value::Array(array) => Self::of_array(array),
            Value::Null | Value::Option(_) => {
                return Err(Error::UnsupportedType {
                    position,
                    type_name: value.type_name(),
                })
            }
        };
        Ok(kind)
    }

    fn of_array(array: &Array) -> Self {
        match array {
            Array::Int64(_) => BindKind::Int64,
            Array::Uint64(_) => BindKind::Uint64,
            Array::Float(_) => BindKind::Float,
            Array::Double(_) => BindKind::Double,
            Array::Bool(_) => BindKind::Bool,
            Array::Bytes(_) => BindKind::Bytes,
            Array::Text(_) => BindKind::Text,
            Array::Timestamp(_) => BindKind::Timestamp,
            // An empty LOB array binds as BLOB
            Array::Lob(lobs) => BindKind::Lob {
                clob: lobs.first().is_some_and(Lob::is_clob),
            },
        }
    }

    /// Database side type of the variable
    pub fn wire_type(&self) -> OracleType {
        match self {
            BindKind::Int64 | BindKind::Uint64 | BindKind::Float | BindKind::Double => {
                OracleType::Number
            }
            BindKind::Bool => OracleType::Boolean,
            BindKind::Bytes => OracleType::Raw,
            BindKind::Text => OracleType::Varchar,
            BindKind::Timestamp => OracleType::TimestampTz,
            BindKind::Lob { clob: true } => OracleType::Clob,
            BindKind::Lob { clob: false } => OracleType::Blob,
        }
    }

    /// Transport representation of the variable
    pub fn native_type(&self) -> NativeType {
        match self {
            BindKind::Int64 => NativeType::Int64,
            BindKind::Uint64 => NativeType::Uint64,
            BindKind::Float => NativeType::Float,
            BindKind::Double => NativeType::Double,
            BindKind::Bool => NativeType::Boolean,
            BindKind::Bytes | BindKind::Text => NativeType::Bytes,
            BindKind::Timestamp => NativeType::Timestamp,
            BindKind::Lob { .. } => NativeType::Lob,
        }
    }
}

/// Per-element buffer width of a value.
///
/// Raw bytes need their longest element; text reserves `char_size_multiplier`
/// bytes per byte of its longest element. Fixed size kinds return 0.
pub fn buffer_size(value: &Value, char_size_multiplier: u32) -> usize {
    let multiplier = char_size_multiplier as usize;
    match value {
        Value::Bytes(b) => b.len(),
        Value::Text(s) => s.len() * multiplier,
        Value::Array(Array::Bytes(v)) => v.iter().map(Vec::len).max().unwrap_or(0),
        Value::Array(Array::Text(v)) => {
            v.iter().map(String::len).max().unwrap_or(0) * multiplier
        }
        _ => 0,
    }
}

/// Native resources available while encoding
#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodeContext<'a> {
    pub conn: &'a dyn NativeConnection,
    pub config: &'a StatementConfig,
}

/// Write one scalar value into one data slot.
///
/// Byte and text payloads are moved out of `value`.
pub(crate) fn set(ctx: EncodeContext<'_>, slot: &mut DataSlot, value: &mut Value) -> Result<()> {
    *slot = match value {
        Value::Int64(v) => DataSlot::Int64(*v),
        Value::Uint64(v) => DataSlot::Uint64(*v),
        Value::Float(v) => DataSlot::Float(*v),
        Value::Double(v) => DataSlot::Double(*v),
        Value::Bool(v) => DataSlot::Bool(*v),
        Value::Bytes(b) => DataSlot::Bytes(Bytes::from(std::mem::take(b))),
        Value::Text(s) => DataSlot::Bytes(Bytes::from(std::mem::take(s).into_bytes())),
        Value::Timestamp(dt) => DataSlot::Timestamp(Timestamp::from_datetime(dt)?),
        Value::Lob(lob) => DataSlot::Lob(stage_lob(ctx, lob)?),
        Value::Null | Value::Option(_) | Value::Array(_) => {
            return Err(Error::Internal(format!(
                "{} cannot be written into a single slot",
                value.type_name()
            )))
        }
    };
    Ok(())
}

/// Stream a LOB source into a new temporary LOB.
///
/// The temporary LOB is released again if streaming fails.
fn stage_lob(ctx: EncodeContext<'_>, lob: &mut Lob) -> Result<LobHandle> {
    let handle = ctx.conn.new_temp_lob(lob.oracle_type())?;
    match stream_into(ctx, handle, lob) {
        Ok(written) => {
            tracing::trace!(lob = handle.0, bytes = written, clob = lob.is_clob(), "Staged LOB");
            Ok(handle)
        }
        Err(e) => {
            if let Err(release_err) = ctx.conn.release_lob(handle) {
                tracing::warn!(lob = handle.0, error = %release_err, "Failed to release temporary LOB");
            }
            Err(e)
        }
    }
}

fn stream_into(ctx: EncodeContext<'_>, handle: LobHandle, lob: &mut Lob) -> Result<u64> {
    ctx.conn.lob_open_resource(handle)?;

    let mut chunk = vec![0u8; ctx.config.lob_chunk_size.max(1)];
    let mut offset = 1u64;
    let streamed = loop {
        let n = match lob.read(&mut chunk) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => break Err(Error::Io(e)),
        };
        if let Err(e) = ctx.conn.lob_write_bytes(handle, offset, &chunk[..n]) {
            break Err(Error::Native(e));
        }
        offset += n as u64;
    };

    let closed = ctx.conn.lob_close_resource(handle);
    streamed?;
    closed?;
    Ok(offset - 1)
}

#[cfg(test)]
mod tests {
    use std::io;

    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::test_utils::MemoryConnection;

    fn ctx<'a>(conn: &'a MemoryConnection, config: &'a StatementConfig) -> EncodeContext<'a> {
        EncodeContext { conn, config }
    }

    #[test]
    fn test_kind_mapping() {
        let cases: Vec<(Value, OracleType, NativeType)> = vec![
            (Value::from(1i32), OracleType::Number, NativeType::Int64),
            (Value::from(1u32), OracleType::Number, NativeType::Uint64),
            (Value::from(1.5f32), OracleType::Number, NativeType::Float),
            (Value::from(1.5f64), OracleType::Number, NativeType::Double),
            (Value::from(true), OracleType::Boolean, NativeType::Boolean),
            (Value::from(vec![1u8]), OracleType::Raw, NativeType::Bytes),
            (Value::from("x"), OracleType::Varchar, NativeType::Bytes),
            (Value::from(Lob::from_text("x")), OracleType::Clob, NativeType::Lob),
            (Value::from(Lob::from_bytes(vec![1])), OracleType::Blob, NativeType::Lob),
            (Value::from(vec!["a", "b"]), OracleType::Varchar, NativeType::Bytes),
        ];
        for (value, wire, native) in cases {
            let kind = BindKind::of(1, &value).unwrap();
            assert_eq!(kind.wire_type(), wire, "{:?}", value);
            assert_eq!(kind.native_type(), native, "{:?}", value);
        }
    }

    #[test]
    fn test_lob_array_kind_follows_first_element() {
        let clobs = Value::from(vec![Lob::from_text("a"), Lob::from_bytes(vec![1])]);
        assert_eq!(BindKind::of(1, &clobs).unwrap(), BindKind::Lob { clob: true });

        let empty = Value::from(Vec::<Lob>::new());
        assert_eq!(BindKind::of(1, &empty).unwrap(), BindKind::Lob { clob: false });
    }

    #[test]
    fn test_unsupported_values() {
        let err = BindKind::of(2, &Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "2. arg: unknown type null");
        assert!(err.is_validation());
    }

    #[test]
    fn test_buffer_size() {
        assert_eq!(buffer_size(&Value::from("abc"), 4), 12);
        assert_eq!(buffer_size(&Value::from(vec![1u8, 2, 3, 4, 5]), 4), 5);
        assert_eq!(buffer_size(&Value::from(vec!["a", "abcd", "ab"]), 4), 16);
        assert_eq!(buffer_size(&Value::from(vec![vec![1u8], vec![1, 2]]), 4), 2);
        assert_eq!(buffer_size(&Value::from(7i64), 4), 0);
        assert_eq!(buffer_size(&Value::from(Vec::<String>::new()), 4), 0);
    }

    #[test]
    fn test_set_scalars() {
        let conn = MemoryConnection::new();
        let config = StatementConfig::default();
        let mut slot = DataSlot::Null;

        set(ctx(&conn, &config), &mut slot, &mut Value::from(i64::MIN)).unwrap();
        assert_eq!(slot.as_i64(), Some(i64::MIN));

        set(ctx(&conn, &config), &mut slot, &mut Value::from(u64::MAX)).unwrap();
        assert_eq!(slot.as_u64(), Some(u64::MAX));

        set(ctx(&conn, &config), &mut slot, &mut Value::from(false)).unwrap();
        assert_eq!(slot.as_bool(), Some(false));

        let mut text = Value::from("héllo");
        set(ctx(&conn, &config), &mut slot, &mut text).unwrap();
        assert_eq!(slot.as_str(), Some("héllo"));
    }

    #[test]
    fn test_set_timestamp_keeps_offset() {
        let conn = MemoryConnection::new();
        let config = StatementConfig::default();
        let mut slot = DataSlot::Null;

        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let dt = ist.with_ymd_and_hms(2024, 2, 29, 23, 15, 1).unwrap();
        set(ctx(&conn, &config), &mut slot, &mut Value::from(dt)).unwrap();
        let ts = slot.as_timestamp().unwrap();
        assert_eq!((ts.year, ts.month, ts.day, ts.hour), (2024, 2, 29, 23));
        assert_eq!((ts.tz_hour_offset, ts.tz_minute_offset), (5, 30));

        let nfld = FixedOffset::west_opt(3 * 3600 + 30 * 60).unwrap();
        let dt = nfld.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        set(ctx(&conn, &config), &mut slot, &mut Value::from(dt)).unwrap();
        let ts = slot.as_timestamp().unwrap();
        assert_eq!((ts.tz_hour_offset, ts.tz_minute_offset), (-3, -30));
        assert_eq!(ts.to_datetime().unwrap(), dt);
    }

    #[test]
    fn test_lob_streamed_in_chunks() {
        let conn = MemoryConnection::new();
        let config = StatementConfig::new().lob_chunk_size(4);
        let mut slot = DataSlot::Null;

        let mut value = Value::from(Lob::from_bytes(b"0123456789".to_vec()));
        set(ctx(&conn, &config), &mut slot, &mut value).unwrap();

        let handle = slot.as_lob().unwrap();
        assert_eq!(conn.lob_data(handle).unwrap(), b"0123456789");
        assert_eq!(conn.lob_type(handle), Some(OracleType::Blob));
        assert_eq!(conn.lob_is_open(handle), Some(false));
        assert_eq!(conn.lob_writes(), 3);
    }

    #[test]
    fn test_empty_lob_creates_empty_temp_lob() {
        let conn = MemoryConnection::new();
        let config = StatementConfig::default();
        let mut slot = DataSlot::Null;

        set(ctx(&conn, &config), &mut slot, &mut Value::from(Lob::from_text(""))).unwrap();
        let handle = slot.as_lob().unwrap();
        assert_eq!(conn.lob_data(handle).unwrap(), b"");
        assert_eq!(conn.lob_type(handle), Some(OracleType::Clob));
        assert_eq!(conn.lob_writes(), 0);
    }

    struct FlakyReader {
        interrupted: bool,
        data: io::Cursor<Vec<u8>>,
        fail_at_end: bool,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(ErrorKind::Interrupted, "signal"));
            }
            match self.data.read(buf)? {
                0 if self.fail_at_end => Err(io::Error::other("disk gone")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_lob_retries_interrupted_reads() {
        let conn = MemoryConnection::new();
        let config = StatementConfig::default();
        let mut slot = DataSlot::Null;

        let reader = FlakyReader {
            interrupted: false,
            data: io::Cursor::new(b"abc".to_vec()),
            fail_at_end: false,
        };
        set(ctx(&conn, &config), &mut slot, &mut Value::from(Lob::blob(reader))).unwrap();
        assert_eq!(conn.lob_data(slot.as_lob().unwrap()).unwrap(), b"abc");
    }

    #[test]
    fn test_lob_read_error_releases_temp_lob() {
        let conn = MemoryConnection::new();
        let config = StatementConfig::default();
        let mut slot = DataSlot::Null;

        let reader = FlakyReader {
            interrupted: true,
            data: io::Cursor::new(b"abc".to_vec()),
            fail_at_end: true,
        };
        let err = set(ctx(&conn, &config), &mut slot, &mut Value::from(Lob::blob(reader)))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(slot.is_null());
        assert_eq!(conn.live_lobs(), 0);
    }

    #[test]
    fn test_lob_write_error_is_native() {
        let conn = MemoryConnection::new();
        conn.fail_lob_writes(true);
        let config = StatementConfig::default();
        let mut slot = DataSlot::Null;

        let err = set(
            ctx(&conn, &config),
            &mut slot,
            &mut Value::from(Lob::from_bytes(vec![1, 2])),
        )
        .unwrap_err();
        assert_eq!(err.native_code(), Some(1691));
        assert_eq!(conn.live_lobs(), 0);
    }
}
