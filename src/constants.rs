//! Oracle type numbers, native type numbers and execution modes
//!
//! The numeric values match the ones used by the native client library so
//! that a binding can pass them through unchanged.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Default upper bound for the length of an array bind (batch width)
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 32_767;

/// Default number of rows fetched per round trip
pub const DEFAULT_FETCH_ARRAY_SIZE: u32 = 128;

/// Default chunk size used when streaming a LOB argument (1 MiB)
pub const DEFAULT_LOB_CHUNK_SIZE: usize = 1 << 20;

/// Maximum number of bytes a single character may take in the client charset
pub const DEFAULT_CHAR_SIZE_MULTIPLIER: u32 = 4;

/// Oracle (database side) data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OracleType {
    /// VARCHAR2
    Varchar = 2001,
    /// NVARCHAR2
    Nvarchar = 2002,
    /// CHAR
    Char = 2003,
    /// NCHAR
    Nchar = 2004,
    /// ROWID / UROWID
    Rowid = 2005,
    /// RAW
    Raw = 2006,
    /// BINARY_FLOAT
    NativeFloat = 2007,
    /// BINARY_DOUBLE
    NativeDouble = 2008,
    /// PLS_INTEGER / BINARY_INTEGER
    NativeInt = 2009,
    /// NUMBER
    Number = 2010,
    /// DATE
    Date = 2011,
    /// TIMESTAMP
    Timestamp = 2012,
    /// TIMESTAMP WITH TIME ZONE
    TimestampTz = 2013,
    /// TIMESTAMP WITH LOCAL TIME ZONE
    TimestampLtz = 2014,
    /// INTERVAL DAY TO SECOND
    IntervalDs = 2015,
    /// INTERVAL YEAR TO MONTH
    IntervalYm = 2016,
    /// CLOB
    Clob = 2017,
    /// NCLOB
    Nclob = 2018,
    /// BLOB
    Blob = 2019,
    /// BFILE
    Bfile = 2020,
    /// REF CURSOR
    Stmt = 2021,
    /// BOOLEAN
    Boolean = 2022,
    /// User-defined object type
    Object = 2023,
    /// LONG
    LongVarchar = 2024,
    /// LONG RAW
    LongRaw = 2025,
    /// Unsigned native integer
    NativeUint = 2026,
}

impl OracleType {
    /// Check if this is a character type whose client size depends on the charset
    pub fn is_char(&self) -> bool {
        matches!(
            self,
            OracleType::Varchar | OracleType::Nvarchar | OracleType::Char | OracleType::Nchar
        )
    }

    /// Check if this is a LOB type
    pub fn is_lob(&self) -> bool {
        matches!(
            self,
            OracleType::Clob | OracleType::Nclob | OracleType::Blob | OracleType::Bfile
        )
    }
}

impl TryFrom<u16> for OracleType {
    type Error = crate::error::Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2001 => Ok(OracleType::Varchar),
            2002 => Ok(OracleType::Nvarchar),
            2003 => Ok(OracleType::Char),
            2004 => Ok(OracleType::Nchar),
            2005 => Ok(OracleType::Rowid),
            2006 => Ok(OracleType::Raw),
            2007 => Ok(OracleType::NativeFloat),
            2008 => Ok(OracleType::NativeDouble),
            2009 => Ok(OracleType::NativeInt),
            2010 => Ok(OracleType::Number),
            2011 => Ok(OracleType::Date),
            2012 => Ok(OracleType::Timestamp),
            2013 => Ok(OracleType::TimestampTz),
            2014 => Ok(OracleType::TimestampLtz),
            2015 => Ok(OracleType::IntervalDs),
            2016 => Ok(OracleType::IntervalYm),
            2017 => Ok(OracleType::Clob),
            2018 => Ok(OracleType::Nclob),
            2019 => Ok(OracleType::Blob),
            2020 => Ok(OracleType::Bfile),
            2021 => Ok(OracleType::Stmt),
            2022 => Ok(OracleType::Boolean),
            2023 => Ok(OracleType::Object),
            2024 => Ok(OracleType::LongVarchar),
            2025 => Ok(OracleType::LongRaw),
            2026 => Ok(OracleType::NativeUint),
            _ => Err(crate::error::Error::InvalidOracleType(value)),
        }
    }
}

/// In-memory representation used to move a value across the native boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NativeType {
    /// 64-bit signed integer
    Int64 = 3000,
    /// 64-bit unsigned integer
    Uint64 = 3001,
    /// 32-bit float
    Float = 3002,
    /// 64-bit float
    Double = 3003,
    /// Length-prefixed byte buffer (also used for text and NUMBER-as-text)
    Bytes = 3004,
    /// Calendar fields plus timezone offset
    Timestamp = 3005,
    /// INTERVAL DAY TO SECOND fields
    IntervalDs = 3006,
    /// INTERVAL YEAR TO MONTH fields
    IntervalYm = 3007,
    /// LOB handle
    Lob = 3008,
    /// Object handle
    Object = 3009,
    /// Statement handle
    Stmt = 3010,
    /// Boolean
    Boolean = 3011,
    /// ROWID handle
    Rowid = 3012,
}

impl TryFrom<u16> for NativeType {
    type Error = crate::error::Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            3000 => Ok(NativeType::Int64),
            3001 => Ok(NativeType::Uint64),
            3002 => Ok(NativeType::Float),
            3003 => Ok(NativeType::Double),
            3004 => Ok(NativeType::Bytes),
            3005 => Ok(NativeType::Timestamp),
            3006 => Ok(NativeType::IntervalDs),
            3007 => Ok(NativeType::IntervalYm),
            3008 => Ok(NativeType::Lob),
            3009 => Ok(NativeType::Object),
            3010 => Ok(NativeType::Stmt),
            3011 => Ok(NativeType::Boolean),
            3012 => Ok(NativeType::Rowid),
            _ => Err(crate::error::Error::InvalidNativeType(value)),
        }
    }
}

/// Execution mode flags passed to the native execute call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExecMode(u32);

impl ExecMode {
    /// Plain execution
    pub const DEFAULT: ExecMode = ExecMode(0x0000_0000);
    /// Describe the statement without executing it
    pub const DESCRIBE_ONLY: ExecMode = ExecMode(0x0000_0010);
    /// Commit when the execution succeeds
    pub const COMMIT_ON_SUCCESS: ExecMode = ExecMode(0x0000_0020);
    /// Parse the statement without executing it
    pub const PARSE_ONLY: ExecMode = ExecMode(0x0000_0100);

    /// Raw flag bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check whether all flags of `other` are set
    pub fn contains(&self, other: ExecMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ExecMode {
    type Output = ExecMode;

    fn bitor(self, rhs: ExecMode) -> ExecMode {
        ExecMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExecMode {
    fn bitor_assign(&mut self, rhs: ExecMode) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
