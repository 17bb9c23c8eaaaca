//! LOB (Large Object) arguments
//!
//! A [`Lob`] wraps a byte source that is streamed into a temporary native LOB
//! while binding. The source is read lazily in bounded chunks and never
//! materialized as a single buffer.

use std::fmt;
use std::io::{self, Cursor, Read};

use crate::constants::OracleType;

/// Large object argument: a byte stream plus the CLOB/BLOB distinction
pub struct Lob {
    is_clob: bool,
    reader: Box<dyn Read + Send>,
}

impl Lob {
    /// Create a BLOB argument from a byte source
    pub fn blob<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            is_clob: false,
            reader: Box::new(reader),
        }
    }

    /// Create a CLOB argument from a source of UTF-8 text
    pub fn clob<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            is_clob: true,
            reader: Box::new(reader),
        }
    }

    /// Create a BLOB argument from in-memory bytes
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::blob(Cursor::new(data.into()))
    }

    /// Create a CLOB argument from in-memory text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::clob(Cursor::new(text.into().into_bytes()))
    }

    /// Check if this is a character LOB
    pub fn is_clob(&self) -> bool {
        self.is_clob
    }

    /// Database side type of the temporary LOB
    pub fn oracle_type(&self) -> OracleType {
        if self.is_clob {
            OracleType::Clob
        } else {
            OracleType::Blob
        }
    }
}

impl Read for Lob {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Lob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lob").field("is_clob", &self.is_clob).finish()
    }
}
