//! Statement execution configuration
//!
//! Tunables shared by every statement prepared on a connection: the largest
//! accepted array bind, the fetch array size used for result sets, the chunk
//! size used to stream LOB arguments, and the per-character byte multiplier
//! applied to character column buffers.

use crate::constants::{
    DEFAULT_CHAR_SIZE_MULTIPLIER, DEFAULT_FETCH_ARRAY_SIZE, DEFAULT_LOB_CHUNK_SIZE,
    DEFAULT_MAX_ARRAY_SIZE,
};

/// Configuration applied to statement binding, execution and fetching.
///
/// # Examples
///
/// ```rust
/// use oracle_exec::StatementConfig;
///
/// let config = StatementConfig::new()
///     .max_array_size(10_000)
///     .fetch_array_size(256)
///     .lob_chunk_size(64 * 1024);
///
/// assert_eq!(config.fetch_array_size, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementConfig {
    /// Largest accepted array bind length
    pub max_array_size: usize,
    /// Rows per fetch buffer
    pub fetch_array_size: u32,
    /// Bytes read from a LOB source per native write
    pub lob_chunk_size: usize,
    /// Multiplier applied to the byte size of character columns
    pub char_size_multiplier: u32,
}

impl StatementConfig {
    /// Create a configuration with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest accepted array bind length
    pub fn max_array_size(mut self, size: usize) -> Self {
        self.max_array_size = size;
        self
    }

    /// Set the number of rows per fetch buffer (at least 1)
    pub fn fetch_array_size(mut self, size: u32) -> Self {
        self.fetch_array_size = size.max(1);
        self
    }

    /// Set the LOB streaming chunk size (at least 1 byte)
    pub fn lob_chunk_size(mut self, size: usize) -> Self {
        self.lob_chunk_size = size.max(1);
        self
    }

    /// Set the byte multiplier for character columns (at least 1)
    pub fn char_size_multiplier(mut self, multiplier: u32) -> Self {
        self.char_size_multiplier = multiplier.max(1);
        self
    }
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            fetch_array_size: DEFAULT_FETCH_ARRAY_SIZE,
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
            char_size_multiplier: DEFAULT_CHAR_SIZE_MULTIPLIER,
        }
    }
}
