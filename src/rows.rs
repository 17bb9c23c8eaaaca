//! Result set opening
//!
//! After a row producing execution, every column is described, its native
//! type normalized, and a fetch variable of `fetch_array_size` rows is
//! allocated and defined on the statement. Row decoding happens on top of the
//! returned [`Rows`] buffers.

use std::fmt;
use std::sync::Arc;

use crate::config::StatementConfig;
use crate::constants::{NativeType, OracleType};
use crate::error::{Error, Result};
use crate::native::{NativeConnection, NativeStatement, ObjectTypeHandle, QueryInfo};
use crate::variable::{self, Variable};

/// Description of one result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Database side type
    pub oracle_type: OracleType,
    /// Native type used for fetching
    pub native_type: NativeType,
    /// Size of the column on the client, in bytes
    pub size: u32,
    /// NUMBER precision
    pub precision: i16,
    /// NUMBER scale
    pub scale: i8,
    /// Whether NULL values are allowed
    pub nullable: bool,
    /// Object type descriptor for object columns
    pub object_type: Option<ObjectTypeHandle>,
}

impl Column {
    fn from_query_info(info: QueryInfo) -> Self {
        let native_type = fetch_native_type(&info);
        Self {
            name: info.name,
            oracle_type: info.oracle_type,
            native_type,
            size: info.client_size_in_bytes,
            precision: info.precision,
            scale: info.scale,
            nullable: info.null_ok,
            object_type: info.object_type,
        }
    }

    /// Bytes reserved per fetched value
    fn buffer_size(&self, char_size_multiplier: u32) -> usize {
        let size = self.size as usize;
        if self.oracle_type.is_char() {
            size * char_size_multiplier as usize
        } else {
            size
        }
    }
}

/// NUMBER is fetched as text to keep full precision, DATE as a timestamp
fn fetch_native_type(info: &QueryInfo) -> NativeType {
    match info.oracle_type {
        OracleType::Number => NativeType::Bytes,
        OracleType::Date => NativeType::Timestamp,
        _ => info.default_native_type,
    }
}

/// Open result set: column descriptors plus their fetch buffers
pub struct Rows {
    conn: Arc<dyn NativeConnection>,
    stmt: Arc<dyn NativeStatement>,
    columns: Vec<Column>,
    vars: Vec<Variable>,
    fetch_array_size: u32,
}

impl Rows {
    /// Column descriptors
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Fetch buffer of a 0-based column
    pub fn buffer(&self, index: usize) -> Option<&Variable> {
        self.vars.get(index)
    }

    /// Rows per fetch round trip
    pub fn fetch_array_size(&self) -> u32 {
        self.fetch_array_size
    }

    /// Native statement the rows are fetched from
    pub fn statement(&self) -> &Arc<dyn NativeStatement> {
        &self.stmt
    }

    /// Release the fetch buffers, returning the first failure
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let mut first_err = None;
        for var in self.vars.drain(..) {
            if let Err(e) = self.conn.release_var(&var) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), |e| Err(Error::Native(e)))
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "Failed to release fetch buffers");
        }
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("fetch_array_size", &self.fetch_array_size)
            .finish()
    }
}

/// Failure while opening a result set, with the partially opened rows
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct OpenRowsError {
    /// Columns opened before the failure
    pub rows: Rows,
    /// What failed
    #[source]
    pub source: Error,
}

/// Describe and define `column_count` columns of an executed query
pub fn open_rows(
    conn: Arc<dyn NativeConnection>,
    stmt: Arc<dyn NativeStatement>,
    config: &StatementConfig,
    column_count: usize,
) -> std::result::Result<Rows, OpenRowsError> {
    let mut rows = Rows {
        conn,
        stmt,
        columns: Vec::with_capacity(column_count),
        vars: Vec::with_capacity(column_count),
        fetch_array_size: config.fetch_array_size,
    };

    match define_columns(&mut rows, config, column_count) {
        Ok(()) => {
            tracing::debug!(
                columns = rows.columns.len(),
                fetch_array_size = rows.fetch_array_size,
                "Opened result set"
            );
            Ok(rows)
        }
        Err(source) => Err(OpenRowsError { rows, source }),
    }
}

fn define_columns(rows: &mut Rows, config: &StatementConfig, column_count: usize) -> Result<()> {
    rows.stmt.set_fetch_array_size(rows.fetch_array_size)?;

    for pos in 1..=column_count as u32 {
        let column = Column::from_query_info(rows.stmt.query_info(pos)?);
        let var = variable::allocate(
            rows.conn.as_ref(),
            false,
            column.oracle_type,
            column.native_type,
            rows.fetch_array_size as usize,
            column.buffer_size(config.char_size_multiplier),
        )?;
        if let Err(e) = rows.stmt.define(pos, &var) {
            if let Err(release_err) = rows.conn.release_var(&var) {
                tracing::warn!(pos, error = %release_err, "Failed to release fetch buffer");
            }
            return Err(e.into());
        }
        tracing::trace!(pos, name = %column.name, "Defined column");
        rows.columns.push(column);
        rows.vars.push(var);
    }
    Ok(())
}
