//! Row-oriented batch building
//!
//! Batched execution binds one array per placeholder. [`BatchBuilder`]
//! collects rows of scalar values and transposes them into those column
//! arrays, so the statement runs once per row.
//!
//! # Example
//!
//! ```rust
//! use oracle_exec::{BatchBuilder, Value};
//!
//! let args = BatchBuilder::new()
//!     .add_row(vec![Value::from(1), Value::from("Alice")])
//!     .add_row(vec![Value::from(2), Value::from("Bob")])
//!     .add_row(vec![Value::from(3), Value::from("Charlie")])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(args.len(), 2);
//! assert_eq!(args[1].value.array_len(), Some(3));
//! ```

use crate::encode::BindKind;
use crate::error::{Error, Result};
use crate::value::{Argument, Array, Value};

/// Builder turning rows of values into column array arguments
#[derive(Debug, Default)]
pub struct BatchBuilder {
    rows: Vec<Vec<Value>>,
    num_columns: usize,
    names: Option<Vec<String>>,
}

impl BatchBuilder {
    /// Create an empty batch bound by position
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch bound by placeholder name, one name per column
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Add a row of bind values
    pub fn add_row(mut self, values: Vec<Value>) -> Self {
        if self.rows.is_empty() {
            self.num_columns = values.len();
        }
        self.rows.push(values);
        self
    }

    /// Add multiple rows at once
    pub fn add_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        for row in rows {
            self = self.add_row(row);
        }
        self
    }

    /// Get the number of rows (executions)
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of bind columns per row
    pub fn column_count(&self) -> usize {
        self.num_columns
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Validate that every row has the same columns with the same kinds
    pub fn validate(&self) -> Result<()> {
        let first = self
            .rows
            .first()
            .ok_or_else(|| Error::Internal("Batch has no rows".to_string()))?;

        if let Some(names) = &self.names {
            if names.len() != self.num_columns {
                return Err(Error::InconsistentBatch {
                    row: 0,
                    column: names.len().min(self.num_columns),
                    expected: format!("{} names", self.num_columns),
                    found: format!("{} names", names.len()),
                });
            }
        }

        for (column, value) in first.iter().enumerate() {
            if !is_batchable(value) {
                return Err(Error::InconsistentBatch {
                    row: 0,
                    column,
                    expected: "scalar value".to_string(),
                    found: value.type_name().to_string(),
                });
            }
        }

        for (row, values) in self.rows.iter().enumerate().skip(1) {
            if values.len() != self.num_columns {
                return Err(Error::InconsistentBatch {
                    row,
                    column: values.len().min(self.num_columns),
                    expected: format!("{} columns", self.num_columns),
                    found: format!("{} columns", values.len()),
                });
            }
            for (column, (value, reference)) in values.iter().zip(first).enumerate() {
                if value.type_name() != reference.type_name() {
                    return Err(Error::InconsistentBatch {
                        row,
                        column,
                        expected: reference.type_name().to_string(),
                        found: value.type_name().to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Transpose the rows into one array argument per column
    pub fn build(self) -> Result<Vec<Argument>> {
        self.validate()?;

        let mut columns: Vec<Vec<Value>> = (0..self.num_columns)
            .map(|_| Vec::with_capacity(self.rows.len()))
            .collect();
        for row in self.rows {
            for (column, value) in row.into_iter().enumerate() {
                columns[column].push(value);
            }
        }

        let names = self.names;
        columns
            .into_iter()
            .enumerate()
            .map(|(column, values)| {
                let array = into_array(column, values)?;
                Ok(match &names {
                    Some(names) => Argument::named(names[column].clone(), array),
                    None => Argument::positional(column + 1, array),
                })
            })
            .collect()
    }
}

fn is_batchable(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Array(_) | Value::Option(_))
}

fn into_array(column: usize, values: Vec<Value>) -> Result<Array> {
    let (expected, kind) = match values.first() {
        Some(v) if is_batchable(v) => (v.type_name(), BindKind::of(column + 1, v)?),
        Some(v) => {
            return Err(Error::InconsistentBatch {
                row: 0,
                column,
                expected: "scalar value".to_string(),
                found: v.type_name().to_string(),
            })
        }
        None => return Err(Error::Internal(format!("column {} is empty", column))),
    };

    macro_rules! collect {
        ($variant:ident) => {
            values
                .into_iter()
                .enumerate()
                .map(|(row, value)| match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(Error::InconsistentBatch {
                        row,
                        column,
                        expected: expected.to_string(),
                        found: other.type_name().to_string(),
                    }),
                })
                .collect::<Result<Vec<_>>>()
                .map(Array::$variant)
        };
    }

    match kind {
        BindKind::Int64 => collect!(Int64),
        BindKind::Uint64 => collect!(Uint64),
        BindKind::Float => collect!(Float),
        BindKind::Double => collect!(Double),
        BindKind::Bool => collect!(Bool),
        BindKind::Bytes => collect!(Bytes),
        BindKind::Text => collect!(Text),
        BindKind::Timestamp => collect!(Timestamp),
        BindKind::Lob { .. } => collect!(Lob),
    }
}
