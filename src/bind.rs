//! Bind planning
//!
//! Turns the argument list of one execution into native variables attached to
//! the statement. The shape of the batch is validated before any native call:
//! array arguments longer than the configured maximum, or arrays of differing
//! length outside PL/SQL array mode, are rejected up front.

use crate::config::StatementConfig;
use crate::encode::{self, BindKind, EncodeContext};
use crate::error::{Error, Result};
use crate::native::{NativeConnection, NativeStatement};
use crate::value::{Argument, BindName, Value};
use crate::variable::{self, DataSlot, VarArena, Variable};

/// Outcome of binding one argument list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPlan {
    /// Number of bound arguments
    pub arg_count: usize,
    /// Shortest array argument length, if any argument is an array
    pub array_len: Option<usize>,
    /// Whether the statement runs once per array row
    pub exec_many: bool,
    /// Whether variables were attached by name
    pub named: bool,
}

impl BindPlan {
    /// Number of iterations for execute-many
    pub fn iterations(&self) -> usize {
        if self.exec_many {
            self.array_len.unwrap_or(0)
        } else {
            0
        }
    }
}

/// Shortest and longest array argument lengths
fn array_bounds(args: &[Argument]) -> Option<(usize, usize)> {
    args.iter()
        .filter_map(|a| a.value.array_len())
        .fold(None, |acc, len| match acc {
            None => Some((len, len)),
            Some((min, max)) => Some((min.min(len), max.max(len))),
        })
}

/// Validate the batch shape and compute the plan without touching the
/// native layer
pub(crate) fn plan(
    args: &[Argument],
    plsql_arrays: bool,
    config: &StatementConfig,
) -> Result<BindPlan> {
    let bounds = array_bounds(args);
    if let Some((min, max)) = bounds {
        if max > config.max_array_size {
            return Err(Error::BatchTooLarge {
                len: max,
                max: config.max_array_size,
            });
        }
        if !plsql_arrays && min != max {
            return Err(Error::BatchShape { min, max });
        }
    }

    let array_len = bounds.map(|(min, _)| min);
    Ok(BindPlan {
        arg_count: args.len(),
        array_len,
        exec_many: !plsql_arrays && array_len.is_some_and(|n| n > 0),
        named: args.iter().any(|a| a.bind_name().is_some()),
    })
}

/// Allocate, encode and attach a variable for every argument.
///
/// Previously bound variables are released first; the arena keeps its
/// capacity.
pub(crate) fn bind(
    conn: &dyn NativeConnection,
    stmt: &dyn NativeStatement,
    config: &StatementConfig,
    arena: &mut VarArena,
    plsql_arrays: bool,
    args: Vec<Argument>,
) -> Result<BindPlan> {
    let plan = plan(&args, plsql_arrays, config)?;
    let ctx = EncodeContext { conn, config };

    arena.reset(conn, args.len());
    let mut names = Vec::with_capacity(args.len());
    for (i, Argument { name, value }) in args.into_iter().enumerate() {
        let var = build_variable(ctx, &plan, plsql_arrays, i, value)?;
        arena.push(var);
        names.push(name);
    }

    for (i, (var, name)) in arena.iter().zip(&names).enumerate() {
        attach(stmt, plan.named, i, name, var)?;
    }

    tracing::debug!(
        args = plan.arg_count,
        array_len = ?plan.array_len,
        exec_many = plan.exec_many,
        named = plan.named,
        "Bound arguments"
    );
    Ok(plan)
}

fn build_variable(
    ctx: EncodeContext<'_>,
    plan: &BindPlan,
    plsql_arrays: bool,
    arg: usize,
    value: Value,
) -> Result<Variable> {
    let kind = BindKind::of(arg + 1, &value)?;
    let size = encode::buffer_size(&value, ctx.config.char_size_multiplier);
    let array_len = plan.array_len.unwrap_or(0);

    let (use_array_binding, rows) = if plan.exec_many {
        (false, array_len)
    } else if plsql_arrays && value.is_array() {
        (true, array_len)
    } else {
        (false, 1)
    };

    let mut var = variable::allocate(
        ctx.conn,
        use_array_binding,
        kind.wire_type(),
        kind.native_type(),
        rows,
        size,
    )?;

    if let Err(e) = fill_variable(ctx, plan, arg, &mut var, value) {
        // Releases the LOBs already staged into earlier rows as well
        if let Err(release_err) = ctx.conn.release_var(&var) {
            tracing::warn!(arg, error = %release_err, "Failed to release bind variable");
        }
        return Err(e);
    }
    Ok(var)
}

fn fill_variable(
    ctx: EncodeContext<'_>,
    plan: &BindPlan,
    arg: usize,
    var: &mut Variable,
    value: Value,
) -> Result<()> {
    match value {
        Value::Array(array) => {
            let take = var.num_elements();
            let slots = var.slots_mut();
            // Outside batched execution an (empty) array leaves one NULL row
            for (row, mut elem) in array.into_values().into_iter().take(take).enumerate() {
                encode_row(ctx, slots, arg, row, &mut elem)?;
            }
        }
        mut scalar => {
            let slots = var.slots_mut();
            encode_row(ctx, slots, arg, 0, &mut scalar)?;
            if plan.exec_many {
                let (first, rest) = slots.split_at_mut(1);
                for slot in rest {
                    slot.clone_from(&first[0]);
                }
            }
        }
    }
    Ok(())
}

fn encode_row(
    ctx: EncodeContext<'_>,
    slots: &mut [DataSlot],
    arg: usize,
    row: usize,
    value: &mut Value,
) -> Result<()> {
    let slot = slots
        .get_mut(row)
        .ok_or_else(|| Error::Internal(format!("row {} out of range for argument {}", row, arg)))?;
    encode::set(ctx, slot, value).map_err(|source| Error::Encoding {
        arg,
        row,
        value: format!("{:?}", value),
        type_name: value.type_name(),
        source: Box::new(source),
    })
}

fn attach(
    stmt: &dyn NativeStatement,
    named: bool,
    index: usize,
    name: &BindName,
    var: &Variable,
) -> Result<()> {
    if named {
        let name = name.to_string();
        stmt.bind_by_name(&name, var)
            .map_err(|source| Error::BindAttach { name, source })
    } else {
        let pos = index + 1;
        stmt.bind_by_pos(pos as u32, var)
            .map_err(|source| Error::BindAttach {
                name: pos.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::constants::{NativeType, OracleType};
    use crate::native::NativeError;
    use crate::test_utils::{MemoryConnection, MemoryScript, MemoryStatement};
    use crate::types::Lob;
    use crate::value::ExecOption;

    const SQL: &str = "INSERT INTO t VALUES (:1, :2)";

    fn setup() -> (Arc<MemoryConnection>, Arc<dyn NativeStatement>, Arc<MemoryStatement>) {
        let conn = MemoryConnection::new();
        let stmt = conn.prepare(SQL).unwrap();
        let mem = conn.statement(SQL).unwrap();
        (conn, stmt, mem)
    }

    fn run(
        conn: &MemoryConnection,
        stmt: &dyn NativeStatement,
        arena: &mut VarArena,
        plsql_arrays: bool,
        values: Vec<Value>,
    ) -> Result<BindPlan> {
        let config = StatementConfig::default();
        bind(conn, stmt, &config, arena, plsql_arrays, Argument::from_values(values))
    }

    #[test]
    fn test_single_text_argument() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let plan = run(&conn, &*stmt, &mut arena, false, vec![Value::from("abc")]).unwrap();

        assert_eq!(plan.array_len, None);
        assert!(!plan.exec_many);
        assert!(!plan.named);

        let var = mem.bound_at(1).unwrap();
        assert_eq!(var.rows(), 1);
        assert_eq!(var.oracle_type(), OracleType::Varchar);
        assert_eq!(var.native_type(), NativeType::Bytes);
        assert!(var.buffer_size() >= 12);
        assert_eq!(var.slot(0).unwrap().as_str(), Some("abc"));
    }

    #[test]
    fn test_plsql_arrays_take_shortest_length() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let plan = run(
            &conn,
            &*stmt,
            &mut arena,
            true,
            vec![Value::from(vec![1, 2, 3]), Value::from(vec![10, 20])],
        )
        .unwrap();

        assert_eq!(plan.array_len, Some(2));
        assert!(!plan.exec_many);

        let first = mem.bound_at(1).unwrap();
        assert!(first.is_array());
        assert_eq!(first.num_elements(), 2);
        let values: Vec<_> = first.slots().iter().map(|s| s.as_i64()).collect();
        assert_eq!(values, vec![Some(1), Some(2)]);

        let second = mem.bound_at(2).unwrap();
        assert_eq!(second.slot(1).unwrap().as_i64(), Some(20));
    }

    #[test]
    fn test_mismatched_lengths_rejected_before_allocation() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let err = run(
            &conn,
            &*stmt,
            &mut arena,
            false,
            vec![Value::from(vec![1, 2, 3]), Value::from(vec![10, 20])],
        )
        .unwrap_err();

        assert!(matches!(err, Error::BatchShape { min: 2, max: 3 }));
        assert!(conn.allocations().is_empty());
        assert!(mem.binds().is_empty());
    }

    #[test]
    fn test_too_large_rejected_before_allocation() {
        let (conn, stmt, _) = setup();
        let mut arena = VarArena::new();
        for plsql_arrays in [false, true] {
            let err = run(
                &conn,
                &*stmt,
                &mut arena,
                plsql_arrays,
                vec![Value::from(vec![0i64; 50_000])],
            )
            .unwrap_err();
            assert!(matches!(err, Error::BatchTooLarge { len: 50_000, max: 32_767 }));
        }
        assert!(conn.allocations().is_empty());
    }

    #[test]
    fn test_exec_many_repeats_scalars() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let plan = run(
            &conn,
            &*stmt,
            &mut arena,
            false,
            vec![Value::from(vec!["a", "bb", "ccc"]), Value::from(7)],
        )
        .unwrap();

        assert!(plan.exec_many);
        assert_eq!(plan.iterations(), 3);

        let text = mem.bound_at(1).unwrap();
        assert!(!text.is_array());
        assert_eq!(text.rows(), 3);
        assert_eq!(text.buffer_size(), 12);
        assert_eq!(text.slot(2).unwrap().as_str(), Some("ccc"));

        let scalar = mem.bound_at(2).unwrap();
        assert_eq!(scalar.rows(), 3);
        assert!(scalar.slots().iter().all(|s| s.as_i64() == Some(7)));
    }

    #[test]
    fn test_empty_array_binds_null_row() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let plan = run(&conn, &*stmt, &mut arena, false, vec![Value::from(Vec::<i64>::new())])
            .unwrap();

        assert_eq!(plan.array_len, Some(0));
        assert!(!plan.exec_many);
        let var = mem.bound_at(1).unwrap();
        assert_eq!(var.rows(), 1);
        assert!(var.slot(0).unwrap().is_null());
    }

    #[test]
    fn test_named_binding_falls_back_to_ordinal() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let config = StatementConfig::default();
        let args = vec![Argument::named("id", 5), Argument::positional(2, "x")];
        let plan = bind(&*conn, &*stmt, &config, &mut arena, false, args).unwrap();

        assert!(plan.named);
        assert_eq!(mem.bound_to("id").unwrap().slot(0).unwrap().as_i64(), Some(5));
        assert_eq!(mem.bound_to("2").unwrap().slot(0).unwrap().as_str(), Some("x"));
        assert!(mem.bound_at(1).is_none());
    }

    #[test]
    fn test_unsupported_argument_position() {
        let (conn, stmt, _) = setup();
        let mut arena = VarArena::new();
        let err = run(
            &conn,
            &*stmt,
            &mut arena,
            false,
            vec![Value::from(1), Value::Null],
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { position: 2, type_name: "null" }));

        let err = run(
            &conn,
            &*stmt,
            &mut arena,
            false,
            vec![Value::from(ExecOption::PlSqlArrays)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { position: 1, type_name: "option" }));
    }

    #[test]
    fn test_encoding_failure_stops_binding() {
        let (conn, stmt, mem) = setup();
        let mut arena = VarArena::new();
        let far_future = Utc.with_ymd_and_hms(40_000, 1, 1, 0, 0, 0).unwrap();
        let err = run(
            &conn,
            &*stmt,
            &mut arena,
            false,
            vec![Value::from(1), Value::from(far_future), Value::from(3)],
        )
        .unwrap_err();

        match &err {
            Error::Encoding {
                arg, row, type_name, source, ..
            } => {
                assert_eq!((*arg, *row), (1, 0));
                assert_eq!(*type_name, "timestamp");
                assert!(matches!(**source, Error::DataConversionError(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("set(data[1][0], "));
        assert!(mem.binds().is_empty());
    }

    #[test]
    fn test_encoding_failure_releases_variable() {
        let (conn, stmt, _) = setup();
        let mut arena = VarArena::new();
        let far_future = Utc.with_ymd_and_hms(40_000, 1, 1, 0, 0, 0).unwrap();
        run(&conn, &*stmt, &mut arena, false, vec![Value::from(1), Value::from(far_future)])
            .unwrap_err();

        assert_eq!(arena.len(), 1);
        arena.release_all(&*conn).unwrap();
        assert_eq!(conn.live_vars(), 0);
    }

    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn test_lob_failure_releases_staged_rows() {
        let (conn, stmt, _) = setup();
        let mut arena = VarArena::new();
        let lobs = vec![Lob::from_text("first"), Lob::clob(BrokenReader)];
        let err = run(&conn, &*stmt, &mut arena, false, vec![Value::from(lobs)]).unwrap_err();

        assert!(matches!(err, Error::Encoding { arg: 0, row: 1, .. }));
        assert!(arena.is_empty());
        assert_eq!(conn.live_vars(), 0);
        assert_eq!(conn.live_lobs(), 0);
    }

    #[test]
    fn test_attach_failure_names_placeholder() {
        let conn = MemoryConnection::new();
        conn.script(SQL, MemoryScript::new().fail_bind("2", NativeError::new(1036, "illegal variable name/number")));
        let stmt = conn.prepare(SQL).unwrap();
        let mut arena = VarArena::new();

        let err = run(&conn, &*stmt, &mut arena, false, vec![Value::from(1), Value::from(2)])
            .unwrap_err();
        match err {
            Error::BindAttach { name, source } => {
                assert_eq!(name, "2");
                assert_eq!(source.code, 1036);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rebind_releases_previous_variables() {
        let (conn, stmt, _) = setup();
        let mut arena = VarArena::new();
        run(&conn, &*stmt, &mut arena, false, vec![Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(conn.live_vars(), 2);

        run(&conn, &*stmt, &mut arena, false, vec![Value::from(3)]).unwrap();
        assert_eq!(conn.live_vars(), 1);
        assert_eq!(arena.len(), 1);
    }
}
