//! Tests for statement binding and execution
//!
//! These tests drive the public statement API against the in-memory native
//! backend and inspect the variables it received.

use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use oracle_exec::test_utils::{BindTarget, MemoryConnection, MemoryScript};
use oracle_exec::{
    Argument, BatchBuilder, Connection, DataSlot, Error, ExecMode, ExecOption, Lob, NativeError,
    NativeType, OracleType, StatementConfig, Value,
};

const INSERT: &str = "INSERT INTO t (a, b) VALUES (:1, :2)";

fn connect() -> (Arc<MemoryConnection>, Connection) {
    let native = MemoryConnection::new();
    let conn = Connection::new(native.clone());
    (native, conn)
}

mod scalar_binding_tests {
    use super::*;

    #[tokio::test]
    async fn test_text_by_position() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        stmt.exec_background(vec![Argument::positional(1, "abc")])
            .await
            .unwrap();

        let mem = native.statement(INSERT).unwrap();
        let binds = mem.binds();
        assert_eq!(binds.len(), 1);
        let (target, var) = &binds[0];
        assert_eq!(*target, BindTarget::Pos(1));
        assert_eq!(var.rows(), 1);
        assert_eq!(var.oracle_type(), OracleType::Varchar);
        assert!(var.buffer_size() >= 12);
        assert_eq!(stmt.array_len().await, None);
    }

    #[tokio::test]
    async fn test_every_scalar_kind_round_trips() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let when = offset.with_ymd_and_hms(2023, 6, 15, 12, 30, 45).unwrap();

        stmt.exec_background(Argument::from_values(vec![
            Value::from(-42i16),
            Value::from(42u16),
            Value::from(1.25f32),
            Value::from(2.5f64),
            Value::from(true),
            Value::from(vec![0xDEu8, 0xAD]),
            Value::from("text"),
            Value::from(when),
        ]))
        .await
        .unwrap();

        let mem = native.statement(INSERT).unwrap();
        let slot = |pos: u32| mem.bound_at(pos).unwrap().slot(0).cloned().unwrap();
        assert_eq!(slot(1).as_i64(), Some(-42));
        assert_eq!(slot(2).as_u64(), Some(42));
        assert_eq!(slot(3).as_f32(), Some(1.25));
        assert_eq!(slot(4).as_f64(), Some(2.5));
        assert_eq!(slot(5).as_bool(), Some(true));
        assert_eq!(slot(6).as_bytes(), Some(&[0xDE, 0xAD][..]));
        assert_eq!(slot(7).as_str(), Some("text"));
        assert_eq!(slot(8).as_timestamp().unwrap().to_datetime().unwrap(), when);

        let types: Vec<_> = (1..=8)
            .map(|pos| mem.bound_at(pos).unwrap().native_type())
            .collect();
        assert_eq!(
            types,
            vec![
                NativeType::Int64,
                NativeType::Uint64,
                NativeType::Float,
                NativeType::Double,
                NativeType::Boolean,
                NativeType::Bytes,
                NativeType::Bytes,
                NativeType::Timestamp,
            ]
        );
    }

    #[tokio::test]
    async fn test_lob_argument_is_staged() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        stmt.exec_background(vec![Argument::positional(1, Lob::from_text("a long text"))])
            .await
            .unwrap();

        let var = native.statement(INSERT).unwrap().bound_at(1).unwrap();
        assert_eq!(var.oracle_type(), OracleType::Clob);
        let handle = var.slot(0).and_then(DataSlot::as_lob).unwrap();
        assert_eq!(native.lob_data(handle).unwrap(), b"a long text");
        assert_eq!(native.live_lobs(), 1);

        stmt.close().await.unwrap();
        assert_eq!(native.live_vars(), 0);
        assert_eq!(native.live_lobs(), 0);
    }

    #[tokio::test]
    async fn test_rebind_releases_staged_lobs() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        stmt.exec_background(vec![Argument::positional(1, Lob::from_bytes(vec![1u8, 2, 3]))])
            .await
            .unwrap();
        stmt.exec_background(vec![Argument::positional(1, 1)])
            .await
            .unwrap();

        assert_eq!(native.live_vars(), 1);
        assert_eq!(native.live_lobs(), 0);
    }

    #[tokio::test]
    async fn test_null_is_unsupported() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        let err = stmt
            .exec_background(vec![Argument::positional(1, 1), Argument::positional(2, None::<i32>)])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "2. arg: unknown type null");
        assert!(native.statement(INSERT).unwrap().executions().is_empty());
    }

    #[tokio::test]
    async fn test_named_arguments() {
        let (native, conn) = connect();
        let stmt = conn.prepare("UPDATE t SET a = :a WHERE id = :id").unwrap();
        stmt.exec_background(vec![Argument::named("a", 1), Argument::named("id", 2)])
            .await
            .unwrap();

        let mem = native.statement("UPDATE t SET a = :a WHERE id = :id").unwrap();
        assert_eq!(mem.bound_to("id").unwrap().slot(0).unwrap().as_i64(), Some(2));
        assert!(mem.bound_at(1).is_none());
    }
}

mod batch_shape_tests {
    use super::*;

    #[tokio::test]
    async fn test_plsql_arrays_use_shortest_length() {
        let (native, conn) = connect();
        let stmt = conn.prepare("BEGIN pkg.proc(:1, :2); END;").unwrap();
        stmt.set_plsql_arrays(true).await;

        stmt.exec_background(Argument::from_values(vec![
            Value::from(vec![1, 2, 3]),
            Value::from(vec![10, 20]),
        ]))
        .await
        .unwrap();

        assert_eq!(stmt.array_len().await, Some(2));
        let mem = native.statement("BEGIN pkg.proc(:1, :2); END;").unwrap();
        assert!(mem.bound_at(1).unwrap().is_array());
        assert_eq!(mem.bound_at(1).unwrap().num_elements(), 2);
        assert_eq!(mem.executions()[0].iterations, None);
    }

    #[tokio::test]
    async fn test_different_lengths_rejected_without_plsql_arrays() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        let err = stmt
            .exec_background(Argument::from_values(vec![
                Value::from(vec![1, 2, 3]),
                Value::from(vec![10, 20]),
            ]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BatchShape { min: 2, max: 3 }));
        assert!(err.is_validation());
        assert!(native.allocations().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_array_rejected_before_allocation() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        let err = stmt
            .exec_background(vec![Argument::positional(1, vec![1i64; 50_000])])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BatchTooLarge { len: 50_000, .. }));
        assert!(native.allocations().is_empty());
    }

    #[tokio::test]
    async fn test_configured_maximum() {
        let native = MemoryConnection::new();
        let conn = Connection::with_config(native.clone(), StatementConfig::new().max_array_size(2));
        let stmt = conn.prepare(INSERT).unwrap();
        let err = stmt
            .exec_background(vec![Argument::positional(1, vec![1, 2, 3])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BatchTooLarge { len: 3, max: 2 }));
    }

    #[tokio::test]
    async fn test_option_marker_is_not_bound() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        stmt.exec_background(vec![
            Argument::positional(1, vec![1, 2, 3]),
            Argument::positional(2, ExecOption::PlSqlArrays),
            Argument::positional(3, vec![10, 20]),
        ])
        .await
        .unwrap();

        assert!(stmt.plsql_arrays().await);
        assert_eq!(native.statement(INSERT).unwrap().binds().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_builder_executes_many() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        let args = BatchBuilder::new()
            .add_row(vec![Value::from(1), Value::from("Alice")])
            .add_row(vec![Value::from(2), Value::from("Bob")])
            .add_row(vec![Value::from(3), Value::from("Charlie")])
            .build()
            .unwrap();

        stmt.exec_background(args).await.unwrap();

        let mem = native.statement(INSERT).unwrap();
        let execution = &mem.executions()[0];
        assert_eq!(execution.iterations, Some(3));
        assert_eq!(execution.mode, ExecMode::COMMIT_ON_SUCCESS);
        assert_eq!(mem.bound_at(2).unwrap().slot(2).unwrap().as_str(), Some("Charlie"));
        assert_eq!(mem.bound_at(2).unwrap().buffer_size(), 28);
    }
}

mod execution_tests {
    use super::*;

    #[tokio::test]
    async fn test_native_failure_reports_mode_and_width() {
        let (native, conn) = connect();
        native.script(
            INSERT,
            MemoryScript::new().fail_execute(NativeError::new(1, "unique constraint violated")),
        );
        let stmt = conn.prepare(INSERT).unwrap();

        let err = stmt
            .exec_background(vec![Argument::positional(1, vec![1, 1])])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "execute(mode=0x20 batch_len=2): ORA-00001: unique constraint violated"
        );
    }

    #[tokio::test]
    async fn test_attach_failure() {
        let (native, conn) = connect();
        native.script(
            INSERT,
            MemoryScript::new().fail_bind("1", NativeError::new(1036, "illegal variable name/number")),
        );
        let stmt = conn.prepare(INSERT).unwrap();
        let err = stmt
            .exec_background(vec![Argument::positional(1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BindAttach { ref name, .. } if name == "1"));
    }

    #[tokio::test]
    async fn test_allocation_failure() {
        let (native, conn) = connect();
        native.fail_new_var_after(1);
        let stmt = conn.prepare(INSERT).unwrap();
        let err = stmt
            .exec_background(vec![Argument::positional(1, 1), Argument::positional(2, "x")])
            .await
            .unwrap_err();
        match err {
            Error::Allocation {
                wire_type, rows, ..
            } => {
                assert_eq!(wire_type, OracleType::Varchar);
                assert_eq!(rows, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_bind_leaves_nothing_after_close() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        let far_future = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(40_000, 1, 1, 0, 0, 0)
            .unwrap();

        let err = stmt
            .exec_background(vec![
                Argument::positional(1, Lob::from_text("staged")),
                Argument::positional(2, far_future),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Encoding { arg: 1, row: 0, .. }));
        assert!(native.statement(INSERT).unwrap().executions().is_empty());

        stmt.close().await.unwrap();
        assert_eq!(native.live_vars(), 0);
        assert_eq!(native.live_lobs(), 0);
    }

    #[tokio::test]
    async fn test_reexecution_rebinds() {
        let (native, conn) = connect();
        let stmt = conn.prepare(INSERT).unwrap();
        for i in 0..3 {
            stmt.exec_background(vec![Argument::positional(1, i), Argument::positional(2, "x")])
                .await
                .unwrap();
        }
        let mem = native.statement(INSERT).unwrap();
        assert_eq!(mem.executions().len(), 3);
        assert_eq!(mem.bound_at(1).unwrap().slot(0).unwrap().as_i64(), Some(2));
        assert_eq!(native.live_vars(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let (native, conn) = connect();
        native.script(INSERT, MemoryScript::new().row_count(1));
        let stmt = Arc::new(conn.prepare(INSERT).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let stmt = stmt.clone();
            handles.push(tokio::spawn(async move {
                stmt.exec_background(vec![Argument::positional(1, i)]).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().rows_affected, Some(1));
        }
        assert_eq!(native.statement(INSERT).unwrap().executions().len(), 8);
        assert_eq!(native.live_vars(), 1);
    }
}
