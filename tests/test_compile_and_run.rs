use reir::backend::MemoryBackend;
use reir::catalog::MemoryCatalog;
use reir::catalog::Value;
use reir::config::DriverConfig;
use reir::{compile_and_run, Driver, Error, Phase};

fn run(source: &str) -> reir::Result<Vec<Vec<i64>>> {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();
    let rows = compile_and_run(source, &mut backend, &catalog)?;
    Ok(rows
        .iter()
        .map(|r| r.ints().expect("integer row"))
        .collect())
}

#[test]
fn test_insert_then_scan() {
    let rows = run("define<{int:a key, int:b}> t
         insert t {1, 2}
         transaction { scan t, row { emit row } }")
    .unwrap();
    assert_eq!(rows, vec![vec![1, 2]]);
}

#[test]
fn test_loop_emission_order() {
    let rows = run("for let x = 0; x < 5; x = x + 1 { emit {x} }").unwrap();
    assert_eq!(rows, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
}

#[test]
fn test_short_circuit() {
    assert_eq!(
        run("let x = 5; 0 && (x = 1); emit {x}").unwrap(),
        vec![vec![5]]
    );
    assert_eq!(
        run("let x = 5; 1 || (x = 1); emit {x}").unwrap(),
        vec![vec![5]]
    );
    assert_eq!(
        run("let x = 5; 1 && (x = 1); emit {x}").unwrap(),
        vec![vec![1]]
    );
}

#[test]
fn test_type_errors() {
    let err = run(r#"emit {1 + "a"}"#).unwrap_err();
    assert_eq!(err.phase(), Phase::Type);

    let err = run("emit {y}").unwrap_err();
    assert!(matches!(err, Error::UndefinedVariable(_)));
    assert!(err.to_string().contains("'y'"));
}

#[test]
fn test_nullable_column_rejected() {
    let err = run("define<{int:a key, int:b nullable}> t
         insert t {1, 2}")
    .unwrap_err();
    assert_eq!(err.phase(), Phase::Schema);
}

#[test]
fn test_insert_arity_mismatch() {
    let err = run("define<{int:a key, int:b}> t
         insert t {1, 2, 3}")
    .unwrap_err();
    assert!(matches!(
        err,
        Error::TupleSizeMismatch {
            expected: 2,
            found: 3
        }
    ));
}

#[test]
fn test_scan_does_not_see_prefixed_tables() {
    let rows = run("define<{int:a key, int:b}> t
         define<{int:a key, int:b}> tx
         insert t {1, 10}
         insert tx {2, 20}
         insert t {3, 30}
         scan t, row { emit row }")
    .unwrap();
    assert_eq!(rows, vec![vec![1, 10], vec![3, 30]]);
}

#[test]
fn test_break_and_continue_in_scan() {
    let setup = "define<{int:a key, int:b}> t
         insert t {1, 10}; insert t {2, 20}; insert t {3, 30}\n";

    let rows = run(&format!("{}scan t, row {{ emit row; break }}", setup)).unwrap();
    assert_eq!(rows, vec![vec![1, 10]]);

    let rows = run(&format!(
        "{}scan t, row {{ if row.a == 2 {{ continue }} emit {{row.b}} }}",
        setup
    ))
    .unwrap();
    assert_eq!(rows, vec![vec![10], vec![30]]);
}

#[test]
fn test_cursor_released_after_break() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();
    compile_and_run(
        "define<{int:a key}> t
         insert t {1}; insert t {2}
         scan t, row { break }",
        &mut backend,
        &catalog,
    )
    .unwrap();
    assert_eq!(backend.open_cursors(), 0);
}

#[test]
fn test_inserts_in_loop_inside_transaction() {
    let rows = run("define<{int:a key, int:b}> t
         transaction {
             for let i = 0; i < 3; i = i + 1 { insert t {i, i * 10} }
         }
         scan t, row { emit row }")
    .unwrap();
    assert_eq!(rows, vec![vec![0, 0], vec![1, 10], vec![2, 20]]);
}

#[test]
fn test_nested_loops_break_inner_only() {
    let rows = run("for let i = 0; i < 3; i = i + 1 {
             for let j = 0; j < 3; j = j + 1 {
                 if j == 1 { break }
                 emit {i, j}
             }
         }")
    .unwrap();
    assert_eq!(rows, vec![vec![0, 0], vec![1, 0], vec![2, 0]]);
}

#[test]
fn test_if_else() {
    assert_eq!(
        run("let x = 3; if x > 2 { emit {1} } else { emit {0} }").unwrap(),
        vec![vec![1]]
    );
    assert_eq!(
        run("let x = 0; if x { emit {1} } else { emit {0} }").unwrap(),
        vec![vec![0]]
    );
}

#[test]
fn test_operators_are_right_associative() {
    // Flat precedence: 10 - 2 - 3 is 10 - (2 - 3)
    assert_eq!(run("emit {10 - 2 - 3}").unwrap(), vec![vec![11]]);
    assert_eq!(run("emit {(10 - 2) - 3}").unwrap(), vec![vec![5]]);
}

#[test]
fn test_compound_assignment() {
    assert_eq!(
        run("let x = 1; x += 4; x *= 3; emit {x}").unwrap(),
        vec![vec![15]]
    );
}

#[test]
fn test_arrays_and_members() {
    assert_eq!(
        run("let a = [1, 2, 3]; a[1] = 20; emit {a[0], a[1]}").unwrap(),
        vec![vec![1, 20]]
    );
    assert_eq!(
        run("tuple point {int:x, int:y}
             let <point> p = {1, 2}
             p.y = 7
             emit p")
        .unwrap(),
        vec![vec![1, 7]]
    );
}

#[test]
fn test_runtime_errors() {
    let err = run("let a = [1]; emit {a[3]}").unwrap_err();
    assert!(matches!(err, Error::IndexOutOfBounds { index: 3, len: 1 }));
    assert_eq!(err.phase(), Phase::Runtime);

    let err = run("let z = 0; emit {1 / z}").unwrap_err();
    assert!(matches!(err, Error::DivisionByZero));
}

#[test]
fn test_mixed_cell_rows() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();
    let rows = compile_and_run(
        r#"emit {1, "hi", {2, 3}, 1.5}"#,
        &mut backend,
        &catalog,
    )
    .unwrap();
    assert_eq!(
        rows[0].values,
        vec![
            Value::Int64(1),
            Value::Varchar("hi".to_string()),
            Value::Int64(2),
            Value::Int64(3),
            Value::Float64(1.5),
        ]
    );
    assert_eq!(rows[0].raw.len(), 8 + (8 + 2) + 8 + 8 + 8);
}

#[test]
fn test_step_limit() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();
    let driver = Driver::new(DriverConfig::new().max_steps(1_000));
    let err = driver
        .run("for ; 1; { }", &mut backend, &catalog)
        .unwrap_err();
    assert!(matches!(err, Error::StepLimitExceeded(1_000)));
}

#[test]
fn test_syntax_error_phase() {
    let err = run("let = 1").unwrap_err();
    assert_eq!(err.phase(), Phase::Syntax);
}

#[test]
fn test_rebinding_does_not_change_earlier_references() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();
    let execution = Driver::default()
        .run(
            r#"let x = 1
               for let i = 0; i < 2; i = i + 1 { print_int(x); let x = "s" }
               print_string(x)"#,
            &mut backend,
            &catalog,
        )
        .unwrap();
    assert_eq!(execution.console, vec!["1", "1", "s"]);

    assert_eq!(
        run("let x = 1
             for let i = 0; i < 2; i = i + 1 { emit {x + 1}; let x = 2.5 }")
        .unwrap(),
        vec![vec![2], vec![2]]
    );
}

#[test]
fn test_scan_bindings_reused_across_tables() {
    let rows = run("define<{int:a key}> t
         define<{int:a key, int:b}> u
         insert t {1}; insert u {2, 3}
         for let i = 0; i < 2; i = i + 1 {
             scan t, row { emit row }
             scan u, row { emit {row.b} }
         }")
    .unwrap();
    assert_eq!(rows, vec![vec![1], vec![3], vec![1], vec![3]]);
}

#[test]
fn test_rand_range_and_seed() {
    let rows = run("for let i = 0; i < 100; i = i + 1 { emit {rand(0, 2)} }").unwrap();
    assert_eq!(rows.len(), 100);
    assert!(rows.iter().all(|r| r[0] == 0 || r[0] == 1));
    assert!(rows.iter().any(|r| r[0] == 0));
    assert!(rows.iter().any(|r| r[0] == 1));

    assert_eq!(
        run("emit {rand(3, 3), rand(5, 1)}").unwrap(),
        vec![vec![3, 5]]
    );

    let draws = |seed| {
        let mut backend = MemoryBackend::new();
        let catalog = MemoryCatalog::new();
        Driver::new(DriverConfig::new().rand_seed(seed))
            .run(
                "for let i = 0; i < 5; i = i + 1 { emit {rand(0 - 1000000, 1000000)} }",
                &mut backend,
                &catalog,
            )
            .unwrap()
            .rows
            .iter()
            .map(|r| r.ints().unwrap()[0])
            .collect::<Vec<_>>()
    };
    assert_eq!(draws(42), draws(42));
    assert_ne!(draws(42), draws(43));
    assert!(draws(42).iter().all(|n| (-1_000_000..1_000_000).contains(n)));
}
