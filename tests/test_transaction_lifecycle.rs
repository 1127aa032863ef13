use reir::backend::{Backend, Isolation, MemoryBackend, TransactionState};
use reir::catalog::{Catalog, MemoryCatalog};
use reir::{compile_and_run, Error, Phase};

const TABLE: &str = "define<{int:id key, int:balance}> accounts\n";

#[test]
fn test_transaction_lifecycle() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();

    compile_and_run(
        &format!(
            "{}transaction snapshot {{ insert accounts {{1, 100}}; insert accounts {{2, 50}} }}",
            TABLE
        ),
        &mut backend,
        &catalog,
    )
    .unwrap();

    let last = backend.last_transaction().unwrap();
    assert_eq!(last.state, TransactionState::Committed);
    assert_eq!(last.isolation, Isolation::Snapshot);
    assert!(backend.active_transaction().is_none());
    assert_eq!(backend.len(), 2);
}

#[test]
fn test_failure_aborts_transaction() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();

    // The second insert reuses key 1
    let err = compile_and_run(
        &format!(
            "{}transaction {{ insert accounts {{1, 100}}; insert accounts {{1, 5}} }}",
            TABLE
        ),
        &mut backend,
        &catalog,
    )
    .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(_)));
    assert_eq!(err.phase(), Phase::Backend);

    assert!(backend.is_empty());
    assert!(backend.active_transaction().is_none());
    assert_eq!(
        backend.last_transaction().map(|t| t.state),
        Some(TransactionState::Aborted)
    );

    // The backend accepts new transactions afterwards
    backend.begin_transaction(Isolation::Serializable).unwrap();
    backend.precommit_transaction().unwrap();
}

#[test]
fn test_runtime_error_leaves_no_writes() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();

    let err = compile_and_run(
        &format!(
            "{}transaction {{ insert accounts {{1, 100}}; let z = 0; let q = 1 / z }}",
            TABLE
        ),
        &mut backend,
        &catalog,
    )
    .unwrap_err();
    assert!(matches!(err, Error::DivisionByZero));
    assert!(backend.is_empty());

    // The schema was persisted before execution started
    assert!(catalog.load_schema("accounts").is_ok());
}

#[test]
fn test_scan_sees_own_writes() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();

    let rows = compile_and_run(
        &format!(
            "{}transaction {{
                insert accounts {{7, 70}}
                scan accounts, a {{ emit a }}
            }}",
            TABLE
        ),
        &mut backend,
        &catalog,
    )
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ints(), Some(vec![7, 70]));
}

#[test]
fn test_programs_share_backend_and_catalog() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();

    compile_and_run(TABLE, &mut backend, &catalog).unwrap();
    compile_and_run(
        "insert accounts {1, 10}; insert accounts {2, 20}",
        &mut backend,
        &catalog,
    )
    .unwrap();

    let rows = compile_and_run(
        "let total = 0
         scan accounts, a { total = total + a.balance }
         emit {total}",
        &mut backend,
        &catalog,
    )
    .unwrap();
    assert_eq!(rows[0].ints(), Some(vec![30]));
}

#[test]
fn test_nested_transaction_rejected() {
    let mut backend = MemoryBackend::new();
    let catalog = MemoryCatalog::new();
    let err = compile_and_run(
        "transaction { transaction { } }",
        &mut backend,
        &catalog,
    )
    .unwrap_err();
    assert!(matches!(err, Error::NestedTransaction));
    assert!(backend.last_transaction().is_none());
}
