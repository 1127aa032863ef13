use reir::backend::MemoryBackend;
use reir::catalog::{AttrType, Attribute, Catalog, MemoryCatalog, Schema};
use reir::compile_and_run;

#[test]
fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reir.catalog");

    let catalog = MemoryCatalog::new();
    let mut backend = MemoryBackend::new();
    compile_and_run(
        "define<{int:id key, string(8):name, date:born nullable}> people",
        &mut backend,
        &catalog,
    )
    .unwrap();
    catalog.save_to_disk(&path).unwrap();

    let restored = MemoryCatalog::load_from_disk(&path).unwrap();
    assert_eq!(restored.list_tables(), vec!["people".to_string()]);

    let schema = restored.load_schema("people").unwrap();
    assert_eq!(schema, catalog.load_schema("people").unwrap());
    assert_eq!(
        schema,
        Schema::new(
            "people",
            vec![
                Attribute::new("id", AttrType::Integer).key(true),
                Attribute::new("name", AttrType::String(8)),
                Attribute::new("born", AttrType::Date).nullable(true),
            ],
        )
    );
}

#[test]
fn test_restored_catalog_resolves_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reir.catalog");

    {
        let catalog = MemoryCatalog::new();
        let mut backend = MemoryBackend::new();
        compile_and_run("define<{int:a key, int:b}> t", &mut backend, &catalog).unwrap();
        catalog.save_to_disk(&path).unwrap();
    }

    let catalog = MemoryCatalog::load_from_disk(&path).unwrap();
    let mut backend = MemoryBackend::new();
    let rows = compile_and_run(
        "insert t {4, 40}; scan t, row { emit row }",
        &mut backend,
        &catalog,
    )
    .unwrap();
    assert_eq!(rows[0].ints(), Some(vec![4, 40]));
}
