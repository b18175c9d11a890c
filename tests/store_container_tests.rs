use device_qc::core::{Cell, Column, Table};
use device_qc::store::Container;
use device_qc::QcError;
use tempfile::tempdir;

fn areas() -> Table {
    Table::from_columns(
        Some("electrode_id".into()),
        vec!["e0".into(), "e1".into(), "e2".into()],
        vec![
            Column {
                name: "area".into(),
                values: vec![Cell::Float(1e-6), Cell::Float(2e-6), Cell::Float(4e-6)],
            },
            Column {
                name: "scaled/area".into(),
                values: vec![Cell::Float(1.0), Cell::Float(2.0), Cell::Float(4.0)],
            },
        ],
    )
    .unwrap()
}

#[test]
fn test_missing_file_opens_empty() {
    let dir = tempdir().unwrap();
    let container = Container::open(&dir.path().join("absent.dqc")).unwrap();
    assert!(container.is_empty());
}

#[test]
fn test_save_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("areas.dqc");

    let mut container = Container::new();
    container.put("run1/device/electrode_areas", &areas(), 5).unwrap();
    container.save(&path).unwrap();

    let reopened = Container::open(&path).unwrap();
    assert_eq!(reopened.keys(), vec!["run1/device/electrode_areas"]);
    assert_eq!(reopened.get("/run1/device/electrode_areas").unwrap(), areas());
    assert_eq!(reopened.compression_level("run1/device/electrode_areas").unwrap(), 5);
}

#[test]
fn test_columns_with_separator_are_not_data_columns() {
    let mut container = Container::new();
    container.put("areas", &areas(), 5).unwrap();

    assert_eq!(container.data_columns("areas").unwrap(), &["area".to_string()]);
}

#[test]
fn test_select_on_data_column() {
    let mut container = Container::new();
    container.put("areas", &areas(), 5).unwrap();

    let large = container
        .select("areas", "area", |cell| cell.as_f64().unwrap_or(0.0) > 1.5e-6)
        .unwrap();
    assert_eq!(large.len(), 2);
    assert_eq!(large.index(), &[Cell::from("e1"), Cell::from("e2")]);

    let err = container.select("areas", "scaled/area", |_| true).unwrap_err();
    assert!(matches!(err, QcError::NotQueryable { .. }));
}

#[test]
fn test_overwrite_replaces_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("c.dqc");

    let mut first = Table::new(&["v"]);
    first.push_row(0usize, vec![Cell::Int(1)]).unwrap();
    first.push_row(1usize, vec![Cell::Int(2)]).unwrap();
    let mut second = Table::new(&["v"]);
    second.push_row(0usize, vec![Cell::Int(9)]).unwrap();

    let mut container = Container::new();
    container.put("t", &first, 5).unwrap();
    container.save(&path).unwrap();

    let mut container = Container::open(&path).unwrap();
    container.put("t", &second, 5).unwrap();
    container.save(&path).unwrap();

    let table = Container::open(&path).unwrap().get("t").unwrap();
    assert_eq!(table, second);
}

#[test]
fn test_identical_content_gives_identical_bytes() {
    let dir = tempdir().unwrap();
    let (a, b) = (dir.path().join("a.dqc"), dir.path().join("b.dqc"));

    let mut container = Container::new();
    container.put("x/areas", &areas(), 5).unwrap();
    container.put("a/areas", &areas(), 5).unwrap();
    container.save(&a).unwrap();

    let mut container = Container::new();
    container.put("a/areas", &areas(), 5).unwrap();
    container.put("x/areas", &areas(), 5).unwrap();
    container.save(&b).unwrap();

    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

#[test]
fn test_missing_entry() {
    let container = Container::new();
    assert!(matches!(container.get("nope"), Err(QcError::EntryNotFound(_))));
    assert!(!container.contains("nope"));
}

#[test]
fn test_remove() {
    let mut container = Container::new();
    container.put("areas", &areas(), 5).unwrap();
    assert!(container.remove("/areas"));
    assert!(container.is_empty());
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.dqc");

    let mut container = Container::new();
    container.put("areas", &areas(), 5).unwrap();
    container.save(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    assert!(matches!(Container::open(&path), Err(QcError::Persistence { .. })));
}

#[test]
fn test_failed_save_leaves_no_temporary_file() {
    let dir = tempdir().unwrap();
    // A directory in the way makes the final rename fail
    let path = dir.path().join("blocked.dqc");
    std::fs::create_dir(&path).unwrap();

    let mut container = Container::new();
    container.put("areas", &areas(), 5).unwrap();
    let err = container.save(&path).unwrap_err();

    assert!(matches!(err, QcError::Persistence { .. }));
    assert!(!dir.path().join("blocked.dqc.tmp").exists());
}
