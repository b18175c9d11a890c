use chrono::Utc;
use device_qc::core::{ImpedanceRow, ImpedanceStructures, ImpedanceTable, Table};
use device_qc::hal::mock::SimulatedDeviceInfo;
use device_qc::scan::{plot_path, structures_from, PersistOptions, Persistence};
use device_qc::store::Container;
use device_qc::visualization::{PlotOpener, SummaryPlotter};
use device_qc::{QcError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn structures() -> ImpedanceStructures {
    let start = Utc::now();
    let rows = (0..4)
        .map(|channel_i| ImpedanceRow {
            utc_start: start,
            seconds: 0.01 * channel_i as f64,
            channel_i,
            frequency: 10e3,
            v_actuation: 98.0,
            capacitance: 60e-15 + channel_i as f64 * 10e-15,
            impedance: 2.5e5,
        })
        .collect();
    let geometry = SimulatedDeviceInfo::grid(2, 2, 1.5);
    structures_from(&ImpedanceTable::new(rows), &geometry).unwrap()
}

#[derive(Clone, Default)]
struct RecordingPlotter {
    titles: Arc<Mutex<Vec<String>>>,
}

impl SummaryPlotter for RecordingPlotter {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn render(&self, _structures: &ImpedanceStructures, title: &str, output: &Path) -> Result<()> {
        self.titles.lock().unwrap().push(title.to_string());
        std::fs::write(output, b"%PDF-1.4").map_err(|e| QcError::Plot(e.to_string()))
    }
}

#[derive(Clone, Default)]
struct RecordingOpener {
    opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl PlotOpener for RecordingOpener {
    fn open(&self, path: &Path) -> Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

struct NoOpener;

impl PlotOpener for NoOpener {
    fn open(&self, path: &Path) -> Result<()> {
        Err(QcError::UnsupportedPlatform {
            path: path.to_path_buf(),
            platform: "plan9".into(),
        })
    }
}

#[test]
fn test_round_trip_under_root() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("scan.dqc");
    let structures = structures();

    let report = Persistence::new()
        .persist(&structures, &output, &PersistOptions::default().with_root("run1"))
        .unwrap();

    assert_eq!(report.written.len(), 6);
    assert!(report.plot_path.is_none());

    let container = Container::open(&output).unwrap();
    let stored = container.get("run1/channel_impedances").unwrap();
    assert_eq!(&stored, structures.get("channel_impedances").unwrap());
    assert_eq!(
        ImpedanceTable::from_table(&stored).unwrap(),
        structures.impedance_table().unwrap()
    );
    assert!(container.contains("run1/device/shapes"));
    assert!(container.contains("run1/device/channel_areas"));
}

#[test]
fn test_trailing_separator_in_root_is_ignored() {
    let dir = tempdir().unwrap();
    let (a, b) = (dir.path().join("a.dqc"), dir.path().join("b.dqc"));
    let structures = structures();
    let persistence = Persistence::new();

    persistence
        .persist(&structures, &a, &PersistOptions::default().with_root("foo/"))
        .unwrap();
    persistence
        .persist(&structures, &b, &PersistOptions::default().with_root("foo"))
        .unwrap();

    let (ca, cb) = (Container::open(&a).unwrap(), Container::open(&b).unwrap());
    assert_eq!(ca.keys(), cb.keys());
    assert!(ca.keys().iter().all(|k| k.starts_with("foo/")));
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

#[test]
fn test_empty_root_writes_bare_keys() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("scan.dqc");

    let report = Persistence::new()
        .persist(&structures(), &output, &PersistOptions::default())
        .unwrap();

    let container = Container::open(&output).unwrap();
    assert_eq!(report.written, container.keys());
    assert!(report.written.contains(&"channel_impedances".to_string()));
    assert!(container.contains("channel_impedances"));
    assert!(container.contains("device/electrodes_by_channel"));
    assert_eq!(
        container.data_columns("channel_impedances").unwrap().len(),
        7
    );
}

#[test]
fn test_existing_entries_survive_new_scan() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("scan.dqc");
    let persistence = Persistence::new();

    persistence
        .persist(&structures(), &output, &PersistOptions::default().with_root("run1"))
        .unwrap();
    persistence
        .persist(&structures(), &output, &PersistOptions::default().with_root("run2"))
        .unwrap();

    let container = Container::open(&output).unwrap();
    assert_eq!(container.len(), 12);
}

#[test]
fn test_plot_saved_next_to_container_and_opened() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("chip-42.dqc");
    let plotter = RecordingPlotter::default();
    let opener = RecordingOpener::default();

    let report = Persistence::new()
        .with_plotter(plotter.clone())
        .with_opener(opener.clone())
        .persist(&structures(), &output, &PersistOptions::default().with_plot(true, true))
        .unwrap();

    let expected = dir.path().join("chip-42.pdf");
    assert_eq!(report.plot_path, Some(expected.clone()));
    assert!(expected.exists());
    assert_eq!(*plotter.titles.lock().unwrap(), vec!["chip-42".to_string()]);
    assert_eq!(*opener.opened.lock().unwrap(), vec![expected]);
}

#[test]
fn test_open_without_save_does_nothing() {
    let dir = tempdir().unwrap();
    let opener = RecordingOpener::default();

    let report = Persistence::new()
        .with_opener(opener.clone())
        .persist(
            &structures(),
            &dir.path().join("scan.dqc"),
            &PersistOptions::default().with_plot(false, true),
        )
        .unwrap();

    assert!(report.plot_path.is_none());
    assert!(opener.opened.lock().unwrap().is_empty());
}

#[test]
fn test_unsupported_opener_is_reported() {
    let dir = tempdir().unwrap();

    let err = Persistence::new()
        .with_plotter(RecordingPlotter::default())
        .with_opener(NoOpener)
        .persist(
            &structures(),
            &dir.path().join("scan.dqc"),
            &PersistOptions::default().with_plot(true, true),
        )
        .unwrap_err();

    assert!(matches!(err, QcError::UnsupportedPlatform { .. }));
}

#[test]
fn test_default_plotter_writes_pdf_sibling() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("chip.dqc");

    let report = Persistence::new()
        .persist(&structures(), &output, &PersistOptions::default().with_plot(true, false))
        .unwrap();

    let pdf = report.plot_path.unwrap();
    assert_eq!(pdf, dir.path().join("chip.pdf"));
    let content = std::fs::read(&pdf).unwrap();
    assert!(content.starts_with(b"%PDF"));
}

#[test]
fn test_write_failure_propagates() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("missing-dir").join("scan.dqc");

    let err = Persistence::new()
        .persist(&structures(), &output, &PersistOptions::default())
        .unwrap_err();

    assert!(matches!(err, QcError::Persistence { .. }));
}

#[test]
fn test_plot_path_uses_stem() {
    assert_eq!(
        plot_path(Path::new("/data/run.dqc"), "pdf"),
        PathBuf::from("/data/run.pdf")
    );
}

#[test]
fn test_empty_impedance_table_persists_columns() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("empty.dqc");
    let geometry = SimulatedDeviceInfo::grid(1, 2, 1.0);
    let structures = structures_from(&ImpedanceTable::default(), &geometry).unwrap();

    Persistence::new()
        .persist(&structures, &output, &PersistOptions::default())
        .unwrap();

    let stored: Table = Container::open(&output)
        .unwrap()
        .get("channel_impedances")
        .unwrap();
    assert!(stored.is_empty());
    assert_eq!(stored.column_names().len(), 7);
}
