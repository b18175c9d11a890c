use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::core::ImpedanceStructures;
use crate::error::Result;
use crate::store::{canonical_path, join_path, normalize_root, Container};
use crate::visualization::{CapacitanceSummaryPlot, PlotOpener, SummaryPlotter, SystemOpener};

#[derive(Debug, Clone, PartialEq)]
pub struct PersistOptions {
    /// Prefix joined in front of every key; trailing `/` is ignored
    pub hdf_root: String,
    pub save_plot: bool,
    /// Only honoured together with `save_plot`
    pub open_plot: bool,
    pub compression_level: u32,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            hdf_root: String::new(),
            save_plot: false,
            open_plot: false,
            compression_level: 5,
        }
    }
}

impl PersistOptions {
    pub fn with_root(mut self, hdf_root: impl Into<String>) -> Self {
        self.hdf_root = hdf_root.into();
        self
    }

    pub fn with_plot(mut self, save_plot: bool, open_plot: bool) -> Self {
        self.save_plot = save_plot;
        self.open_plot = open_plot;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistReport {
    /// Container keys written, in write order
    pub written: Vec<String>,
    pub plot_path: Option<PathBuf>,
}

/// Sibling of `output_path` sharing its stem, with extension `extension`
pub fn plot_path(output_path: &Path, extension: &str) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_path.with_file_name(format!("{}.{}", stem, extension))
}

/// Writes scan results to a container and renders the optional summary
pub struct Persistence {
    plotter: Box<dyn SummaryPlotter>,
    opener: Box<dyn PlotOpener>,
}

impl Default for Persistence {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence {
    pub fn new() -> Self {
        Self {
            plotter: Box::new(CapacitanceSummaryPlot::default()),
            opener: Box::new(SystemOpener),
        }
    }

    pub fn with_plotter(mut self, plotter: impl SummaryPlotter + 'static) -> Self {
        self.plotter = Box::new(plotter);
        self
    }

    pub fn with_opener(mut self, opener: impl PlotOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn persist(
        &self,
        structures: &ImpedanceStructures,
        output_path: &Path,
        options: &PersistOptions,
    ) -> Result<PersistReport> {
        let root = normalize_root(&options.hdf_root);
        let mut container = Container::open(output_path)?;
        let mut report = PersistReport::default();

        for (key, table) in structures.iter() {
            let path = canonical_path(&join_path(root, key))?;
            debug!("{} -> {} ({} rows)", key, path, table.len());
            container.put(&path, table, options.compression_level)?;
            report.written.push(path);
        }
        container.save(output_path)?;
        info!(
            "Saved {} tables to {:?}",
            report.written.len(),
            output_path
        );

        if options.save_plot {
            let summary_path = plot_path(output_path, self.plotter.extension());
            let title = output_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.plotter.render(structures, &title, &summary_path)?;
            info!("Saved capacitance summary to {:?}", summary_path);

            if options.open_plot {
                self.opener.open(&summary_path)?;
            }
            report.plot_path = Some(summary_path);
        }

        Ok(report)
    }
}
