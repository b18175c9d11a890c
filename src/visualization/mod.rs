pub mod opener;
pub mod plot;

pub use opener::{PlotOpener, SystemOpener};
pub use plot::{CapacitanceSummaryPlot, PlotTheme, SummaryPlotter, DEFAULT_VMAX};
