use plotters::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use svg2pdf::usvg;
use svg2pdf::{ConversionOptions, PageOptions};

use crate::core::{device_key, Cell, ImpedanceStructures};
use crate::error::{QcError, Result};

/// Colour-scale ceiling, farads
pub const DEFAULT_VMAX: f64 = 200e-15;

/// Renders a capacitance summary of a scan to a file
pub trait SummaryPlotter: Send + Sync {
    /// File extension of the rendered output, without the dot
    fn extension(&self) -> &str;

    fn render(&self, structures: &ImpedanceStructures, title: &str, output: &Path) -> Result<()>;
}

/// Fixed look of the summary figure
#[derive(Debug, Clone)]
pub struct PlotTheme {
    pub size: (u32, u32),
    pub background: RGBColor,
    pub panel: RGBColor,
    pub unmeasured: RGBColor,
    pub outline: RGBColor,
    pub font: &'static str,
    pub title_size: f64,
    pub caption_size: f64,
}

impl Default for PlotTheme {
    fn default() -> Self {
        Self {
            size: (1100, 500),
            background: WHITE,
            panel: RGBColor(235, 235, 235),
            unmeasured: RGBColor(190, 190, 190),
            outline: RGBColor(80, 80, 80),
            font: "sans-serif",
            title_size: 22.0,
            caption_size: 15.0,
        }
    }
}

// Matplotlib "Reds", light to dark.
const REDS: [(u8, u8, u8); 9] = [
    (255, 245, 240),
    (254, 224, 210),
    (252, 187, 161),
    (252, 146, 114),
    (251, 106, 74),
    (239, 59, 44),
    (203, 24, 29),
    (165, 15, 21),
    (103, 0, 13),
];

/// Reversed red colour map: low capacitance dark, `vmax` and above light
pub fn reds_r(value: f64, vmax: f64) -> RGBColor {
    let t = (value / vmax).clamp(0.0, 1.0);
    let pos = (1.0 - t) * (REDS.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(REDS.len() - 1);
    let frac = pos - lo as f64;
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    RGBColor(
        mix(REDS[lo].0, REDS[hi].0),
        mix(REDS[lo].1, REDS[hi].1),
        mix(REDS[lo].2, REDS[hi].2),
    )
}

/// Format farads with an SI prefix, e.g. `120fF`
pub fn si_farads(value: f64) -> String {
    const PREFIXES: [(f64, &str); 6] = [
        (1e-15, "f"),
        (1e-12, "p"),
        (1e-9, "n"),
        (1e-6, "\u{b5}"),
        (1e-3, "m"),
        (1.0, ""),
    ];
    let magnitude = value.abs();
    let (scale, prefix) = PREFIXES
        .iter()
        .rev()
        .find(|(scale, _)| magnitude >= *scale)
        .copied()
        .unwrap_or(PREFIXES[0]);
    format!("{:.0}{}F", value / scale, prefix)
}

fn plot_err<E: std::fmt::Display>(e: E) -> QcError {
    QcError::Plot(e.to_string())
}

/// Convert an SVG document to a single-page PDF, text set in system fonts
pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options).map_err(plot_err)?;
    svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
        .map_err(|e| QcError::Plot(format!("PDF conversion failed: {:?}", e)))
}

/// Electrode outlines keyed by id, vertices in `vertex_i` order
fn electrode_outlines(structures: &ImpedanceStructures) -> BTreeMap<String, Vec<(f64, f64)>> {
    let mut vertices: BTreeMap<String, Vec<(i64, f64, f64)>> = BTreeMap::new();
    if let Some(shapes) = structures.get(&device_key("shapes")) {
        let columns = (
            shapes.column("id"),
            shapes.column("vertex_i"),
            shapes.column("x"),
            shapes.column("y"),
        );
        if let (Some(ids), Some(order), Some(xs), Some(ys)) = columns {
            for i in 0..shapes.len() {
                if let (Some(id), Some(k), Some(x), Some(y)) = (
                    ids[i].as_str(),
                    order[i].as_i64(),
                    xs[i].as_f64(),
                    ys[i].as_f64(),
                ) {
                    vertices.entry(id.to_string()).or_default().push((k, x, y));
                }
            }
        }
    }

    vertices
        .into_iter()
        .map(|(id, mut points)| {
            points.sort_by_key(|(k, _, _)| *k);
            (id, points.into_iter().map(|(_, x, y)| (x, y)).collect())
        })
        .collect()
}

/// Electrode id -> owning channel
fn electrode_channels(structures: &ImpedanceStructures) -> HashMap<String, usize> {
    let mut owners = HashMap::new();
    if let Some(table) = structures.get(&device_key("electrodes_by_channel")) {
        if let Some(electrodes) = table.column("electrode_id") {
            for (channel, electrode) in table.index().iter().zip(electrodes) {
                if let (Cell::Int(channel), Cell::Text(electrode)) = (channel, electrode) {
                    owners.insert(electrode.clone(), *channel as usize);
                }
            }
        }
    }
    owners
}

/// Heat map of electrode capacitance beside a per-channel bar chart
pub struct CapacitanceSummaryPlot {
    pub theme: PlotTheme,
    pub vmax: f64,
}

impl Default for CapacitanceSummaryPlot {
    fn default() -> Self {
        Self {
            theme: PlotTheme::default(),
            vmax: DEFAULT_VMAX,
        }
    }
}

impl CapacitanceSummaryPlot {
    /// Draw the figure as an SVG document
    pub fn render_svg(&self, structures: &ImpedanceStructures, title: &str) -> Result<String> {
        let theme = &self.theme;
        let medians = structures.impedance_table()?.median_capacitance();
        let by_channel: HashMap<usize, f64> = medians.iter().copied().collect();
        let outlines = electrode_outlines(structures);
        let owners = electrode_channels(structures);

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, theme.size).into_drawing_area();
            root.fill(&theme.background).map_err(plot_err)?;
            let root = root
                .titled(title, (theme.font, theme.title_size))
                .map_err(plot_err)?;
            let (left, right) = root.split_horizontally(theme.size.0 / 2);

            // Electrode heat map, millimetres
            let points = outlines.values().flatten();
            let (mut x0, mut x1, mut y0, mut y1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
            for &(x, y) in points {
                x0 = x0.min(x);
                x1 = x1.max(x);
                y0 = y0.min(y);
                y1 = y1.max(y);
            }
            if x0 >= x1 || y0 >= y1 {
                (x0, x1, y0, y1) = (0.0, 1.0, 0.0, 1.0);
            }

            let mut map = ChartBuilder::on(&left)
                .caption("Electrode capacitance", (theme.font, theme.caption_size))
                .margin(10)
                .x_label_area_size(35)
                .y_label_area_size(45)
                .build_cartesian_2d(x0..x1, y0..y1)
                .map_err(plot_err)?;
            map.plotting_area().fill(&theme.panel).map_err(plot_err)?;
            map.configure_mesh()
                .x_desc("x (mm)")
                .y_desc("y (mm)")
                .draw()
                .map_err(plot_err)?;

            map.draw_series(outlines.iter().map(|(id, points)| {
                let color = owners
                    .get(id)
                    .and_then(|channel| by_channel.get(channel))
                    .map(|&c| reds_r(c, self.vmax))
                    .unwrap_or(theme.unmeasured);
                Polygon::new(points.clone(), color.filled())
            }))
            .map_err(plot_err)?;
            map.draw_series(outlines.values().map(|points| {
                let mut closed = points.clone();
                if let Some(&first) = points.first() {
                    closed.push(first);
                }
                PathElement::new(closed, theme.outline.stroke_width(1))
            }))
            .map_err(plot_err)?;

            // Median capacitance per channel, femtofarads
            let n = medians.len().max(1);
            let y_max = medians
                .iter()
                .map(|&(_, c)| c)
                .fold(self.vmax, f64::max)
                * 1e15;
            let labels: Vec<usize> = medians.iter().map(|&(channel, _)| channel).collect();
            let label_for = |x: &f64| {
                let i = x.round();
                if i >= 0.0 && (i as usize) < labels.len() && (x - i).abs() < 1e-6 {
                    labels[i as usize].to_string()
                } else {
                    String::new()
                }
            };

            let mut bars = ChartBuilder::on(&right)
                .caption("Channel capacitance (median)", (theme.font, theme.caption_size))
                .margin(10)
                .x_label_area_size(35)
                .y_label_area_size(55)
                .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..y_max)
                .map_err(plot_err)?;
            bars.plotting_area().fill(&theme.panel).map_err(plot_err)?;
            bars.configure_mesh()
                .disable_x_mesh()
                .x_labels(n.min(24))
                .x_label_formatter(&label_for)
                .y_label_formatter(&|v: &f64| si_farads(v * 1e-15))
                .x_desc("channel")
                .draw()
                .map_err(plot_err)?;
            bars.draw_series(medians.iter().enumerate().map(|(i, &(_, c))| {
                let x = i as f64;
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, c * 1e15)], reds_r(c, self.vmax).filled())
            }))
            .map_err(plot_err)?;

            root.present().map_err(plot_err)?;
        }
        Ok(svg)
    }
}

impl SummaryPlotter for CapacitanceSummaryPlot {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn render(&self, structures: &ImpedanceStructures, title: &str, output: &Path) -> Result<()> {
        let pdf = svg_to_pdf(&self.render_svg(structures, title)?)?;
        fs::write(output, pdf)
            .map_err(|e| QcError::persistence(format!("Failed to write {:?}", output), e))
    }
}
