use serde::{Deserialize, Serialize};

use super::table::{Cell, Column, Table};
use crate::error::Result;

/// One vertex of an electrode outline, in millimetres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeVertex {
    pub id: String,
    pub vertex_i: usize,
    pub x: f64,
    pub y: f64,
}

/// Device layout as served by the device-info peer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub shapes: Vec<ShapeVertex>,
    /// (channel, electrode id); one pair per electrode membership
    pub electrodes_by_channel: Vec<(usize, String)>,
    pub electrode_areas: Vec<(String, f64)>,
    /// (electrode id, channel)
    pub channels_by_electrode: Vec<(String, usize)>,
    pub channel_areas: Vec<(usize, f64)>,
}

/// Names of the per-device relations, in persistence order
pub const GEOMETRY_RELATIONS: [&str; 4] = [
    "electrodes_by_channel",
    "electrode_areas",
    "channels_by_electrode",
    "channel_areas",
];

fn series<I, V>(index_name: &str, value_name: &str, pairs: &[(I, V)]) -> Result<Table>
where
    I: Clone + Into<Cell>,
    V: Clone + Into<Cell>,
{
    Table::from_columns(
        Some(index_name.to_string()),
        pairs.iter().map(|(i, _)| i.clone().into()).collect(),
        vec![Column {
            name: value_name.to_string(),
            values: pairs.iter().map(|(_, v)| v.clone().into()).collect(),
        }],
    )
}

impl DeviceGeometry {
    /// Shape outlines as a table, one row per vertex
    pub fn shapes_table(&self) -> Result<Table> {
        Table::from_columns(
            None,
            (0..self.shapes.len()).map(Cell::from).collect(),
            vec![
                Column {
                    name: "id".into(),
                    values: self.shapes.iter().map(|s| Cell::from(s.id.as_str())).collect(),
                },
                Column {
                    name: "vertex_i".into(),
                    values: self.shapes.iter().map(|s| Cell::from(s.vertex_i)).collect(),
                },
                Column {
                    name: "x".into(),
                    values: self.shapes.iter().map(|s| Cell::from(s.x)).collect(),
                },
                Column {
                    name: "y".into(),
                    values: self.shapes.iter().map(|s| Cell::from(s.y)).collect(),
                },
            ],
        )
    }

    /// Relation table by name (see [`GEOMETRY_RELATIONS`]), in the order served
    pub fn relation(&self, name: &str) -> Result<Option<Table>> {
        let table = match name {
            "electrodes_by_channel" => {
                series("channel", "electrode_id", &self.electrodes_by_channel)?
            }
            "electrode_areas" => series("electrode_id", "area", &self.electrode_areas)?,
            "channels_by_electrode" => {
                series("electrode_id", "channel", &self.channels_by_electrode)?
            }
            "channel_areas" => series("channel", "area", &self.channel_areas)?,
            _ => return Ok(None),
        };
        Ok(Some(table))
    }

    /// Every channel that owns at least one electrode, ascending
    pub fn channels(&self) -> Vec<usize> {
        let mut channels: Vec<usize> = self.channel_areas.iter().map(|(c, _)| *c).collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}
