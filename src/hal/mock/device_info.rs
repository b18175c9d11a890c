use crate::core::{DeviceGeometry, ShapeVertex};
use crate::hal::bus::CommandHandler;
use crate::hal::proxy::DEVICE_INFO_PEER;
use async_trait::async_trait;
use serde_json::Value;

/// Stand-in for the device-info peer serving a fixed geometry
pub struct SimulatedDeviceInfo {
    name: String,
    geometry: DeviceGeometry,
}

impl SimulatedDeviceInfo {
    pub fn new(geometry: DeviceGeometry) -> Self {
        Self {
            name: DEVICE_INFO_PEER.to_string(),
            geometry,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn geometry(&self) -> &DeviceGeometry {
        &self.geometry
    }

    /// Rectangular grid of square electrodes, one channel per electrode.
    ///
    /// Relations are served in descending order, the way a device file
    /// edited by hand tends to list them.
    pub fn grid(rows: usize, cols: usize, pitch_mm: f64) -> DeviceGeometry {
        let mut geometry = DeviceGeometry::default();
        let area = pitch_mm * pitch_mm * 1e-6;

        for channel in (0..rows * cols).rev() {
            let id = format!("electrode{:03}", channel);
            let (x0, y0) = (
                (channel % cols) as f64 * pitch_mm,
                (channel / cols) as f64 * pitch_mm,
            );
            let corners = [(x0, y0), (x0 + pitch_mm, y0), (x0 + pitch_mm, y0 + pitch_mm), (x0, y0 + pitch_mm)];
            for (vertex_i, (x, y)) in corners.into_iter().enumerate() {
                geometry.shapes.push(ShapeVertex {
                    id: id.clone(),
                    vertex_i,
                    x,
                    y,
                });
            }

            geometry.electrodes_by_channel.push((channel, id.clone()));
            geometry.electrode_areas.push((id.clone(), area));
            geometry.channels_by_electrode.push((id, channel));
            geometry.channel_areas.push((channel, area));
        }

        geometry
    }
}

#[async_trait]
impl CommandHandler for SimulatedDeviceInfo {
    fn peer_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, command: &str, _args: Value) -> Result<Value, String> {
        match command {
            "get_device" => serde_json::to_value(&self.geometry).map_err(|e| e.to_string()),
            _ => Err(format!("unknown command '{}'", command)),
        }
    }
}
