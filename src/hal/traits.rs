use async_trait::async_trait;
use std::time::Duration;

use super::types::MeasurementRequest;
use crate::core::{DeviceGeometry, RawImpedanceRow};
use crate::error::Result;

/// Control-board peer: channel inventory and impedance measurements
#[async_trait]
pub trait ControlBoard: Send + Sync {
    /// Number of channels on the connected board (never cached)
    async fn channel_count(&self, timeout: Duration) -> Result<usize>;

    /// One batched measurement over every active channel
    async fn sweep_channels(
        &self,
        request: &MeasurementRequest,
        timeout: Duration,
    ) -> Result<Vec<RawImpedanceRow>>;

    /// Measurement of a single-channel activation vector
    async fn measure_impedance(
        &self,
        request: &MeasurementRequest,
        timeout: Duration,
    ) -> Result<Vec<RawImpedanceRow>>;
}

/// Device-info peer: geometry of the loaded device
#[async_trait]
pub trait DeviceInfo: Send + Sync {
    async fn get_device(&self, timeout: Duration) -> Result<DeviceGeometry>;
}
