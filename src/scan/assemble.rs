use log::info;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    device_key, DeviceGeometry, ImpedanceStructures, ImpedanceTable, CHANNEL_IMPEDANCES_KEY,
    GEOMETRY_RELATIONS,
};
use crate::error::{QcError, Result};
use crate::hal::DeviceInfo;

/// Bundle a sweep result with the device geometry it was measured on
pub async fn assemble(
    device_info: &dyn DeviceInfo,
    impedance_table: &ImpedanceTable,
    timeout: Duration,
) -> Result<ImpedanceStructures> {
    let device = device_info.get_device(timeout).await?;
    structures_from(impedance_table, &device)
}

/// Keys: `channel_impedances`, `device/shapes` and one `device/<relation>`
/// per geometry relation, each relation sorted by its index.
pub fn structures_from(
    impedance_table: &ImpedanceTable,
    device: &DeviceGeometry,
) -> Result<ImpedanceStructures> {
    let mut structures = ImpedanceStructures::new();
    structures.insert(CHANNEL_IMPEDANCES_KEY, impedance_table.to_table());
    structures.insert(device_key("shapes"), device.shapes_table()?);

    for name in GEOMETRY_RELATIONS {
        let relation = device
            .relation(name)?
            .ok_or_else(|| QcError::Schema(format!("unknown geometry relation '{}'", name)))?;
        structures.insert(device_key(name), relation.sort_by_index());
    }

    info!(
        "Assembled {} impedance rows with {} geometry tables",
        impedance_table.len(),
        structures.len() - 1
    );
    Ok(structures)
}

/// Assembly step bound to a device-info peer
pub struct ResultAssembly {
    device_info: Arc<dyn DeviceInfo>,
    timeout: Duration,
}

impl ResultAssembly {
    pub fn new(device_info: Arc<dyn DeviceInfo>, timeout: Duration) -> Self {
        Self {
            device_info,
            timeout,
        }
    }

    pub async fn run(&self, impedance_table: &ImpedanceTable) -> Result<ImpedanceStructures> {
        assemble(self.device_info.as_ref(), impedance_table, self.timeout).await
    }
}
