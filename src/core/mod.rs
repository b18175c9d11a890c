pub mod geometry;
pub mod impedance;
pub mod structures;
pub mod table;

pub use geometry::{DeviceGeometry, ShapeVertex, GEOMETRY_RELATIONS};
pub use impedance::{ImpedanceRow, ImpedanceTable, RawImpedanceRow, IMPEDANCE_COLUMNS};
pub use structures::{device_key, ImpedanceStructures, CHANNEL_IMPEDANCES_KEY};
pub use table::{Cell, Column, Table};
