pub mod control_board;
pub mod device_info;

pub use control_board::SimulatedControlBoard;
pub use device_info::SimulatedDeviceInfo;
