pub mod bus;
pub mod mock;
pub mod proxy;
pub mod traits;
pub mod types;

pub use bus::{CallOptions, CommandHandler, Hub, RemoteClient, RemoteError, WaitFn};
pub use proxy::{ControlBoardProxy, DeviceInfoProxy, CONTROL_BOARD_PEER, DEVICE_INFO_PEER};
pub use traits::{ControlBoard, DeviceInfo};
pub use types::{ChannelStates, MeasurementRequest};
