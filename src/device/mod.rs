mod command;
mod mock;
mod params;

pub use command::{DeviceCommand, DeviceEvent, DeviceObserver, UsbState};
pub use mock::{DeviceCall, MockDevice};
pub use params::{AutoConfig, ParamConfig};
