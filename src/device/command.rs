use super::params::{AutoConfig, ParamConfig};
use crate::frame::FrameData;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Connection state as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UsbState {
    Attached,
    #[default]
    Detached,
    Connected,
    Disconnected,
    Opened,
    Closed,
    Previewing,
    Stopped,
}

/// Events a device produces on its own background context
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Connected,
    Disconnected,
    CameraOpened,
    CameraClosed,
    PreviewStarted,
    PreviewStopped,
    StateChanged(UsbState),
    Frame(FrameData),
}

impl DeviceEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DeviceEvent::Connected => "connected",
            DeviceEvent::Disconnected => "disconnected",
            DeviceEvent::CameraOpened => "camera_opened",
            DeviceEvent::CameraClosed => "camera_closed",
            DeviceEvent::PreviewStarted => "preview_started",
            DeviceEvent::PreviewStopped => "preview_stopped",
            DeviceEvent::StateChanged(_) => "state_changed",
            DeviceEvent::Frame(_) => "frame",
        }
    }
}

/// Receives device events. Implemented by the controller's device link.
pub trait DeviceObserver: Send + Sync {
    fn on_device_event(&self, event: DeviceEvent);
}

/// Command surface of the camera device.
///
/// Parameter calls are forwarded by the controller without interpretation.
/// Implementations report lifecycle changes and frames to the observer passed
/// to [`DeviceCommand::bind`], from whichever thread they run on.
pub trait DeviceCommand: Send + Sync {
    fn bind(&self, observer: Arc<dyn DeviceObserver>);

    fn start_preview(&self);
    fn stop_preview(&self);
    fn close_camera(&self);

    fn is_previewing(&self) -> bool;
    fn current_state(&self) -> UsbState;

    fn update_resolution(&self, width: u32, height: u32);
    fn update_flip(&self);

    /// Latest decoded frame. Must not block.
    fn latest_frame(&self) -> Option<FrameData>;

    fn auto_config(&self, tag: &str) -> Option<AutoConfig>;
    fn param_config(&self, tag: &str) -> Option<ParamConfig>;
    fn is_config_enabled(&self, tag: &str) -> bool;

    fn get_auto(&self, tag: &str) -> bool;
    fn set_auto(&self, tag: &str, value: bool);
    fn reset_auto(&self, tag: &str);

    fn get_param(&self, tag: &str) -> i32;
    fn set_param(&self, tag: &str, value: i32);
    fn reset_param(&self, tag: &str);

    /// Human-readable dump of every parameter, logged when preview starts
    fn describe_configs(&self) -> String {
        String::new()
    }
}
