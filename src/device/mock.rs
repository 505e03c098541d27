use super::command::{DeviceCommand, DeviceEvent, DeviceObserver, UsbState};
use super::params::{AutoConfig, ParamConfig};
use crate::frame::{FrameData, FrameFormat};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace};

/// A command received by [`MockDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    StartPreview,
    StopPreview,
    CloseCamera,
    UpdateResolution(u32, u32),
    UpdateFlip,
    SetAuto(String, bool),
    ResetAuto(String),
    SetParam(String, i32),
    ResetParam(String),
}

/// In-memory device for tests and the simulator.
///
/// Lifecycle helpers emit events synchronously on the calling thread.
pub struct MockDevice {
    observer: RwLock<Option<Arc<dyn DeviceObserver>>>,
    state: Mutex<UsbState>,
    previewing: AtomicBool,
    latest: Mutex<Option<FrameData>>,
    params: Mutex<HashMap<String, (ParamConfig, i32)>>,
    autos: Mutex<HashMap<String, (AutoConfig, bool)>>,
    calls: Mutex<Vec<DeviceCall>>,
    frame_counter: AtomicU64,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            observer: RwLock::new(None),
            state: Mutex::new(UsbState::Detached),
            previewing: AtomicBool::new(false),
            latest: Mutex::new(None),
            params: Mutex::new(HashMap::new()),
            autos: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            frame_counter: AtomicU64::new(0),
        }
    }

    /// Declare a numeric parameter, initialised to its default
    pub fn with_param(self, config: ParamConfig) -> Self {
        let value = config.default;
        self.params.lock().insert(config.tag.clone(), (config, value));
        self
    }

    /// Declare an auto-mode toggle, initialised to its default
    pub fn with_auto(self, config: AutoConfig) -> Self {
        let value = config.default;
        self.autos.lock().insert(config.tag.clone(), (config, value));
        self
    }

    /// Commands received so far, oldest first
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: DeviceCall) {
        trace!("Mock device call: {:?}", call);
        self.calls.lock().push(call);
    }

    fn emit(&self, event: DeviceEvent) {
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer.on_device_event(event);
        }
    }

    fn set_state(&self, state: UsbState) {
        *self.state.lock() = state;
        self.emit(DeviceEvent::StateChanged(state));
    }

    /// Simulate the USB device being plugged in and the camera opened
    pub fn attach(&self) {
        debug!("Mock device attached");
        self.set_state(UsbState::Connected);
        self.emit(DeviceEvent::Connected);
        self.set_state(UsbState::Opened);
        self.emit(DeviceEvent::CameraOpened);
    }

    /// Simulate the USB device being unplugged
    pub fn detach(&self) {
        debug!("Mock device detached");
        self.previewing.store(false, Ordering::SeqCst);
        *self.latest.lock() = None;
        self.set_state(UsbState::Disconnected);
        self.emit(DeviceEvent::Disconnected);
    }

    /// Store `frame` as the latest one and deliver it
    pub fn push_frame(&self, frame: FrameData) {
        *self.latest.lock() = Some(frame.clone());
        self.emit(DeviceEvent::Frame(frame));
    }

    /// Deliver a synthetic RGB24 gradient frame
    pub fn push_rgb_frame(&self, width: u32, height: u32) -> FrameData {
        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push((id % 256) as u8);
            }
        }
        let frame = FrameData::new(id, SystemTime::now(), data, width, height, FrameFormat::Rgb24);
        self.push_frame(frame.clone());
        frame
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCommand for MockDevice {
    fn bind(&self, observer: Arc<dyn DeviceObserver>) {
        *self.observer.write() = Some(observer);
    }

    fn start_preview(&self) {
        self.record(DeviceCall::StartPreview);
        if self.previewing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_state(UsbState::Previewing);
        self.emit(DeviceEvent::PreviewStarted);
    }

    fn stop_preview(&self) {
        self.record(DeviceCall::StopPreview);
        if !self.previewing.swap(false, Ordering::SeqCst) {
            return;
        }
        self.set_state(UsbState::Stopped);
        self.emit(DeviceEvent::PreviewStopped);
    }

    fn close_camera(&self) {
        self.record(DeviceCall::CloseCamera);
        self.previewing.store(false, Ordering::SeqCst);
        self.set_state(UsbState::Closed);
        self.emit(DeviceEvent::CameraClosed);
    }

    fn is_previewing(&self) -> bool {
        self.previewing.load(Ordering::SeqCst)
    }

    fn current_state(&self) -> UsbState {
        *self.state.lock()
    }

    fn update_resolution(&self, width: u32, height: u32) {
        self.record(DeviceCall::UpdateResolution(width, height));
    }

    fn update_flip(&self) {
        self.record(DeviceCall::UpdateFlip);
    }

    fn latest_frame(&self) -> Option<FrameData> {
        self.latest.try_lock().and_then(|frame| frame.clone())
    }

    fn auto_config(&self, tag: &str) -> Option<AutoConfig> {
        self.autos.lock().get(tag).map(|(config, _)| config.clone())
    }

    fn param_config(&self, tag: &str) -> Option<ParamConfig> {
        self.params.lock().get(tag).map(|(config, _)| config.clone())
    }

    fn is_config_enabled(&self, tag: &str) -> bool {
        self.params.lock().contains_key(tag) || self.autos.lock().contains_key(tag)
    }

    fn get_auto(&self, tag: &str) -> bool {
        self.autos.lock().get(tag).map(|(_, v)| *v).unwrap_or(false)
    }

    fn set_auto(&self, tag: &str, value: bool) {
        self.record(DeviceCall::SetAuto(tag.to_string(), value));
        if let Some(entry) = self.autos.lock().get_mut(tag) {
            entry.1 = value;
        }
    }

    fn reset_auto(&self, tag: &str) {
        self.record(DeviceCall::ResetAuto(tag.to_string()));
        if let Some(entry) = self.autos.lock().get_mut(tag) {
            entry.1 = entry.0.default;
        }
    }

    fn get_param(&self, tag: &str) -> i32 {
        self.params.lock().get(tag).map(|(_, v)| *v).unwrap_or(0)
    }

    fn set_param(&self, tag: &str, value: i32) {
        self.record(DeviceCall::SetParam(tag.to_string(), value));
        if let Some(entry) = self.params.lock().get_mut(tag) {
            entry.1 = value.clamp(entry.0.min, entry.0.max);
        }
    }

    fn reset_param(&self, tag: &str) {
        self.record(DeviceCall::ResetParam(tag.to_string()));
        if let Some(entry) = self.params.lock().get_mut(tag) {
            entry.1 = entry.0.default;
        }
    }

    fn describe_configs(&self) -> String {
        let params = self.params.lock();
        let mut tags: Vec<_> = params
            .iter()
            .map(|(tag, (config, value))| {
                format!("{}={} [{}..{}]", tag, value, config.min, config.max)
            })
            .collect();
        tags.sort();
        tags.join(", ")
    }
}
