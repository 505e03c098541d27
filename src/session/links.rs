use super::controller::Inner;
use crate::device::{DeviceEvent, DeviceObserver};
use crate::frame::FrameData;
use crate::photo::{PhotoSaverEvent, PhotoSaverObserver};
use crate::recorder::{FrameProvider, RecorderEvent, RecorderObserver};
use std::sync::Weak;
use tracing::trace;

/// Routes device events into the controller
pub(super) struct DeviceLink {
    pub(super) inner: Weak<Inner>,
}

impl DeviceObserver for DeviceLink {
    fn on_device_event(&self, event: DeviceEvent) {
        match self.inner.upgrade() {
            Some(inner) => inner.on_device_event(event),
            None => trace!("Session gone, dropping device event {}", event.event_type()),
        }
    }
}

/// Routes photo saver outcomes into the controller
pub(super) struct PhotoLink {
    pub(super) inner: Weak<Inner>,
}

impl PhotoSaverObserver for PhotoLink {
    fn on_photo_saver_event(&self, event: PhotoSaverEvent) {
        match self.inner.upgrade() {
            Some(inner) => inner.on_photo_saver_event(event),
            None => trace!("Session gone, dropping photo saver event {:?}", event),
        }
    }
}

/// Routes recorder outcomes into the controller
pub(super) struct RecorderLink {
    pub(super) inner: Weak<Inner>,
}

impl RecorderObserver for RecorderLink {
    fn on_recorder_event(&self, event: RecorderEvent) {
        match self.inner.upgrade() {
            Some(inner) => inner.on_recorder_event(event),
            None => trace!("Session gone, dropping recorder event {:?}", event),
        }
    }
}

/// Hands the latest device frame to the recorder
pub(super) struct FrameSource {
    pub(super) inner: Weak<Inner>,
}

impl FrameProvider for FrameSource {
    fn provide_frame(&self) -> Option<FrameData> {
        self.inner.upgrade()?.latest_frame()
    }
}
