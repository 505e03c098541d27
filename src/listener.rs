use crate::action::ActionState;
use crate::device::UsbState;
use crate::error::SessionError;
use crate::events::{ControlEvent, PhotoEvent, RecordEvent, SessionEvent};
use crate::frame::FrameData;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

/// Device lifecycle, frames and frame rate.
///
/// All methods run on the thread driving the [`EventPump`](crate::EventPump).
#[allow(unused_variables)]
pub trait ControlListener: Send + Sync {
    fn on_usb_connect(&self) {}
    fn on_usb_disconnect(&self) {}
    fn on_camera_open(&self) {}
    fn on_camera_close(&self) {}
    fn on_preview_start(&self) {}
    fn on_preview_stop(&self) {}
    fn on_usb_state_update(&self, state: UsbState) {}
    fn on_action_state_update(&self, state: ActionState) {}
    fn on_load_frame(&self, frame: &FrameData) {}
    fn on_load_fps(&self, instant: u32, average: f32) {}
}

/// Outcome of photo requests. `on_take_photo_done` follows every success or
/// failure exactly once.
#[allow(unused_variables)]
pub trait PhotoListener: Send + Sync {
    fn on_take_photo_start(&self) {}
    fn on_take_photo_success(&self, path: &str) {}
    fn on_take_photo_fail(&self, reason: SessionError) {}
    fn on_take_photo_done(&self) {}
}

/// Outcome of recording requests
#[allow(unused_variables)]
pub trait RecordListener: Send + Sync {
    fn on_record_start_success(&self) {}
    fn on_record_start_fail(&self, reason: SessionError) {}
    fn on_record_progress(&self, elapsed_secs: u32) {}
    fn on_record_success(&self, path: &str) {}
    fn on_record_fail(&self, reason: SessionError) {}
}

/// One optional subscriber per listener contract; the last registration wins
#[derive(Default)]
pub struct ListenerRegistry {
    control: RwLock<Option<Arc<dyn ControlListener>>>,
    photo: RwLock<Option<Arc<dyn PhotoListener>>>,
    record: RwLock<Option<Arc<dyn RecordListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_control(&self, listener: Option<Arc<dyn ControlListener>>) {
        *self.control.write() = listener;
    }

    pub fn set_photo(&self, listener: Option<Arc<dyn PhotoListener>>) {
        *self.photo.write() = listener;
    }

    pub fn set_record(&self, listener: Option<Arc<dyn RecordListener>>) {
        *self.record.write() = listener;
    }

    /// Invoke the matching callback. Events without a subscriber are dropped.
    pub fn deliver(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Control(event) => {
                let listener = self.control.read().clone();
                match listener {
                    Some(listener) => deliver_control(listener.as_ref(), event),
                    None => trace!("No control listener for {:?}", event),
                }
            }
            SessionEvent::Photo(event) => {
                let listener = self.photo.read().clone();
                match listener {
                    Some(listener) => deliver_photo(listener.as_ref(), event),
                    None => trace!("No photo listener for {:?}", event),
                }
            }
            SessionEvent::Record(event) => {
                let listener = self.record.read().clone();
                match listener {
                    Some(listener) => deliver_record(listener.as_ref(), event),
                    None => trace!("No record listener for {:?}", event),
                }
            }
        }
    }
}

fn deliver_control(listener: &dyn ControlListener, event: &ControlEvent) {
    match event {
        ControlEvent::UsbConnect => listener.on_usb_connect(),
        ControlEvent::UsbDisconnect => listener.on_usb_disconnect(),
        ControlEvent::CameraOpen => listener.on_camera_open(),
        ControlEvent::CameraClose => listener.on_camera_close(),
        ControlEvent::PreviewStart => listener.on_preview_start(),
        ControlEvent::PreviewStop => listener.on_preview_stop(),
        ControlEvent::UsbStateUpdate { state } => listener.on_usb_state_update(*state),
        ControlEvent::ActionStateUpdate { state } => listener.on_action_state_update(*state),
        ControlEvent::LoadFrame(frame) => listener.on_load_frame(frame),
        ControlEvent::LoadFps { instant, average } => listener.on_load_fps(*instant, *average),
    }
}

fn deliver_photo(listener: &dyn PhotoListener, event: &PhotoEvent) {
    match event {
        PhotoEvent::Start => listener.on_take_photo_start(),
        PhotoEvent::Success { path } => listener.on_take_photo_success(path),
        PhotoEvent::Fail { reason } => listener.on_take_photo_fail(*reason),
        PhotoEvent::Done => listener.on_take_photo_done(),
    }
}

fn deliver_record(listener: &dyn RecordListener, event: &RecordEvent) {
    match event {
        RecordEvent::StartSuccess => listener.on_record_start_success(),
        RecordEvent::StartFail { reason } => listener.on_record_start_fail(*reason),
        RecordEvent::Progress { elapsed_secs } => listener.on_record_progress(*elapsed_secs),
        RecordEvent::Success { path } => listener.on_record_success(path),
        RecordEvent::Fail { reason } => listener.on_record_fail(*reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl PhotoListener for Journal {
        fn on_take_photo_success(&self, path: &str) {
            self.entries.lock().push(format!("success:{}", path));
        }
        fn on_take_photo_done(&self) {
            self.entries.lock().push("done".to_string());
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(Journal::default());
        let second = Arc::new(Journal::default());

        registry.set_photo(Some(first.clone()));
        registry.set_photo(Some(second.clone()));
        registry.deliver(&SessionEvent::Photo(PhotoEvent::Done));

        assert!(first.entries.lock().is_empty());
        assert_eq!(*second.entries.lock(), vec!["done".to_string()]);
    }

    #[test]
    fn test_unregistered_contract_drops_silently() {
        let registry = ListenerRegistry::new();
        let journal = Arc::new(Journal::default());
        registry.set_photo(Some(journal.clone()));

        // No control or record listener: nothing happens
        registry.deliver(&SessionEvent::Control(ControlEvent::PreviewStart));
        registry.deliver(&SessionEvent::Record(RecordEvent::StartSuccess));

        registry.deliver(&SessionEvent::Photo(PhotoEvent::Success {
            path: "/tmp/a.jpg".to_string(),
        }));
        registry.set_photo(None);
        registry.deliver(&SessionEvent::Photo(PhotoEvent::Done));

        assert_eq!(*journal.entries.lock(), vec!["success:/tmp/a.jpg".to_string()]);
    }
}
