use crate::action::ActionState;
use crate::device::UsbState;
use crate::error::SessionError;
use crate::frame::FrameData;
use crate::listener::ListenerRegistry;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Device lifecycle, frame and frame-rate notifications
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    UsbConnect,
    UsbDisconnect,
    CameraOpen,
    CameraClose,
    PreviewStart,
    PreviewStop,
    UsbStateUpdate { state: UsbState },
    ActionStateUpdate { state: ActionState },
    LoadFrame(#[serde(serialize_with = "frame_summary")] FrameData),
    LoadFps { instant: u32, average: f32 },
}

/// Photo request outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PhotoEvent {
    Start,
    Success { path: String },
    Fail { reason: SessionError },
    Done,
}

/// Recording outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordEvent {
    StartSuccess,
    StartFail { reason: SessionError },
    Progress { elapsed_secs: u32 },
    Success { path: String },
    Fail { reason: SessionError },
}

/// Every notification the controller re-publishes to listeners
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "listener", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    Control(ControlEvent),
    Photo(PhotoEvent),
    Record(RecordEvent),
}

fn frame_summary<S: Serializer>(frame: &FrameData, serializer: S) -> Result<S::Ok, S::Error> {
    let mut summary = serializer.serialize_struct("Frame", 5)?;
    summary.serialize_field("id", &frame.id)?;
    summary.serialize_field("width", &frame.width)?;
    summary.serialize_field("height", &frame.height)?;
    summary.serialize_field("format", &frame.format)?;
    summary.serialize_field("bytes", &frame.data.len())?;
    summary.end()
}

impl SessionEvent {
    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Control(event) => match event {
                ControlEvent::UsbConnect => "usb_connect",
                ControlEvent::UsbDisconnect => "usb_disconnect",
                ControlEvent::CameraOpen => "camera_open",
                ControlEvent::CameraClose => "camera_close",
                ControlEvent::PreviewStart => "preview_start",
                ControlEvent::PreviewStop => "preview_stop",
                ControlEvent::UsbStateUpdate { .. } => "usb_state_update",
                ControlEvent::ActionStateUpdate { .. } => "action_state_update",
                ControlEvent::LoadFrame(_) => "load_frame",
                ControlEvent::LoadFps { .. } => "load_fps",
            },
            SessionEvent::Photo(event) => match event {
                PhotoEvent::Start => "take_photo_start",
                PhotoEvent::Success { .. } => "take_photo_success",
                PhotoEvent::Fail { .. } => "take_photo_fail",
                PhotoEvent::Done => "take_photo_done",
            },
            SessionEvent::Record(event) => match event {
                RecordEvent::StartSuccess => "record_start_success",
                RecordEvent::StartFail { .. } => "record_start_fail",
                RecordEvent::Progress { .. } => "record_progress",
                RecordEvent::Success { .. } => "record_success",
                RecordEvent::Fail { .. } => "record_fail",
            },
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::Control(ControlEvent::UsbStateUpdate { state }) => {
                format!("USB state {:?}", state)
            }
            SessionEvent::Control(ControlEvent::ActionStateUpdate { state }) => {
                format!("Action state {}", state)
            }
            SessionEvent::Control(ControlEvent::LoadFrame(frame)) => {
                format!("Frame {} ({}, {} bytes)", frame.id, frame.resolution(), frame.data.len())
            }
            SessionEvent::Control(ControlEvent::LoadFps { instant, average }) => {
                format!("{} fps (average {:.1})", instant, average)
            }
            SessionEvent::Photo(PhotoEvent::Success { path }) => format!("Photo saved: {}", path),
            SessionEvent::Photo(PhotoEvent::Fail { reason }) => format!("Photo failed: {}", reason),
            SessionEvent::Record(RecordEvent::StartFail { reason }) => {
                format!("Recording failed to start: {}", reason)
            }
            SessionEvent::Record(RecordEvent::Progress { elapsed_secs }) => {
                format!("Recording for {}s", elapsed_secs)
            }
            SessionEvent::Record(RecordEvent::Success { path }) => {
                format!("Recording saved: {}", path)
            }
            SessionEvent::Record(RecordEvent::Fail { reason }) => {
                format!("Recording failed: {}", reason)
            }
            other => other.event_type().replace('_', " "),
        }
    }

    /// Frames and frame rates may be dropped under backpressure
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            SessionEvent::Control(ControlEvent::LoadFrame(_) | ControlEvent::LoadFps { .. })
        )
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Reject specific event types
    Exclude(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&SessionEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SessionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Exclude(types) => !types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Ordered staging area in front of the bounded event channel.
///
/// Producers push while holding the controller's state lock, so outbox order
/// is transition order. [`EventOutbox::flush`] never blocks: whichever thread
/// wins the flush token moves events into the channel until it is full.
pub(crate) struct EventOutbox {
    queue: Mutex<VecDeque<SessionEvent>>,
    flush_token: Mutex<()>,
    sender: Sender<SessionEvent>,
    lossy_backlog: usize,
    dropped: Arc<AtomicU64>,
}

impl EventOutbox {
    pub(crate) fn push(&self, event: SessionEvent) {
        let mut queue = self.queue.lock();
        if event.is_lossy() && queue.len() >= self.lossy_backlog {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Outbox backlog full, dropping {}", event.event_type());
            return;
        }
        queue.push_back(event);
    }

    pub(crate) fn flush(&self) {
        loop {
            let Some(token) = self.flush_token.try_lock() else {
                return;
            };

            let mut stalled = false;
            loop {
                let Some(event) = self.queue.lock().pop_front() else {
                    break;
                };
                match self.sender.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) if event.is_lossy() => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        trace!("Event queue full, dropping {}", event.event_type());
                    }
                    Err(TrySendError::Full(event)) => {
                        self.queue.lock().push_front(event);
                        stalled = true;
                        break;
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        let discarded = std::mem::take(&mut *self.queue.lock());
                        debug!("Event pump gone, discarding {} events", discarded.len() + 1);
                        return;
                    }
                }
            }
            drop(token);

            // Re-check after releasing the token: another producer or the pump
            // may have tried to flush while it was held.
            if self.queue.lock().is_empty() {
                return;
            }
            if stalled && self.sender.is_full() {
                return;
            }
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Create the outbox/pump pair for one controller
pub(crate) fn channel(
    capacity: usize,
    listeners: Arc<ListenerRegistry>,
) -> (Arc<EventOutbox>, EventPump) {
    let capacity = capacity.max(1);
    let (sender, receiver) = channel::bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let outbox = Arc::new(EventOutbox {
        queue: Mutex::new(VecDeque::new()),
        flush_token: Mutex::new(()),
        sender,
        lossy_backlog: capacity,
        dropped: Arc::clone(&dropped),
    });
    let pump = EventPump {
        receiver,
        listeners,
        outbox: Arc::downgrade(&outbox),
        dropped,
    };
    (outbox, pump)
}

/// Consumer side of the controller's event stream.
///
/// Listener callbacks run on whichever thread calls [`EventPump::run`],
/// [`EventPump::dispatch_pending`] or [`EventPump::dispatch_timeout`].
/// Callbacks may call back into the controller.
pub struct EventPump {
    receiver: Receiver<SessionEvent>,
    listeners: Arc<ListenerRegistry>,
    outbox: Weak<EventOutbox>,
    dropped: Arc<AtomicU64>,
}

impl EventPump {
    fn deliver(&self, event: SessionEvent) {
        trace!("Dispatching {}", event.description());
        self.listeners.deliver(&event);
        if let Some(outbox) = self.outbox.upgrade() {
            outbox.flush();
        }
    }

    /// Deliver every event already queued; returns how many were delivered
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.deliver(event);
            delivered += 1;
        }
        delivered
    }

    /// Wait up to `timeout` for one event and deliver it
    pub fn dispatch_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => {
                self.deliver(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Deliver events until the controller is dropped
    pub fn run(&self) {
        debug!("Event pump running");
        while let Ok(event) = self.receiver.recv() {
            self.deliver(event);
        }
        debug!("Event pump stopped: controller dropped");
    }

    /// Events waiting in the channel and the outbox
    pub fn pending(&self) -> usize {
        let staged = self.outbox.upgrade().map_or(0, |outbox| outbox.pending());
        self.receiver.len() + staged
    }

    /// Frames and frame rates dropped under backpressure so far
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;
    use crate::listener::{ControlListener, PhotoListener};
    use std::time::SystemTime;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl ControlListener for Journal {
        fn on_preview_start(&self) {
            self.entries.lock().push("preview_start".to_string());
        }
        fn on_preview_stop(&self) {
            self.entries.lock().push("preview_stop".to_string());
        }
        fn on_load_frame(&self, frame: &FrameData) {
            self.entries.lock().push(format!("frame:{}", frame.id));
        }
    }

    impl PhotoListener for Journal {
        fn on_take_photo_done(&self) {
            self.entries.lock().push("done".to_string());
        }
    }

    fn frame_event(id: u64) -> SessionEvent {
        let frame = FrameData::new(id, SystemTime::now(), vec![0xFF, 0xD8], 2, 2, FrameFormat::Mjpeg);
        SessionEvent::Control(ControlEvent::LoadFrame(frame))
    }

    fn setup(capacity: usize) -> (Arc<EventOutbox>, EventPump, Arc<Journal>) {
        let registry = Arc::new(ListenerRegistry::new());
        let journal = Arc::new(Journal::default());
        registry.set_control(Some(journal.clone()));
        registry.set_photo(Some(journal.clone()));
        let (outbox, pump) = channel(capacity, registry);
        (outbox, pump, journal)
    }

    #[test]
    fn test_events_delivered_in_push_order() {
        let (outbox, pump, journal) = setup(8);
        outbox.push(SessionEvent::Control(ControlEvent::PreviewStart));
        outbox.push(frame_event(1));
        outbox.push(SessionEvent::Control(ControlEvent::PreviewStop));
        outbox.flush();

        assert_eq!(pump.dispatch_pending(), 3);
        assert_eq!(
            *journal.entries.lock(),
            vec!["preview_start", "frame:1", "preview_stop"]
        );
    }

    #[test]
    fn test_lossy_events_dropped_when_full() {
        let (outbox, pump, journal) = setup(2);
        for id in 0..5 {
            outbox.push(frame_event(id));
            outbox.flush();
        }

        assert_eq!(pump.dispatch_pending(), 2);
        assert_eq!(pump.dropped_count(), 3);
        assert_eq!(*journal.entries.lock(), vec!["frame:0", "frame:1"]);
    }

    #[test]
    fn test_lifecycle_events_survive_backpressure() {
        let (outbox, pump, journal) = setup(1);
        outbox.push(SessionEvent::Control(ControlEvent::PreviewStart));
        outbox.push(SessionEvent::Photo(PhotoEvent::Done));
        outbox.push(SessionEvent::Control(ControlEvent::PreviewStop));
        outbox.flush();

        // Only one fits; the rest wait in the outbox and follow as the pump drains
        assert_eq!(outbox.pending(), 2);
        assert_eq!(pump.pending(), 3);
        assert_eq!(pump.dispatch_pending(), 3);
        assert_eq!(pump.dropped_count(), 0);
        assert_eq!(
            *journal.entries.lock(),
            vec!["preview_start", "done", "preview_stop"]
        );
    }

    #[test]
    fn test_run_returns_when_outbox_dropped() {
        let (outbox, pump, journal) = setup(4);
        outbox.push(SessionEvent::Control(ControlEvent::PreviewStart));
        outbox.flush();
        drop(outbox);

        pump.run();
        assert_eq!(*journal.entries.lock(), vec!["preview_start"]);
        assert!(!pump.dispatch_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_flush_after_pump_dropped_discards() {
        let (outbox, pump, _journal) = setup(4);
        drop(pump);
        outbox.push(SessionEvent::Photo(PhotoEvent::Done));
        outbox.flush();
        assert_eq!(outbox.pending(), 0);
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::Exclude(vec!["load_frame", "load_fps"]);
        assert!(!filter.matches(&frame_event(1)));
        assert!(filter.matches(&SessionEvent::Photo(PhotoEvent::Done)));

        let only = EventFilter::EventTypes(vec!["take_photo_done"]);
        assert!(only.matches(&SessionEvent::Photo(PhotoEvent::Done)));
        assert!(!only.matches(&SessionEvent::Photo(PhotoEvent::Start)));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(SessionEvent::Photo(PhotoEvent::Success {
            path: "/tmp/a.jpg".to_string(),
        }))
        .unwrap();
        assert_eq!(json["listener"], "photo");
        assert_eq!(json["payload"]["event"], "success");
        assert_eq!(json["payload"]["path"], "/tmp/a.jpg");

        let json = serde_json::to_value(frame_event(7)).unwrap();
        assert_eq!(json["payload"]["event"], "load_frame");
    }

    #[test]
    fn test_lossy_classification() {
        assert!(frame_event(1).is_lossy());
        assert!(SessionEvent::Control(ControlEvent::LoadFps {
            instant: 30,
            average: 29.5
        })
        .is_lossy());
        assert!(!SessionEvent::Record(RecordEvent::StartSuccess).is_lossy());
    }
}
