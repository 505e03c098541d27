use super::{FrameProvider, Recorder, RecorderEvent, RecorderObserver};
use crate::frame::{FrameData, Resolution};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// A command received by [`MockRecorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderCall {
    Setup { path: String, size: Resolution },
    Start,
    Stop,
}

struct Binding {
    observer: Arc<dyn RecorderObserver>,
    frames: Arc<dyn FrameProvider>,
}

/// Recorder stand-in for tests and the simulator.
///
/// In auto mode every command is answered synchronously with success:
/// `setup` → `SetupSucceeded`, `start` → `StartSucceeded`, `stop` →
/// `Completed`. Manual mode answers nothing; drive it with [`MockRecorder::emit`].
pub struct MockRecorder {
    binding: RwLock<Option<Binding>>,
    calls: Mutex<Vec<RecorderCall>>,
    target: Mutex<Option<(String, Resolution)>>,
    recording: AtomicBool,
    auto_ack: bool,
    frames_pulled: AtomicU64,
}

impl MockRecorder {
    /// Recorder that acknowledges every command with success
    pub fn new() -> Self {
        Self::with_auto_ack(true)
    }

    /// Recorder that never answers on its own
    pub fn manual() -> Self {
        Self::with_auto_ack(false)
    }

    fn with_auto_ack(auto_ack: bool) -> Self {
        Self {
            binding: RwLock::new(None),
            calls: Mutex::new(Vec::new()),
            target: Mutex::new(None),
            recording: AtomicBool::new(false),
            auto_ack,
            frames_pulled: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> Vec<RecorderCall> {
        self.calls.lock().clone()
    }

    /// Number of `stop` commands received
    pub fn stop_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RecorderCall::Stop))
            .count()
    }

    pub fn frames_pulled(&self) -> u64 {
        self.frames_pulled.load(Ordering::Relaxed)
    }

    /// Report `event` to the bound observer as if the encoder produced it
    pub fn emit(&self, event: RecorderEvent) {
        match &event {
            RecorderEvent::StartSucceeded => self.recording.store(true, Ordering::SeqCst),
            RecorderEvent::Completed { .. } | RecorderEvent::Failed => {
                self.recording.store(false, Ordering::SeqCst)
            }
            _ => {}
        }

        let observer = self
            .binding
            .read()
            .as_ref()
            .map(|binding| Arc::clone(&binding.observer));
        if let Some(observer) = observer {
            trace!("Mock recorder emitting {:?}", event);
            observer.on_recorder_event(event);
        }
    }

    /// Pull one frame through the bound frame provider
    pub fn pull_frame(&self) -> Option<FrameData> {
        let frames = self
            .binding
            .read()
            .as_ref()
            .map(|binding| Arc::clone(&binding.frames))?;
        let frame = frames.provide_frame();
        if frame.is_some() {
            self.frames_pulled.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }
}

impl Default for MockRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MockRecorder {
    fn bind(&self, observer: Arc<dyn RecorderObserver>, frames: Arc<dyn FrameProvider>) {
        *self.binding.write() = Some(Binding { observer, frames });
    }

    fn setup(&self, path: &str, size: Resolution) {
        debug!("Mock recorder setup: {} at {}", path, size);
        self.calls.lock().push(RecorderCall::Setup {
            path: path.to_string(),
            size,
        });
        *self.target.lock() = Some((path.to_string(), size));
        if self.auto_ack {
            self.emit(RecorderEvent::SetupSucceeded);
        }
    }

    fn start(&self) {
        self.calls.lock().push(RecorderCall::Start);
        if self.auto_ack {
            self.emit(RecorderEvent::StartSucceeded);
        }
    }

    fn stop(&self) {
        self.calls.lock().push(RecorderCall::Stop);
        if !self.auto_ack || !self.recording.load(Ordering::SeqCst) {
            return;
        }
        let path = self.target.lock().as_ref().map(|(path, _)| path.clone());
        match path {
            Some(path) => self.emit(RecorderEvent::Completed { path }),
            None => self.emit(RecorderEvent::Failed),
        }
    }
}
