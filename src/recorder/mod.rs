mod mock;

pub use mock::{MockRecorder, RecorderCall};

use crate::frame::{FrameData, Resolution};
use std::sync::Arc;

/// Asynchronous outcomes reported by a recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    SetupSucceeded,
    SetupFailed,
    StartSucceeded,
    StartFailed,
    Progress { elapsed_secs: u32 },
    Completed { path: String },
    Failed,
}

/// Receives recorder outcomes. Implemented by the controller's recorder link.
pub trait RecorderObserver: Send + Sync {
    fn on_recorder_event(&self, event: RecorderEvent);
}

/// Pull hook the recorder uses to fetch frames while encoding.
///
/// Never blocks; `None` means no frame is available right now.
pub trait FrameProvider: Send + Sync {
    fn provide_frame(&self) -> Option<FrameData>;
}

/// Video encoder/muxer driven by the controller.
///
/// `setup` prepares an encoder for `path` at `size` and answers with
/// `SetupSucceeded` or `SetupFailed`; `start` answers with `StartSucceeded` or
/// `StartFailed`; a started recording ends with `Completed` or `Failed`.
/// `stop` is acknowledged only by that terminal event.
pub trait Recorder: Send + Sync {
    fn bind(&self, observer: Arc<dyn RecorderObserver>, frames: Arc<dyn FrameProvider>);

    fn setup(&self, path: &str, size: Resolution);
    fn start(&self);
    fn stop(&self);
}
