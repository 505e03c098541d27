mod encode;
mod file_saver;
mod media;
#[cfg(test)]
mod tests;

pub use encode::encode_jpeg;
pub use file_saver::FilePhotoSaver;
pub use media::{MediaIndex, NoopMediaIndex};

use crate::frame::FrameData;
use std::sync::Arc;

/// Outcome reported by a photo saver once a frame has been handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSaverEvent {
    Saved { path: String },
    Failed { path: String, reason: String },
}

/// Receives photo saver outcomes. Implemented by the controller's photo link.
pub trait PhotoSaverObserver: Send + Sync {
    fn on_photo_saver_event(&self, event: PhotoSaverEvent);
}

/// Persists captured frames.
///
/// Each `save` carries the path and the frame together, and work happens off
/// the caller's thread. Every call ends with exactly one event for its path,
/// including calls made while the pipeline is released.
pub trait PhotoSaver: Send + Sync {
    fn bind(&self, observer: Arc<dyn PhotoSaverObserver>);

    /// Acquire the saving pipeline
    fn run(&self);
    /// Release the pipeline; jobs not yet written are reported as failures
    fn release(&self);

    fn save(&self, path: &str, frame: FrameData);
}
