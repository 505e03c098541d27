use crate::frame::Resolution;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The controller's single mutually-exclusive mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionState {
    /// Previewing (or not) with no capture or recording in flight
    #[default]
    Idle,
    /// Waiting for the next frame to hand to the photo saver
    Photographing,
    /// A recording session exists, from configuration until it ends
    Recording,
}

impl ActionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ActionState::Idle)
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionState::Idle => "Idle",
            ActionState::Photographing => "Photographing",
            ActionState::Recording => "Recording",
        };
        f.write_str(name)
    }
}

/// A pending photo: the path the next frame will be written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub path: String,
}

/// Lifecycle of a recording session. Ordered; phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordPhase {
    Configuring,
    Started,
    Stopping,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    pub path: String,
    pub size: Resolution,
    phase: RecordPhase,
}

impl RecordingSession {
    pub fn new(path: String, size: Resolution) -> Self {
        Self {
            path,
            size,
            phase: RecordPhase::Configuring,
        }
    }

    pub fn phase(&self) -> RecordPhase {
        self.phase
    }

    /// Move to `phase` if it is later than the current one.
    /// Returns false (and leaves the phase alone) for regressions.
    pub fn advance(&mut self, phase: RecordPhase) -> bool {
        if phase > self.phase {
            self.phase = phase;
            true
        } else {
            false
        }
    }
}
