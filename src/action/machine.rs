use super::state::{ActionState, RecordPhase};
use crate::error::SessionError;
use crate::frame::Resolution;

/// Facts sampled under the controller lock and consulted by guards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Guards {
    pub previewing: bool,
    /// Current resolution, `None` when device settings are unavailable
    pub resolution: Option<Resolution>,
    /// Phase of the live recording session, if any
    pub phase: Option<RecordPhase>,
    /// The recorder outcome being applied belongs to the live session rather
    /// than to one that was already stopped
    pub current_outcome: bool,
}

/// Inputs to the action state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    PhotoRequested { path: String },
    RecordRequested { path: String },
    FrameDelivered,
    RecorderSetupSucceeded,
    RecorderSetupFailed,
    RecorderStarted,
    RecorderStartFailed,
    RecorderCompleted { path: String },
    RecorderFailed,
    Disconnected,
    /// The consumer stopped preview and released the capture pipeline
    PreviewHalted,
}

/// Work the controller performs after a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    EnqueueCapture { path: String },
    CaptureStarted,
    /// Hand the frame that drove this transition to the photo saver
    SubmitFrame,
    CaptureFailed(SessionError),
    ConfigureRecorder { path: String, size: Resolution },
    StartRecorder,
    RecordStarted,
    RecordStartFailed(SessionError),
    RecordSucceeded { path: String },
    RecordFailed(SessionError),
    StopRecorder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ActionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ActionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: ActionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// Leave Recording for Idle when the outcome belongs to the live session;
/// every other state is kept.
fn settle(state: ActionState, guards: &Guards) -> ActionState {
    match state {
        ActionState::Recording if guards.current_outcome => ActionState::Idle,
        other => other,
    }
}

/// The single transition function of the controller.
///
/// Pure: the caller evaluates it under its state lock and then applies
/// `effects` in order.
pub fn transition(state: ActionState, event: &ActionEvent, guards: &Guards) -> Transition {
    use ActionState::*;

    match event {
        ActionEvent::PhotoRequested { path } => {
            if !guards.previewing {
                return Transition::to(
                    state,
                    vec![Effect::CaptureFailed(SessionError::NotPreviewing)],
                );
            }
            match state {
                Idle => Transition::to(
                    Photographing,
                    vec![
                        Effect::EnqueueCapture { path: path.clone() },
                        Effect::CaptureStarted,
                    ],
                ),
                // A capture is already waiting for its frame
                Photographing => Transition::stay(state),
                Recording => Transition::to(
                    state,
                    vec![Effect::CaptureFailed(SessionError::StateConflict)],
                ),
            }
        }

        ActionEvent::RecordRequested { path } => {
            if !guards.previewing {
                return Transition::to(
                    state,
                    vec![Effect::RecordStartFailed(SessionError::NotPreviewing)],
                );
            }
            match state {
                Idle => match guards.resolution.filter(Resolution::is_valid) {
                    Some(size) => Transition::to(
                        Recording,
                        vec![Effect::ConfigureRecorder {
                            path: path.clone(),
                            size,
                        }],
                    ),
                    None => Transition::to(
                        Idle,
                        vec![Effect::RecordStartFailed(SessionError::SettingsUnavailable)],
                    ),
                },
                Photographing => Transition::to(
                    state,
                    vec![Effect::RecordStartFailed(SessionError::StateConflict)],
                ),
                Recording => Transition::stay(state),
            }
        }

        ActionEvent::FrameDelivered => match state {
            Photographing => Transition::to(Idle, vec![Effect::SubmitFrame]),
            _ => Transition::stay(state),
        },

        // Outside Configuring the session was torn down or told to stop while
        // the encoder was preparing; its terminal event settles the state.
        ActionEvent::RecorderSetupSucceeded => match (state, guards.phase) {
            (Recording, Some(RecordPhase::Configuring)) => {
                Transition::to(Recording, vec![Effect::StartRecorder])
            }
            _ => Transition::stay(state),
        },

        ActionEvent::RecorderStarted => match (state, guards.phase) {
            (Recording, Some(RecordPhase::Configuring)) => {
                Transition::to(Recording, vec![Effect::RecordStarted])
            }
            _ => Transition::stay(state),
        },

        ActionEvent::RecorderSetupFailed => Transition::to(
            settle(state, guards),
            vec![Effect::RecordStartFailed(SessionError::SetupFailed)],
        ),

        ActionEvent::RecorderStartFailed => Transition::to(
            settle(state, guards),
            vec![Effect::RecordStartFailed(SessionError::StartFailed)],
        ),

        ActionEvent::RecorderCompleted { path } => Transition::to(
            settle(state, guards),
            vec![Effect::RecordSucceeded { path: path.clone() }],
        ),

        ActionEvent::RecorderFailed => Transition::to(
            settle(state, guards),
            vec![Effect::RecordFailed(SessionError::RecorderFailed)],
        ),

        ActionEvent::Disconnected | ActionEvent::PreviewHalted => match state {
            Recording => Transition::to(Idle, vec![Effect::StopRecorder]),
            Photographing => Transition::to(
                Idle,
                vec![Effect::CaptureFailed(SessionError::ForcedStop)],
            ),
            Idle => Transition::stay(state),
        },
    }
}
