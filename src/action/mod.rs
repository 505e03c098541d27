mod machine;
mod state;

pub use machine::{transition, ActionEvent, Effect, Guards, Transition};
pub use state::{ActionState, CaptureRequest, RecordPhase, RecordingSession};
