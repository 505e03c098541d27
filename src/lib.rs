pub mod action;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod fps;
pub mod frame;
pub mod listener;
pub mod output;
pub mod photo;
pub mod recorder;
pub mod session;
pub mod settings;

pub use action::{ActionState, RecordPhase};
pub use config::ExcamConfig;
pub use device::{AutoConfig, DeviceCommand, DeviceEvent, DeviceObserver, MockDevice, ParamConfig, UsbState};
pub use error::{ExcamError, Result, SessionError};
pub use events::{ControlEvent, EventFilter, EventPump, PhotoEvent, RecordEvent, SessionEvent};
pub use fps::{FrameRate, FrameRateObserver};
pub use frame::{FrameData, FrameFormat, Resolution};
pub use listener::{ControlListener, ListenerRegistry, PhotoListener, RecordListener};
pub use output::OutputPaths;
pub use photo::{FilePhotoSaver, MediaIndex, NoopMediaIndex, PhotoSaver, PhotoSaverEvent, PhotoSaverObserver};
pub use recorder::{FrameProvider, MockRecorder, Recorder, RecorderEvent, RecorderObserver};
pub use session::{SessionController, SessionControllerBuilder};
pub use settings::{DeviceSettings, SettingsProvider, SharedSettings};
