use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Encoding error: {details}")]
    Encode { details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ExcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExcamError>;

/// Why a photo or recording request did not succeed.
///
/// Never returned from a request method; these travel through the photo and
/// record listeners.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionError {
    /// Request made while the device was not previewing
    #[error("device is not previewing")]
    NotPreviewing,

    /// Request incompatible with the current action state
    #[error("request conflicts with the current action state")]
    StateConflict,

    /// No valid resolution is known, so a recording cannot be configured
    #[error("device settings are unavailable")]
    SettingsUnavailable,

    /// Recorder failed while preparing the encoder
    #[error("recorder setup failed")]
    SetupFailed,

    /// Recorder failed to begin encoding
    #[error("recorder failed to start")]
    StartFailed,

    /// Photo saver could not persist the frame
    #[error("photo could not be saved")]
    SaveFailed,

    /// Recorder reported an error after it had started
    #[error("recording failed")]
    RecorderFailed,

    /// Disconnect or an explicit stop interrupted the activity
    #[error("interrupted by device disconnect or preview stop")]
    ForcedStop,
}
