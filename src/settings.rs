use crate::config::CameraConfig;
use crate::frame::Resolution;
use parking_lot::RwLock;
use tracing::debug;

/// Device settings consulted when a recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    pub resolution: Resolution,
}

/// Source of the current device settings. `None` means unavailable.
///
/// Called while the controller holds its state lock; implementations must
/// not call back into the controller.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> Option<DeviceSettings>;
}

/// In-memory settings shared between the host and the controller
#[derive(Debug, Default)]
pub struct SharedSettings {
    current: RwLock<Option<DeviceSettings>>,
}

impl SharedSettings {
    pub fn new(settings: Option<DeviceSettings>) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(Some(DeviceSettings {
            resolution: Resolution::from(config.resolution),
        }))
    }

    pub fn set_resolution(&self, resolution: Resolution) {
        debug!("Settings resolution now {}", resolution);
        *self.current.write() = Some(DeviceSettings { resolution });
    }

    /// Mark settings as unavailable
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}

impl SettingsProvider for SharedSettings {
    fn snapshot(&self) -> Option<DeviceSettings> {
        *self.current.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let settings = SharedSettings::from_config(&CameraConfig {
            resolution: (1280, 720),
        });
        assert_eq!(
            settings.snapshot().map(|s| s.resolution),
            Some(Resolution::new(1280, 720))
        );
    }

    #[test]
    fn test_update_and_clear() {
        let settings = SharedSettings::default();
        assert!(settings.snapshot().is_none());

        settings.set_resolution(Resolution::new(640, 480));
        assert_eq!(settings.snapshot().unwrap().resolution, Resolution::new(640, 480));

        settings.clear();
        assert!(settings.snapshot().is_none());
    }
}
