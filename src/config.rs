use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExcamConfig {
    pub camera: CameraConfig,
    pub output: OutputConfig,
    pub session: SessionConfig,
    pub fps: FpsConfig,
    pub photo: PhotoConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Preview resolution (width, height) reported to the recorder
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Directory used for generated photo and video paths
    #[serde(default = "default_output_root")]
    pub root_path: String,

    /// File extension for generated photo paths
    #[serde(default = "default_photo_extension")]
    pub photo_extension: String,

    /// File extension for generated video paths
    #[serde(default = "default_video_extension")]
    pub video_extension: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Capacity of the ordered queue feeding the consumer context
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FpsConfig {
    /// Period between frame rate reports in milliseconds
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,

    /// Log every frame rate report at debug level
    #[serde(default = "default_log_fps")]
    pub log_fps: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PhotoConfig {
    /// JPEG quality used when a raw frame has to be encoded (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl FpsConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }
}

impl ExcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("excam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("output.root_path", default_output_root())?
            .set_default("output.photo_extension", default_photo_extension())?
            .set_default("output.video_extension", default_video_extension())?
            .set_default(
                "session.event_queue_capacity",
                default_event_queue_capacity() as i64,
            )?
            .set_default("fps.sample_period_ms", default_sample_period_ms())?
            .set_default("fps.log_fps", default_log_fps())?
            .set_default("photo.jpeg_quality", default_jpeg_quality() as i64)?
            .add_source(File::with_name(&path_str).required(false))
            // EXCAM_SESSION__EVENT_QUEUE_CAPACITY style overrides
            .add_source(
                Environment::with_prefix("EXCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ExcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.output.root_path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Output root_path must not be empty".to_string(),
            ));
        }

        if self.output.photo_extension.is_empty() || self.output.video_extension.is_empty() {
            return Err(ConfigError::Message(
                "Output file extensions must not be empty".to_string(),
            ));
        }

        if self.session.event_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Event queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.fps.sample_period_ms == 0 {
            return Err(ConfigError::Message(
                "FPS sample period must be greater than 0".to_string(),
            ));
        }

        if self.photo.jpeg_quality == 0 || self.photo.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ExcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                resolution: default_camera_resolution(),
            },
            output: OutputConfig {
                root_path: default_output_root(),
                photo_extension: default_photo_extension(),
                video_extension: default_video_extension(),
            },
            session: SessionConfig {
                event_queue_capacity: default_event_queue_capacity(),
            },
            fps: FpsConfig {
                sample_period_ms: default_sample_period_ms(),
                log_fps: default_log_fps(),
            },
            photo: PhotoConfig {
                jpeg_quality: default_jpeg_quality(),
            },
        }
    }
}

// Default value functions
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}

fn default_output_root() -> String {
    "./captures".to_string()
}
fn default_photo_extension() -> String {
    "jpg".to_string()
}
fn default_video_extension() -> String {
    "mp4".to_string()
}

fn default_event_queue_capacity() -> usize {
    256
}

fn default_sample_period_ms() -> u64 {
    1000
}
fn default_log_fps() -> bool {
    false
}

fn default_jpeg_quality() -> u8 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ExcamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.fps.sample_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_validation() {
        let mut config = ExcamConfig::default();
        config.camera.resolution = (0, 480);
        assert!(config.validate().is_err());

        config.camera.resolution = (1280, 720);
        config.session.event_queue_capacity = 0;
        assert!(config.validate().is_err());

        config.session.event_queue_capacity = 16;
        config.photo.jpeg_quality = 101;
        assert!(config.validate().is_err());

        config.photo.jpeg_quality = 75;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[camera]\nresolution = [1920, 1080]\n\n[fps]\nsample_period_ms = 500\n"
        )
        .unwrap();

        let config = ExcamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.resolution, (1920, 1080));
        assert_eq!(config.fps.sample_period_ms, 500);
        // Untouched sections keep their defaults
        assert_eq!(config.output.photo_extension, "jpg");
        assert_eq!(config.session.event_queue_capacity, 256);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ExcamConfig::load_from_file("/nonexistent/excam-test.toml").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.output.root_path, "./captures");
    }

    #[test]
    fn test_environment_overrides_file() {
        std::env::set_var("EXCAM_PHOTO__JPEG_QUALITY", "55");
        let config = ExcamConfig::load_from_file("/nonexistent/excam-env.toml");
        std::env::remove_var("EXCAM_PHOTO__JPEG_QUALITY");

        assert_eq!(config.unwrap().photo.jpeg_quality, 55);
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&ExcamConfig::default()).unwrap();
        assert!(rendered.contains("[camera]"));
        assert!(rendered.contains("event_queue_capacity = 256"));
    }
}
