use crate::config::OutputConfig;
use chrono::Local;
use std::path::PathBuf;
use uuid::Uuid;

/// Generates destination paths for auto-named photos and videos
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
    photo_extension: String,
    video_extension: String,
}

impl OutputPaths {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_path),
            photo_extension: config.photo_extension.trim_start_matches('.').to_string(),
            video_extension: config.video_extension.trim_start_matches('.').to_string(),
        }
    }

    /// `<root>/IMG_<YYYYmmdd_HHMMSS_mmm>_<8 hex>.<ext>`
    pub fn photo_path(&self) -> String {
        self.generate("IMG", &self.photo_extension)
    }

    /// `<root>/VID_<YYYYmmdd_HHMMSS_mmm>_<8 hex>.<ext>`
    pub fn video_path(&self) -> String {
        self.generate("VID", &self.video_extension)
    }

    fn generate(&self, prefix: &str, extension: &str) -> String {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let id = Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}_{}.{}", prefix, stamp, &id[..8], extension);
        self.root.join(name).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn paths() -> OutputPaths {
        OutputPaths::new(&OutputConfig {
            root_path: "/data/captures".to_string(),
            photo_extension: ".jpg".to_string(),
            video_extension: "mp4".to_string(),
        })
    }

    #[test]
    fn test_photo_path_layout() {
        let path = paths().photo_path();
        let path = Path::new(&path);
        assert_eq!(path.parent(), Some(Path::new("/data/captures")));

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".jpg"));
        // IMG_ + 8 date + _ + 6 time + _ + 3 millis + _ + 8 hex + .jpg
        assert_eq!(name.len(), 4 + 8 + 1 + 6 + 1 + 3 + 1 + 8 + 4);
    }

    #[test]
    fn test_video_paths_are_unique() {
        let paths = paths();
        let first = paths.video_path();
        let second = paths.video_path();
        assert!(first.contains("VID_"));
        assert!(first.ends_with(".mp4"));
        assert_ne!(first, second);
    }
}
