use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Frame format enumeration supporting different video formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// YUV 4:2:2 format - uncompressed YUV data
    Yuyv,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Yuyv => 2,
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Width and height of a frame or of a recording target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A preview frame delivered by the device
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Monotonic frame identifier assigned by the device
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership, cloning a frame does not copy pixels)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => !self.data.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncompressed_size_validation() {
        let frame = FrameData::new(1, SystemTime::now(), vec![0; 4 * 2 * 3], 4, 2, FrameFormat::Rgb24);
        assert_eq!(frame.expected_size(), Some(24));
        assert!(frame.validate_size());

        let short = FrameData::new(2, SystemTime::now(), vec![0; 10], 4, 2, FrameFormat::Yuyv);
        assert!(!short.validate_size());
    }

    #[test]
    fn test_compressed_frames_need_payload() {
        let empty = FrameData::new(1, SystemTime::now(), Vec::new(), 640, 480, FrameFormat::Mjpeg);
        assert_eq!(empty.expected_size(), None);
        assert!(!empty.validate_size());
    }

    #[test]
    fn test_clone_shares_pixels() {
        let frame = FrameData::new(7, SystemTime::now(), vec![1, 2, 3], 1, 1, FrameFormat::Rgb24);
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &copy.data));
        assert_eq!(copy.resolution(), Resolution::new(1, 1));
    }
}
