use crate::error::{ExcamError, Result};
use crate::frame::{FrameData, FrameFormat};

/// Produce JPEG bytes for `frame`.
///
/// MJPEG frames are already JPEG and pass through untouched. RGB24 frames are
/// encoded at `quality` when the `jpeg` feature is enabled.
pub fn encode_jpeg(frame: &FrameData, quality: u8) -> Result<Vec<u8>> {
    if !frame.validate_size() {
        return Err(ExcamError::Encode {
            details: format!(
                "frame {} has {} bytes, which does not match {}x{} {:?}",
                frame.id,
                frame.data.len(),
                frame.width,
                frame.height,
                frame.format
            ),
        });
    }

    match frame.format {
        FrameFormat::Mjpeg => Ok(frame.data.as_ref().clone()),
        FrameFormat::Rgb24 => encode_rgb(frame, quality),
        FrameFormat::Yuyv => Err(ExcamError::Encode {
            details: "YUYV frames must be converted by the device before saving".to_string(),
        }),
    }
}

#[cfg(feature = "jpeg")]
fn encode_rgb(frame: &FrameData, quality: u8) -> Result<Vec<u8>> {
    use image::codecs::jpeg::JpegEncoder;

    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode(
                frame.data.as_slice(),
                frame.width,
                frame.height,
                image::ColorType::Rgb8,
            )
            .map_err(|e| ExcamError::Encode {
                details: e.to_string(),
            })?;
    }
    Ok(out)
}

#[cfg(not(feature = "jpeg"))]
fn encode_rgb(frame: &FrameData, _quality: u8) -> Result<Vec<u8>> {
    Err(ExcamError::Encode {
        details: format!("frame {}: JPEG encoding is disabled", frame.id),
    })
}
