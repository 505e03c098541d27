use super::*;
use crate::config::PhotoConfig;
use crate::frame::FrameFormat;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;

struct ChannelObserver {
    tx: mpsc::UnboundedSender<PhotoSaverEvent>,
}

impl PhotoSaverObserver for ChannelObserver {
    fn on_photo_saver_event(&self, event: PhotoSaverEvent) {
        let _ = self.tx.send(event);
    }
}

fn bound_saver() -> (FilePhotoSaver, mpsc::UnboundedReceiver<PhotoSaverEvent>) {
    let saver = FilePhotoSaver::new(&PhotoConfig { jpeg_quality: 80 }, Handle::current());
    let (tx, rx) = mpsc::unbounded_channel();
    saver.bind(Arc::new(ChannelObserver { tx }));
    (saver, rx)
}

fn mjpeg_frame(id: u64) -> FrameData {
    FrameData::new(
        id,
        SystemTime::now(),
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9],
        320,
        240,
        FrameFormat::Mjpeg,
    )
}

#[test]
fn test_mjpeg_passes_through() {
    let frame = mjpeg_frame(1);
    let encoded = encode_jpeg(&frame, 90).unwrap();
    assert_eq!(encoded, *frame.data);
}

#[test]
fn test_yuyv_is_rejected() {
    let frame = FrameData::new(1, SystemTime::now(), vec![0; 4 * 2 * 2], 4, 2, FrameFormat::Yuyv);
    assert!(encode_jpeg(&frame, 90).is_err());
}

#[test]
fn test_truncated_raw_frame_is_rejected() {
    let frame = FrameData::new(1, SystemTime::now(), vec![0; 5], 4, 2, FrameFormat::Rgb24);
    assert!(encode_jpeg(&frame, 90).is_err());
}

#[cfg(feature = "jpeg")]
#[test]
fn test_rgb_frame_is_encoded() {
    let frame = FrameData::new(1, SystemTime::now(), vec![128; 16 * 8 * 3], 16, 8, FrameFormat::Rgb24);
    let encoded = encode_jpeg(&frame, 90).unwrap();
    assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_saver_writes_requested_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("shot.jpg");
    let path_str = path.to_string_lossy().to_string();

    let (saver, mut rx) = bound_saver();
    saver.run();
    saver.save(&path_str, mjpeg_frame(3));

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, PhotoSaverEvent::Saved { path: path_str });

    let written = std::fs::read(&path).unwrap();
    assert_eq!(&written[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_saver_reports_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.jpg").to_string_lossy().to_string();
    let second = dir.path().join("b.jpg").to_string_lossy().to_string();

    let (saver, mut rx) = bound_saver();
    saver.run();
    saver.save(&first, mjpeg_frame(1));
    saver.save(&second, mjpeg_frame(2));

    let mut saved = Vec::new();
    for _ in 0..2 {
        match timeout(Duration::from_secs(5), rx.recv()).await.unwrap() {
            Some(PhotoSaverEvent::Saved { path }) => saved.push(path),
            other => panic!("Unexpected saver event: {:?}", other),
        }
    }
    assert_eq!(saved, vec![first, second]);
}

#[tokio::test]
async fn test_saver_reports_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file cannot act as a parent directory
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let path = blocker.join("shot.jpg").to_string_lossy().to_string();

    let (saver, mut rx) = bound_saver();
    saver.run();
    saver.save(&path, mjpeg_frame(1));

    match timeout(Duration::from_secs(5), rx.recv()).await.unwrap() {
        Some(PhotoSaverEvent::Failed { path: failed, .. }) => assert_eq!(failed, path),
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_saver_not_running_fails_immediately() {
    let (saver, mut rx) = bound_saver();
    saver.save("/tmp/never.jpg", mjpeg_frame(1));

    match rx.try_recv() {
        Ok(PhotoSaverEvent::Failed { path, .. }) => assert_eq!(path, "/tmp/never.jpg"),
        other => panic!("Expected immediate failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_save_after_release_reports_its_path() {
    let (saver, mut rx) = bound_saver();
    saver.run();
    assert!(saver.is_running());
    saver.release();
    assert!(!saver.is_running());

    saver.save("/tmp/late.jpg", mjpeg_frame(1));
    match rx.try_recv() {
        Ok(PhotoSaverEvent::Failed { path, .. }) => assert_eq!(path, "/tmp/late.jpg"),
        other => panic!("Expected failure for the released saver, got {:?}", other),
    }

    // Running again after a release is allowed
    saver.run();
    assert!(saver.is_running());
}
