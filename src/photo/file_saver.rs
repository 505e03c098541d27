use super::encode::encode_jpeg;
use super::{PhotoSaver, PhotoSaverEvent, PhotoSaverObserver};
use crate::config::PhotoConfig;
use crate::error::{ExcamError, Result};
use crate::frame::FrameData;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct SaveJob {
    path: String,
    frame: FrameData,
}

struct Worker {
    jobs: mpsc::UnboundedSender<SaveJob>,
    cancel: CancellationToken,
}

/// Photo saver that writes JPEG files on a tokio worker
pub struct FilePhotoSaver {
    runtime: Handle,
    jpeg_quality: u8,
    observer: Arc<RwLock<Option<Arc<dyn PhotoSaverObserver>>>>,
    worker: Mutex<Option<Worker>>,
}

impl FilePhotoSaver {
    pub fn new(config: &PhotoConfig, runtime: Handle) -> Self {
        Self {
            runtime,
            jpeg_quality: config.jpeg_quality,
            observer: Arc::new(RwLock::new(None)),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn report(
        observer: &RwLock<Option<Arc<dyn PhotoSaverObserver>>>,
        event: PhotoSaverEvent,
    ) {
        let observer = observer.read().clone();
        match observer {
            Some(observer) => observer.on_photo_saver_event(event),
            None => debug!("No photo saver observer bound, dropping {:?}", event),
        }
    }
}

async fn write_job(job: &SaveJob, quality: u8) -> Result<()> {
    let frame = job.frame.clone();
    let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality))
        .await
        .map_err(|e| ExcamError::component("photo_saver".to_string(), e.to_string()))??;

    if let Some(parent) = Path::new(&job.path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(&job.path, encoded).await?;
    Ok(())
}

async fn save_worker(
    mut jobs: mpsc::UnboundedReceiver<SaveJob>,
    cancel: CancellationToken,
    quality: u8,
    observer: Arc<RwLock<Option<Arc<dyn PhotoSaverObserver>>>>,
) {
    info!("Photo saver worker started");
    loop {
        let job = tokio::select! {
            biased;
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let event = match write_job(&job, quality).await {
            Ok(()) => {
                debug!("Saved frame {} to {}", job.frame.id, job.path);
                PhotoSaverEvent::Saved { path: job.path }
            }
            Err(e) => {
                error!("Failed to save photo {}: {}", job.path, e);
                PhotoSaverEvent::Failed {
                    path: job.path,
                    reason: e.to_string(),
                }
            }
        };
        FilePhotoSaver::report(&observer, event);
    }

    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        warn!("Photo saver released before saving {}", job.path);
        FilePhotoSaver::report(
            &observer,
            PhotoSaverEvent::Failed {
                path: job.path,
                reason: "photo saver released".to_string(),
            },
        );
    }
    info!("Photo saver worker stopped");
}

impl PhotoSaver for FilePhotoSaver {
    fn bind(&self, observer: Arc<dyn PhotoSaverObserver>) {
        *self.observer.write() = Some(observer);
    }

    fn run(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (jobs, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.runtime.spawn(save_worker(
            rx,
            cancel.clone(),
            self.jpeg_quality,
            Arc::clone(&self.observer),
        ));
        *worker = Some(Worker { jobs, cancel });
    }

    fn release(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.cancel.cancel();
        }
    }

    fn save(&self, path: &str, frame: FrameData) {
        let path = path.to_string();
        let sent = match self.worker.lock().as_ref() {
            Some(worker) => worker
                .jobs
                .send(SaveJob {
                    path: path.clone(),
                    frame,
                })
                .is_ok(),
            None => false,
        };

        if !sent {
            warn!("Photo saver is not running; cannot save {}", path);
            Self::report(
                &self.observer,
                PhotoSaverEvent::Failed {
                    path,
                    reason: "photo saver is not running".to_string(),
                },
            );
        }
    }
}

impl Drop for FilePhotoSaver {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}
