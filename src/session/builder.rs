use super::controller::{Inner, SessionController, SessionState};
use super::links::{DeviceLink, FrameSource, PhotoLink, RecorderLink};
use crate::config::ExcamConfig;
use crate::device::DeviceCommand;
use crate::error::{ExcamError, Result};
use crate::events::{self, EventPump};
use crate::fps::FrameRateObserver;
use crate::listener::ListenerRegistry;
use crate::output::OutputPaths;
use crate::photo::{FilePhotoSaver, MediaIndex, NoopMediaIndex, PhotoSaver};
use crate::recorder::Recorder;
use crate::settings::{SettingsProvider, SharedSettings};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// Builder for [`SessionController`].
///
/// A device and a recorder are required. The photo saver defaults to a
/// [`FilePhotoSaver`], settings to the configured camera resolution and the
/// media index to a no-op. Background work runs on the given runtime, or on
/// the current one when none is given.
pub struct SessionControllerBuilder {
    config: ExcamConfig,
    device: Option<Arc<dyn DeviceCommand>>,
    photo_saver: Option<Arc<dyn PhotoSaver>>,
    recorder: Option<Arc<dyn Recorder>>,
    settings: Option<Arc<dyn SettingsProvider>>,
    media_index: Option<Arc<dyn MediaIndex>>,
    runtime: Option<Handle>,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: ExcamConfig::default(),
            device: None,
            photo_saver: None,
            recorder: None,
            settings: None,
            media_index: None,
            runtime: None,
        }
    }

    pub fn config(mut self, config: ExcamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn device(mut self, device: Arc<dyn DeviceCommand>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn photo_saver(mut self, photo_saver: Arc<dyn PhotoSaver>) -> Self {
        self.photo_saver = Some(photo_saver);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn media_index(mut self, media_index: Arc<dyn MediaIndex>) -> Self {
        self.media_index = Some(media_index);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Wire the collaborators together. The returned pump delivers listener
    /// callbacks and must be driven by the consumer.
    pub fn build(self) -> Result<(SessionController, EventPump)> {
        self.config.validate()?;

        let device = self
            .device
            .ok_or_else(|| ExcamError::system("Device must be specified"))?;
        let recorder = self
            .recorder
            .ok_or_else(|| ExcamError::system("Recorder must be specified"))?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                ExcamError::system(format!("A tokio runtime is required: {}", e))
            })?,
        };

        let photo_saver: Arc<dyn PhotoSaver> = match self.photo_saver {
            Some(photo_saver) => photo_saver,
            None => Arc::new(FilePhotoSaver::new(&self.config.photo, runtime.clone())),
        };
        let settings: Arc<dyn SettingsProvider> = match self.settings {
            Some(settings) => settings,
            None => Arc::new(SharedSettings::from_config(&self.config.camera)),
        };
        let media_index: Arc<dyn MediaIndex> = match self.media_index {
            Some(media_index) => media_index,
            None => Arc::new(NoopMediaIndex),
        };

        let listeners = Arc::new(ListenerRegistry::new());
        let (outbox, pump) =
            events::channel(self.config.session.event_queue_capacity, Arc::clone(&listeners));

        let state = SessionState {
            usb: device.current_state(),
            previewing: device.is_previewing(),
            ..SessionState::default()
        };

        let inner = Arc::new(Inner {
            device: Arc::clone(&device),
            photo_saver: Arc::clone(&photo_saver),
            recorder: Arc::clone(&recorder),
            settings,
            media_index,
            listeners,
            outbox,
            fps: FrameRateObserver::new(self.config.fps.sample_period(), runtime),
            log_fps: self.config.fps.log_fps,
            paths: OutputPaths::new(&self.config.output),
            state: Mutex::new(state),
            pipeline_active: AtomicBool::new(false),
        });

        device.bind(Arc::new(DeviceLink {
            inner: Arc::downgrade(&inner),
        }));
        photo_saver.bind(Arc::new(PhotoLink {
            inner: Arc::downgrade(&inner),
        }));
        recorder.bind(
            Arc::new(RecorderLink {
                inner: Arc::downgrade(&inner),
            }),
            Arc::new(FrameSource {
                inner: Arc::downgrade(&inner),
            }),
        );

        info!(
            "Session controller ready (event queue capacity {})",
            self.config.session.event_queue_capacity
        );
        Ok((SessionController { inner }, pump))
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
