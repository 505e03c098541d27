use crate::action::{
    transition, ActionEvent, ActionState, CaptureRequest, Effect, Guards, RecordPhase,
    RecordingSession, Transition,
};
use crate::device::{AutoConfig, DeviceCommand, DeviceEvent, ParamConfig, UsbState};
use crate::events::{ControlEvent, EventOutbox, PhotoEvent, RecordEvent, SessionEvent};
use crate::error::SessionError;
use crate::fps::{FrameRate, FrameRateObserver};
use crate::frame::{FrameData, Resolution};
use crate::listener::{ControlListener, ListenerRegistry, PhotoListener, RecordListener};
use crate::output::OutputPaths;
use crate::photo::{MediaIndex, PhotoSaver, PhotoSaverEvent};
use crate::recorder::{Recorder, RecorderEvent};
use crate::settings::SettingsProvider;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Everything guarded by the controller's single state lock
#[derive(Debug, Default)]
pub(super) struct SessionState {
    pub(super) action: ActionState,
    pub(super) usb: UsbState,
    pub(super) previewing: bool,
    pub(super) capture: Option<CaptureRequest>,
    pub(super) recording: Option<RecordingSession>,
    /// Paths of started sessions that were stopped by a disconnect or a
    /// preview halt and whose recorder outcome has not arrived yet
    pub(super) stopped: VecDeque<String>,
}

impl SessionState {
    /// Whether a recorder outcome belongs to the live session. An outcome
    /// owed to a stopped session is consumed from `stopped` instead.
    fn claim_outcome(&mut self, event: &ActionEvent) -> bool {
        let live = self.recording.as_ref().map(|session| session.path.as_str());
        match event {
            ActionEvent::RecorderCompleted { path } => {
                if let Some(index) = self.stopped.iter().position(|stopped| stopped == path) {
                    self.stopped.remove(index);
                    return false;
                }
                if live == Some(path.as_str()) {
                    return true;
                }
                self.stopped.pop_front().is_none() && live.is_some()
            }
            ActionEvent::RecorderSetupFailed
            | ActionEvent::RecorderStartFailed
            | ActionEvent::RecorderFailed => self.stopped.pop_front().is_none() && live.is_some(),
            _ => live.is_some(),
        }
    }
}

/// Collaborator calls collected under the state lock
#[derive(Debug)]
enum Work {
    SavePhoto { path: String },
    ConfigureRecorder { path: String, size: Resolution },
    StartRecorder,
    StopRecorder,
}

pub(super) struct Inner {
    pub(super) device: Arc<dyn DeviceCommand>,
    pub(super) photo_saver: Arc<dyn PhotoSaver>,
    pub(super) recorder: Arc<dyn Recorder>,
    pub(super) settings: Arc<dyn SettingsProvider>,
    pub(super) media_index: Arc<dyn MediaIndex>,
    pub(super) listeners: Arc<ListenerRegistry>,
    pub(super) outbox: Arc<EventOutbox>,
    pub(super) fps: FrameRateObserver,
    pub(super) log_fps: bool,
    pub(super) paths: OutputPaths,
    pub(super) state: Mutex<SessionState>,
    pub(super) pipeline_active: AtomicBool,
}

impl Inner {
    /// Run `f` under the state lock, then flush staged events and perform the
    /// collaborator work `f` collected. `frame` is handed to the photo saver
    /// if a capture consumes it.
    fn with_state<F>(&self, frame: Option<FrameData>, f: F)
    where
        F: FnOnce(&mut SessionState, &mut Vec<Work>),
    {
        let mut work = Vec::new();
        {
            let mut state = self.state.lock();
            f(&mut state, &mut work);
        }
        self.outbox.flush();
        self.perform(work, frame);
    }

    fn apply(&self, event: ActionEvent) {
        self.with_state(None, |state, work| self.step(state, event, work));
    }

    /// Publish events in order without touching the action state
    fn publish(&self, events: Vec<SessionEvent>) {
        self.with_state(None, |_, _| {
            for event in events {
                self.outbox.push(event);
            }
        });
    }

    /// One state-machine step. Caller holds the state lock.
    fn step(&self, state: &mut SessionState, event: ActionEvent, work: &mut Vec<Work>) {
        let guards = Guards {
            previewing: state.previewing,
            resolution: self.settings.snapshot().map(|settings| settings.resolution),
            phase: state.recording.as_ref().map(RecordingSession::phase),
            current_outcome: state.claim_outcome(&event),
        };
        let Transition { next, effects } = transition(state.action, &event, &guards);

        if next != state.action {
            debug!("Action state update: {} -> {}", state.action, next);
            state.action = next;
            self.outbox
                .push(SessionEvent::Control(ControlEvent::ActionStateUpdate { state: next }));
        }

        for effect in effects {
            match effect {
                Effect::EnqueueCapture { path } => {
                    state.capture = Some(CaptureRequest { path });
                }
                Effect::CaptureStarted => {
                    self.outbox.push(SessionEvent::Photo(PhotoEvent::Start));
                }
                Effect::SubmitFrame => match state.capture.take() {
                    Some(CaptureRequest { path }) => {
                        debug!("Submitting frame for photo {}", path);
                        work.push(Work::SavePhoto { path });
                    }
                    None => warn!("Frame consumed with no pending photo"),
                },
                Effect::CaptureFailed(reason) => {
                    warn!("Photo request failed: {}", reason);
                    self.outbox
                        .push(SessionEvent::Photo(PhotoEvent::Fail { reason }));
                    self.outbox.push(SessionEvent::Photo(PhotoEvent::Done));
                }
                Effect::ConfigureRecorder { path, size } => {
                    state.recording = Some(RecordingSession::new(path.clone(), size));
                    work.push(Work::ConfigureRecorder { path, size });
                }
                Effect::StartRecorder => work.push(Work::StartRecorder),
                Effect::RecordStarted => {
                    if let Some(session) = state.recording.as_mut() {
                        session.advance(RecordPhase::Started);
                        info!("Recording started: {}", session.path);
                    }
                    self.outbox
                        .push(SessionEvent::Record(RecordEvent::StartSuccess));
                }
                Effect::RecordStartFailed(reason) => {
                    warn!("Recording failed to start: {}", reason);
                    self.outbox
                        .push(SessionEvent::Record(RecordEvent::StartFail { reason }));
                }
                Effect::RecordSucceeded { path } => {
                    info!("Recording saved: {}", path);
                    self.outbox
                        .push(SessionEvent::Record(RecordEvent::Success { path }));
                }
                Effect::RecordFailed(reason) => {
                    error!("Recording failed: {}", reason);
                    self.outbox
                        .push(SessionEvent::Record(RecordEvent::Fail { reason }));
                }
                Effect::StopRecorder => {
                    if let Some(session) = state.recording.as_mut() {
                        // Only a started encoder owes an outcome for this stop
                        if session.phase() >= RecordPhase::Started {
                            state.stopped.push_back(session.path.clone());
                        }
                        session.advance(RecordPhase::Stopping);
                    }
                    work.push(Work::StopRecorder);
                }
            }
        }

        if state.action != ActionState::Photographing {
            state.capture = None;
        }
        if state.action != ActionState::Recording {
            if let Some(mut session) = state.recording.take() {
                session.advance(RecordPhase::Ended);
                debug!("Recording session for {} ended", session.path);
            }
        }
    }

    /// Collaborator calls, made with the state lock released
    fn perform(&self, work: Vec<Work>, mut frame: Option<FrameData>) {
        for item in work {
            trace!("Performing {:?}", item);
            match item {
                Work::SavePhoto { path } => match frame.take() {
                    Some(frame) => self.photo_saver.save(&path, frame),
                    None => warn!("Capture of {} completed without a frame", path),
                },
                Work::ConfigureRecorder { path, size } => {
                    info!("Configuring recorder for {} at {}", path, size);
                    self.recorder.setup(&path, size);
                }
                Work::StartRecorder => self.recorder.start(),
                Work::StopRecorder => {
                    info!("Stopping recorder");
                    self.recorder.stop();
                }
            }
        }
    }

    fn start_frame_rate(&self) {
        let outbox = Arc::downgrade(&self.outbox);
        let log_fps = self.log_fps;
        self.fps.start(move |rate: FrameRate| {
            if log_fps {
                debug!("Frame rate: {} fps (average {:.1})", rate.instant, rate.average);
            }
            if let Some(outbox) = outbox.upgrade() {
                outbox.push(SessionEvent::Control(ControlEvent::LoadFps {
                    instant: rate.instant,
                    average: rate.average,
                }));
                outbox.flush();
            }
        });
    }

    pub(super) fn on_device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected => {
                info!("USB device connected");
                self.publish(vec![SessionEvent::Control(ControlEvent::UsbConnect)]);
            }
            DeviceEvent::Disconnected => {
                warn!("USB device disconnected");
                self.fps.stop();
                self.with_state(None, |state, work| {
                    state.previewing = false;
                    self.step(state, ActionEvent::Disconnected, work);
                    self.outbox
                        .push(SessionEvent::Control(ControlEvent::UsbDisconnect));
                });
            }
            DeviceEvent::CameraOpened => {
                info!("Camera opened");
                self.publish(vec![SessionEvent::Control(ControlEvent::CameraOpen)]);
            }
            DeviceEvent::CameraClosed => {
                info!("Camera closed");
                self.fps.stop();
                self.with_state(None, |state, _| {
                    state.previewing = false;
                    self.outbox.push(SessionEvent::Control(ControlEvent::CameraClose));
                });
            }
            DeviceEvent::PreviewStarted => {
                let description = self.device.describe_configs();
                if !description.is_empty() {
                    info!("Device configuration: {}", description);
                }
                self.start_frame_rate();
                self.with_state(None, |state, _| {
                    state.previewing = true;
                    self.outbox.push(SessionEvent::Control(ControlEvent::PreviewStart));
                });
            }
            DeviceEvent::PreviewStopped => {
                self.fps.stop();
                self.with_state(None, |state, _| {
                    state.previewing = false;
                    self.outbox.push(SessionEvent::Control(ControlEvent::PreviewStop));
                });
            }
            DeviceEvent::StateChanged(usb) => {
                debug!("USB state update: {:?}", usb);
                self.with_state(None, |state, _| {
                    state.usb = usb;
                    match usb {
                        UsbState::Previewing => state.previewing = true,
                        UsbState::Stopped
                        | UsbState::Closed
                        | UsbState::Disconnected
                        | UsbState::Detached => state.previewing = false,
                        _ => {}
                    }
                    self.outbox
                        .push(SessionEvent::Control(ControlEvent::UsbStateUpdate { state: usb }));
                });
            }
            DeviceEvent::Frame(frame) => {
                trace!("Frame {} delivered", frame.id);
                self.fps.mark();
                let submitted = frame.clone();
                self.with_state(Some(submitted), |state, work| {
                    self.outbox
                        .push(SessionEvent::Control(ControlEvent::LoadFrame(frame)));
                    self.step(state, ActionEvent::FrameDelivered, work);
                });
            }
        }
    }

    pub(super) fn on_photo_saver_event(&self, event: PhotoSaverEvent) {
        match event {
            PhotoSaverEvent::Saved { path } => {
                info!("Photo saved: {}", path);
                self.media_index.scan(&path);
                self.publish(vec![
                    SessionEvent::Photo(PhotoEvent::Success { path }),
                    SessionEvent::Photo(PhotoEvent::Done),
                ]);
            }
            PhotoSaverEvent::Failed { path, reason } => {
                error!("Failed to save photo {}: {}", path, reason);
                self.publish(vec![
                    SessionEvent::Photo(PhotoEvent::Fail {
                        reason: SessionError::SaveFailed,
                    }),
                    SessionEvent::Photo(PhotoEvent::Done),
                ]);
            }
        }
    }

    pub(super) fn on_recorder_event(&self, event: RecorderEvent) {
        match event {
            RecorderEvent::SetupSucceeded => self.apply(ActionEvent::RecorderSetupSucceeded),
            RecorderEvent::SetupFailed => self.apply(ActionEvent::RecorderSetupFailed),
            RecorderEvent::StartSucceeded => self.apply(ActionEvent::RecorderStarted),
            RecorderEvent::StartFailed => self.apply(ActionEvent::RecorderStartFailed),
            RecorderEvent::Progress { elapsed_secs } => {
                trace!("Recording progress: {}s", elapsed_secs);
                self.publish(vec![SessionEvent::Record(RecordEvent::Progress {
                    elapsed_secs,
                })]);
            }
            RecorderEvent::Completed { path } => {
                self.apply(ActionEvent::RecorderCompleted { path })
            }
            RecorderEvent::Failed => self.apply(ActionEvent::RecorderFailed),
        }
    }

    /// Latest device frame for the recorder; never takes the state lock
    pub(super) fn latest_frame(&self) -> Option<FrameData> {
        self.device.latest_frame()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if *self.pipeline_active.get_mut() {
            debug!("Session dropped while running, releasing capture pipeline");
            self.device.stop_preview();
            self.photo_saver.release();
        }
        self.fps.stop();
    }
}

/// Hub that owns the action state and routes every collaborator event.
///
/// Cheap to clone; all clones share one session. Request methods return
/// immediately and report their outcome through the registered listeners,
/// which run on the thread driving the session's [`EventPump`](crate::EventPump).
#[derive(Clone)]
pub struct SessionController {
    pub(super) inner: Arc<Inner>,
}

impl SessionController {
    /// Start preview and acquire the capture pipeline
    pub fn start(&self) {
        info!("Starting preview");
        self.inner.pipeline_active.store(true, Ordering::SeqCst);
        self.inner.device.start_preview();
        self.inner.photo_saver.run();
    }

    /// Stop preview and release the capture pipeline.
    ///
    /// A pending photo fails with [`SessionError::ForcedStop`]; an active
    /// recording is told to stop and finishes asynchronously.
    pub fn stop(&self) {
        info!("Stopping preview");
        self.inner.apply(ActionEvent::PreviewHalted);
        self.inner.device.stop_preview();
        self.inner.fps.stop();
        self.inner.pipeline_active.store(false, Ordering::SeqCst);
        self.inner.photo_saver.release();
    }

    /// Close the camera
    pub fn release(&self) {
        info!("Releasing camera");
        self.inner.device.close_camera();
    }

    pub fn request_photo(&self, path: &str) {
        debug!("Photo requested: {}", path);
        self.inner.apply(ActionEvent::PhotoRequested {
            path: path.to_string(),
        });
    }

    /// Request a photo at a generated path, which is returned
    pub fn request_photo_auto(&self) -> String {
        let path = self.inner.paths.photo_path();
        self.request_photo(&path);
        path
    }

    pub fn request_record_start(&self, path: &str) {
        debug!("Recording requested: {}", path);
        self.inner.apply(ActionEvent::RecordRequested {
            path: path.to_string(),
        });
    }

    /// Request a recording at a generated path, which is returned
    pub fn request_record_start_auto(&self) -> String {
        let path = self.inner.paths.video_path();
        self.request_record_start(&path);
        path
    }

    /// Forwarded to the recorder whatever the current state
    pub fn request_record_stop(&self) {
        if let Some(session) = self.inner.state.lock().recording.as_mut() {
            session.advance(RecordPhase::Stopping);
        }
        info!("Recording stop requested");
        self.inner.recorder.stop();
    }

    pub fn action_state(&self) -> ActionState {
        self.inner.state.lock().action
    }

    pub fn usb_state(&self) -> UsbState {
        self.inner.state.lock().usb
    }

    pub fn is_previewing(&self) -> bool {
        self.inner.state.lock().previewing
    }

    /// Phase of the active recording session, if any
    pub fn record_phase(&self) -> Option<RecordPhase> {
        self.inner
            .state
            .lock()
            .recording
            .as_ref()
            .map(RecordingSession::phase)
    }

    /// Path of the photo waiting for its frame, if any
    pub fn pending_photo(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .capture
            .as_ref()
            .map(|request| request.path.clone())
    }

    pub fn set_control_listener(&self, listener: Option<Arc<dyn ControlListener>>) {
        self.inner.listeners.set_control(listener);
    }

    pub fn set_photo_listener(&self, listener: Option<Arc<dyn PhotoListener>>) {
        self.inner.listeners.set_photo(listener);
    }

    pub fn set_record_listener(&self, listener: Option<Arc<dyn RecordListener>>) {
        self.inner.listeners.set_record(listener);
    }

    pub fn update_resolution(&self, width: u32, height: u32) {
        self.inner.device.update_resolution(width, height);
    }

    pub fn update_flip(&self) {
        self.inner.device.update_flip();
    }

    pub fn auto_config(&self, tag: &str) -> Option<AutoConfig> {
        self.inner.device.auto_config(tag)
    }

    pub fn param_config(&self, tag: &str) -> Option<ParamConfig> {
        self.inner.device.param_config(tag)
    }

    pub fn is_config_enabled(&self, tag: &str) -> bool {
        self.inner.device.is_config_enabled(tag)
    }

    pub fn get_auto(&self, tag: &str) -> bool {
        self.inner.device.get_auto(tag)
    }

    pub fn set_auto(&self, tag: &str, value: bool) {
        self.inner.device.set_auto(tag, value);
    }

    pub fn reset_auto(&self, tag: &str) {
        self.inner.device.reset_auto(tag);
    }

    pub fn get_param(&self, tag: &str) -> i32 {
        self.inner.device.get_param(tag)
    }

    pub fn set_param(&self, tag: &str, value: i32) {
        self.inner.device.set_param(tag, value);
    }

    pub fn reset_param(&self, tag: &str) {
        self.inner.device.reset_param(tag);
    }

    /// Current value of `tag` as a linear percentage of its range
    pub fn param_percent(&self, tag: &str) -> i32 {
        self.inner
            .device
            .param_config(tag)
            .map(|config| config.percent_by_value(self.inner.device.get_param(tag)))
            .unwrap_or(0)
    }

    /// Current value of `tag` as a percentage along the quadratic curve
    pub fn param_percent_quadratic(&self, tag: &str) -> i32 {
        self.inner
            .device
            .param_config(tag)
            .map(|config| config.percent_by_value_quadratic(self.inner.device.get_param(tag)))
            .unwrap_or(0)
    }

    pub fn set_param_percent(&self, tag: &str, percent: i32) {
        match self.inner.device.param_config(tag) {
            Some(config) => self
                .inner
                .device
                .set_param(tag, config.value_by_percent(percent)),
            None => debug!("No range declared for {}, ignoring percent update", tag),
        }
    }

    pub fn set_param_percent_quadratic(&self, tag: &str, percent: i32) {
        match self.inner.device.param_config(tag) {
            Some(config) => self
                .inner
                .device
                .set_param(tag, config.value_by_percent_quadratic(percent)),
            None => debug!("No range declared for {}, ignoring percent update", tag),
        }
    }
}
