//! Recording lifecycle controller
//!
//! [`RecordingController`] owns the opened camera, the live capture session
//! and the encoder of the recording in progress. It walks the
//! [`RecorderState`] machine: permission gate, device open, output
//! allocation, encoder preparation, session negotiation, repeating request,
//! and back down on stop.

mod state;

pub use state::{FailureStage, RecorderState};

use crate::controls::ControlPanel;
use crate::errors::CameraError;
use crate::permissions::PermissionGate;
use crate::platform::{CameraBackend, CameraDevice, CameraEvent, CaptureSession, EventReceiver, EventSender, SessionId};
use crate::recording::{EncoderFactory, EncoderSettings, EncoderStats, VideoEncoder, DEFAULT_BITRATE};
use crate::request::build_capture_request;
use crate::storage::{MediaEntry, MediaStore, OutputRef};
use crate::types::{CaptureConfig, SessionKind, HIGH_SPEED_THRESHOLD_FPS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

/// Notice shown after a recording has been saved
pub const SAVED_NOTICE: &str = "Saved ✔";

/// Tunables of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Camera to open; the first enumerated one when `None`
    pub camera_id: Option<String>,
    pub open_timeout: Duration,
    pub configure_timeout: Duration,
    pub high_speed_threshold: u32,
    pub bitrate: u32,
    pub surface_capacity: usize,
    pub relative_path: String,
    pub file_prefix: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            camera_id: None,
            open_timeout: Duration::from_secs(5),
            configure_timeout: Duration::from_secs(5),
            high_speed_threshold: HIGH_SPEED_THRESHOLD_FPS,
            bitrate: DEFAULT_BITRATE,
            surface_capacity: 16,
            relative_path: "DCIM/ProCamera240fps".to_string(),
            file_prefix: "ManualCinema".to_string(),
        }
    }
}

/// Returned when a recording starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub id: Uuid,
    pub output: OutputRef,
    pub config: CaptureConfig,
    pub session_kind: SessionKind,
    pub started_at: DateTime<Utc>,
}

/// Returned when a recording has been finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecording {
    pub id: Uuid,
    pub output: OutputRef,
    pub config: CaptureConfig,
    pub session_kind: SessionKind,
    pub frames_encoded: u64,
    pub frames_dropped: u64,
    pub bytes_written: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Teardown problems that did not prevent the file from being saved
    pub warnings: Vec<String>,
}

/// Serializable snapshot for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub state: RecorderState,
    pub is_recording: bool,
    pub device_id: Option<String>,
    pub recording_id: Option<Uuid>,
    pub session_kind: Option<SessionKind>,
    pub config: Option<CaptureConfig>,
    pub elapsed_secs: f64,
    pub last_error: Option<String>,
    pub notice: Option<String>,
    pub last_saved: Option<SavedRecording>,
}

/// What the record button did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToggleOutcome {
    Started(RecordingInfo),
    Stopped(SavedRecording),
}

/// What is known about a recording independent of its live handles
struct RecordingMeta {
    id: Uuid,
    config: CaptureConfig,
    kind: SessionKind,
    output: OutputRef,
    started_at: DateTime<Utc>,
}

impl RecordingMeta {
    fn info(&self) -> RecordingInfo {
        RecordingInfo {
            id: self.id,
            output: self.output.clone(),
            config: self.config,
            session_kind: self.kind,
            started_at: self.started_at,
        }
    }

    fn saved(self, stats: EncoderStats, warnings: Vec<String>) -> SavedRecording {
        SavedRecording {
            id: self.id,
            output: self.output,
            config: self.config,
            session_kind: self.kind,
            frames_encoded: stats.frames_encoded,
            frames_dropped: stats.frames_dropped,
            bytes_written: stats.bytes_written,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_secs: stats.duration_secs,
            warnings,
        }
    }
}

struct ActiveRecording {
    meta: RecordingMeta,
    session: Box<dyn CaptureSession>,
    encoder: Box<dyn VideoEncoder>,
}

/// Failure inside a start attempt, with whatever was already allocated
struct StartFailure {
    stage: FailureStage,
    error: CameraError,
    session: Option<Box<dyn CaptureSession>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    output: Option<OutputRef>,
}

impl StartFailure {
    fn at(stage: FailureStage, error: CameraError) -> Self {
        Self {
            stage,
            error,
            session: None,
            encoder: None,
            output: None,
        }
    }
}

pub struct RecordingController {
    backend: Arc<dyn CameraBackend>,
    store: Arc<dyn MediaStore>,
    encoders: Box<dyn EncoderFactory>,
    permissions: PermissionGate,
    settings: ControllerSettings,
    state: RecorderState,
    device: Option<Box<dyn CameraDevice>>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    active: Option<ActiveRecording>,
    last_config: Option<CaptureConfig>,
    last_error: Option<String>,
    last_saved: Option<SavedRecording>,
}

impl RecordingController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        store: Arc<dyn MediaStore>,
        encoders: Box<dyn EncoderFactory>,
        permissions: PermissionGate,
        settings: ControllerSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            store,
            encoders,
            permissions,
            settings,
            state: RecorderState::Idle,
            device: None,
            events_tx,
            events_rx,
            active: None,
            last_config: None,
            last_error: None,
            last_saved: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.id())
    }

    pub fn last_saved(&self) -> Option<&SavedRecording> {
        self.last_saved.as_ref()
    }

    /// Replace the tunables; takes effect from the next start
    pub fn update_settings(&mut self, settings: ControllerSettings) {
        self.settings = settings;
    }

    /// Open the camera ahead of the first recording
    pub async fn open_camera(&mut self) -> Result<String, CameraError> {
        if !self.state.can_start() {
            return Err(CameraError::invalid_state(self.state, "open_camera"));
        }
        self.drain_stale_events();
        self.transition(RecorderState::Opening)?;

        if let Err(e) = self.permissions.ensure_granted() {
            return Err(self.fail(FailureStage::Permission, e));
        }
        let device_id = match self.ensure_device().await {
            Ok(id) => id,
            Err(e) => return Err(self.fail(FailureStage::Device, e)),
        };
        self.transition(RecorderState::Idle)?;
        Ok(device_id)
    }

    /// Start recording with `config`
    pub async fn start(&mut self, config: CaptureConfig) -> Result<RecordingInfo, CameraError> {
        if !self.state.can_start() {
            return Err(CameraError::invalid_state(self.state, "start"));
        }
        self.drain_stale_events();
        self.transition(RecorderState::Opening)?;
        self.last_config = Some(config);

        match self.try_start(config).await {
            Ok(active) => {
                let info = active.meta.info();
                self.active = Some(active);
                self.transition(RecorderState::Recording)?;
                self.last_error = None;
                self.last_saved = None;
                log::info!(
                    "Recording {} started: {}@{}fps {} session -> {}",
                    info.id,
                    config.resolution(),
                    config.target_fps,
                    info.session_kind,
                    info.output.uri
                );
                Ok(info)
            }
            Err(failure) => {
                self.abort_start(failure.session, failure.encoder, failure.output.as_ref());
                Err(self.fail(failure.stage, failure.error))
            }
        }
    }

    async fn try_start(&mut self, config: CaptureConfig) -> Result<ActiveRecording, StartFailure> {
        self.permissions
            .ensure_granted()
            .map_err(|e| StartFailure::at(FailureStage::Permission, e))?;

        let device_id = self
            .ensure_device()
            .await
            .map_err(|e| StartFailure::at(FailureStage::Device, e))?;

        let kind = config.session_kind(self.settings.high_speed_threshold);
        self.backend
            .characteristics(&device_id)
            .and_then(|c| c.validate(&config, kind))
            .map_err(|e| StartFailure::at(FailureStage::Configure, e))?;

        let entry = MediaEntry::video(&self.settings.file_prefix, &self.settings.relative_path, Utc::now());
        let output = self
            .store
            .insert_pending(&entry)
            .map_err(|e| StartFailure::at(FailureStage::Encoder, e))?;

        let encoder_settings = EncoderSettings::for_capture(&config, self.settings.bitrate)
            .with_surface_capacity(self.settings.surface_capacity)
            .with_title(output.display_name.clone());
        let mut encoder = self.encoders.create();
        let surface = match encoder.prepare(&encoder_settings, self.store.as_ref(), &output) {
            Ok(surface) => surface,
            Err(error) => {
                return Err(StartFailure {
                    stage: FailureStage::Encoder,
                    error,
                    session: None,
                    encoder: Some(encoder),
                    output: Some(output),
                })
            }
        };

        if let Err(error) = self.transition(RecorderState::Configuring) {
            return Err(StartFailure {
                stage: FailureStage::Configure,
                error,
                session: None,
                encoder: Some(encoder),
                output: Some(output),
            });
        }

        let request = build_capture_request(&config, kind, surface.id());
        let created = match self.device.as_mut() {
            Some(device) => device.create_session(kind, std::slice::from_ref(&surface)),
            None => Err(CameraError::DeviceUnavailable(device_id.clone())),
        };
        drop(surface);
        let mut session = match created {
            Ok(session) => session,
            Err(error) => {
                return Err(StartFailure {
                    stage: FailureStage::Configure,
                    error,
                    session: None,
                    encoder: Some(encoder),
                    output: Some(output),
                })
            }
        };

        let installed = match self.await_session_configured(session.id()).await {
            Ok(()) => match kind {
                SessionKind::HighSpeed => session
                    .high_speed_request_list(&request)
                    .and_then(|burst| session.set_repeating_burst(&burst)),
                SessionKind::Standard => session.set_repeating_request(&request),
            },
            Err(e) => Err(e),
        };
        if let Err(error) = installed {
            return Err(StartFailure {
                stage: stage_for(&error, FailureStage::Configure),
                error,
                session: Some(session),
                encoder: Some(encoder),
                output: Some(output),
            });
        }

        if let Err(error) = encoder.start() {
            return Err(StartFailure {
                stage: FailureStage::Encoder,
                error,
                session: Some(session),
                encoder: Some(encoder),
                output: Some(output),
            });
        }

        Ok(ActiveRecording {
            meta: RecordingMeta {
                id: Uuid::new_v4(),
                config,
                kind,
                output,
                started_at: Utc::now(),
            },
            session,
            encoder,
        })
    }

    /// Stop the recording in progress and publish the file
    pub fn stop(&mut self) -> Result<SavedRecording, CameraError> {
        if !self.state.is_recording() {
            return Err(CameraError::invalid_state(self.state, "stop"));
        }
        let active = match self.active.take() {
            Some(active) => active,
            None => return Err(CameraError::invalid_state(self.state, "stop")),
        };
        self.transition(RecorderState::Stopping)?;

        let ActiveRecording {
            meta,
            mut session,
            mut encoder,
        } = active;
        let warnings = teardown_session(session.as_mut());

        let stats = match encoder.stop() {
            Ok(stats) => stats,
            Err(e) => {
                encoder.reset();
                self.discard_output(&meta.output);
                return Err(self.fail(FailureStage::Encoder, e));
            }
        };
        encoder.reset();

        if let Err(e) = self.store.set_pending(&meta.output, false) {
            return Err(self.fail(FailureStage::Stop, e));
        }

        let saved = meta.saved(stats, warnings);
        self.transition(RecorderState::Idle)?;
        log::info!(
            "Recording {} saved to {} ({} frames, {:.2}s)",
            saved.id,
            saved.output.uri,
            saved.frames_encoded,
            saved.duration_secs
        );
        self.last_saved = Some(saved.clone());
        Ok(saved)
    }

    /// Handle platform events that arrived since the last call.
    ///
    /// A disconnect or device error saves what was recorded so far, closes
    /// the device and is returned as the error.
    pub fn process_events(&mut self) -> Result<usize, CameraError> {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            self.handle_event(event)?;
        }
        Ok(handled)
    }

    /// Stop any recording and release the camera
    pub fn close(&mut self) -> Result<Option<SavedRecording>, CameraError> {
        let result = if self.state.is_recording() {
            self.stop().map(Some)
        } else {
            Ok(None)
        };
        if let Some(mut device) = self.device.take() {
            log::info!("Closing camera {}", device.id());
            device.close();
        }
        if self.state.failure().is_some() {
            self.transition(RecorderState::Idle)?;
        }
        result
    }

    /// The record button: start from the panel when idle, stop when recording
    pub async fn toggle_record(&mut self, panel: &mut ControlPanel) -> Result<ToggleOutcome, CameraError> {
        match self.state {
            RecorderState::Recording => self.stop().map(ToggleOutcome::Stopped),
            state if state.can_start() => {
                let config = panel.collect();
                self.start(config).await.map(ToggleOutcome::Started)
            }
            state => Err(CameraError::invalid_state(state, "toggle_record")),
        }
    }

    pub fn status(&self) -> RecorderStatus {
        let active = self.active.as_ref();
        let elapsed_secs = active
            .map(|a| (Utc::now() - a.meta.started_at).num_milliseconds().max(0) as f64 / 1000.0)
            .unwrap_or(0.0);
        let notice = match (self.state, &self.last_saved) {
            (RecorderState::Idle, Some(_)) => Some(SAVED_NOTICE.to_string()),
            _ => None,
        };
        RecorderStatus {
            state: self.state,
            is_recording: self.state.is_recording(),
            device_id: self.device_id().map(str::to_string),
            recording_id: active.map(|a| a.meta.id),
            session_kind: active.map(|a| a.meta.kind),
            config: active.map(|a| a.meta.config).or(self.last_config),
            elapsed_secs,
            last_error: self.last_error.clone(),
            notice,
            last_saved: self.last_saved.clone(),
        }
    }

    fn transition(&mut self, next: RecorderState) -> Result<(), CameraError> {
        if !self.state.can_transition_to(next) {
            return Err(CameraError::invalid_state(self.state, &format!("transition to {}", next)));
        }
        log::info!("Recorder state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, stage: FailureStage, error: CameraError) -> CameraError {
        log::error!("Recording failed at {} stage: {}", stage, error);
        let next = RecorderState::Failed(stage);
        if let Err(e) = self.transition(next) {
            log::warn!("{}; forcing {}", e, next);
            self.state = next;
        }
        self.last_error = Some(error.to_string());
        error
    }

    /// Open the configured camera unless one is already open
    async fn ensure_device(&mut self) -> Result<String, CameraError> {
        if let Some(device) = &self.device {
            return Ok(device.id().to_string());
        }

        let camera_id = match &self.settings.camera_id {
            Some(id) => id.clone(),
            None => self
                .backend
                .camera_ids()?
                .into_iter()
                .next()
                .ok_or_else(|| CameraError::DeviceUnavailable("no cameras available".to_string()))?,
        };

        log::info!("Opening camera {} via {} backend", camera_id, self.backend.name());
        let device = self.backend.open_device(&camera_id, self.events_tx.clone())?;
        self.device = Some(device);

        if let Err(e) = self.await_device_opened(&camera_id).await {
            if let Some(mut device) = self.device.take() {
                device.close();
            }
            return Err(e);
        }
        Ok(camera_id)
    }

    async fn next_event(&mut self, deadline: Instant, what: &str, limit: Duration) -> Result<CameraEvent, CameraError> {
        match tokio::time::timeout_at(deadline, self.events_rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(CameraError::DeviceUnavailable("camera event channel closed".to_string())),
            Err(_) => Err(CameraError::Timeout(format!("{} after {:?}", what, limit))),
        }
    }

    async fn await_device_opened(&mut self, camera_id: &str) -> Result<(), CameraError> {
        let limit = self.settings.open_timeout;
        let deadline = Instant::now() + limit;
        loop {
            match self.next_event(deadline, "camera open", limit).await? {
                CameraEvent::DeviceOpened { device_id } if device_id == camera_id => return Ok(()),
                CameraEvent::DeviceDisconnected { device_id } if device_id == camera_id => {
                    return Err(CameraError::DeviceDisconnected(device_id))
                }
                CameraEvent::DeviceError { device_id, code } if device_id == camera_id => {
                    return Err(CameraError::DeviceError { device_id, code })
                }
                other => log::debug!("Ignoring {:?} while opening camera", other),
            }
        }
    }

    async fn await_session_configured(&mut self, session: SessionId) -> Result<(), CameraError> {
        let limit = self.settings.configure_timeout;
        let deadline = Instant::now() + limit;
        let device_id = self.device_id().unwrap_or_default().to_string();
        loop {
            match self.next_event(deadline, "session configuration", limit).await? {
                CameraEvent::SessionConfigured { session: id } if id == session => {
                    log::debug!("{} configured", session);
                    return Ok(());
                }
                CameraEvent::SessionConfigureFailed { session: id, reason } if id == session => {
                    return Err(CameraError::SessionConfigurationFailed(reason))
                }
                CameraEvent::DeviceDisconnected { device_id: id } if id == device_id => {
                    self.release_device();
                    return Err(CameraError::DeviceDisconnected(id));
                }
                CameraEvent::DeviceError { device_id: id, code } if id == device_id => {
                    self.release_device();
                    return Err(CameraError::DeviceError { device_id: id, code });
                }
                other => log::debug!("Ignoring {:?} while configuring {}", other, session),
            }
        }
    }

    fn handle_event(&mut self, event: CameraEvent) -> Result<(), CameraError> {
        let current = self.device_id().map(str::to_string);
        match event {
            CameraEvent::DeviceDisconnected { device_id } if current.as_deref() == Some(device_id.as_str()) => {
                self.device_lost(CameraError::DeviceDisconnected(device_id))
            }
            CameraEvent::DeviceError { device_id, code } if current.as_deref() == Some(device_id.as_str()) => {
                self.device_lost(CameraError::DeviceError { device_id, code })
            }
            CameraEvent::SessionClosed { session } => {
                log::debug!("{} closed", session);
                Ok(())
            }
            other => {
                log::debug!("Ignoring stale event {:?}", other);
                Ok(())
            }
        }
    }

    /// The open device went away: salvage the recording and report the loss
    fn device_lost(&mut self, error: CameraError) -> Result<(), CameraError> {
        log::warn!("Camera lost: {}", error);
        if let Some(active) = self.active.take() {
            self.salvage(active, &error);
        }
        self.release_device();
        Err(self.fail(FailureStage::Device, error))
    }

    /// Best-effort finalize of a recording interrupted by the device
    fn salvage(&mut self, active: ActiveRecording, cause: &CameraError) {
        let ActiveRecording {
            meta,
            mut session,
            mut encoder,
        } = active;
        let mut warnings = teardown_session(session.as_mut());
        warnings.push(format!("recording interrupted: {}", cause));

        let stats = encoder.stop();
        encoder.reset();
        match stats {
            Ok(stats) => match self.store.set_pending(&meta.output, false) {
                Ok(()) => {
                    let saved = meta.saved(stats, warnings);
                    log::warn!("Saved interrupted recording {} to {}", saved.id, saved.output.uri);
                    self.last_saved = Some(saved);
                }
                Err(e) => log::warn!("Could not publish interrupted recording: {}", e),
            },
            Err(e) => {
                log::warn!("Could not finalize interrupted recording: {}", e);
                self.discard_output(&meta.output);
            }
        }
    }

    fn abort_start(
        &mut self,
        session: Option<Box<dyn CaptureSession>>,
        encoder: Option<Box<dyn VideoEncoder>>,
        output: Option<&OutputRef>,
    ) {
        if let Some(mut session) = session {
            for warning in teardown_session(session.as_mut()) {
                log::warn!("Cleanup after failed start: {}", warning);
            }
        }
        if let Some(mut encoder) = encoder {
            encoder.reset();
        }
        if let Some(output) = output {
            self.discard_output(output);
        }
    }

    fn discard_output(&self, output: &OutputRef) {
        if let Err(e) = self.store.discard(output) {
            log::warn!("Failed to discard {}: {}", output.uri, e);
        }
    }

    fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
        }
    }

    /// Apply device losses reported while nothing was waiting on events
    fn drain_stale_events(&mut self) {
        if let Err(e) = self.process_events() {
            log::warn!("{}; camera will be reopened", e);
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Error closing recorder: {}", e);
        }
    }
}

/// Stop the repeating request and close the session, collecting failures
fn teardown_session(session: &mut dyn CaptureSession) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Err(e) = session.stop_repeating() {
        log::warn!("Failed to stop repeating request on {}: {}", session.id(), e);
        warnings.push(format!("stop repeating: {}", e));
    }
    if let Err(e) = session.close() {
        log::warn!("Failed to close {}: {}", session.id(), e);
        warnings.push(format!("close session: {}", e));
    }
    warnings
}

fn stage_for(error: &CameraError, default: FailureStage) -> FailureStage {
    match error {
        CameraError::DeviceDisconnected(_) | CameraError::DeviceError { .. } => FailureStage::Device,
        _ => default,
    }
}

#[cfg(test)]
mod tests;
