//! Thread-backed camera that behaves like a real camera framework
//!
//! Each opened device runs a `procamera-camera` thread that owns all session
//! state, delivers framework callbacks through the event channel and pushes
//! frames into the target surfaces at the requested rate. Faults can be
//! scheduled to exercise failure handling without hardware.

use super::{
    CameraBackend, CameraCharacteristics, CameraDevice, CameraEvent, CaptureSession,
    EventSender, HighSpeedMode, SessionId, Surface, SurfaceId,
};
use crate::errors::CameraError;
use crate::request::CaptureRequest;
use crate::testing::{synthetic_video_frame, timing_only_frame};
use crate::timing::{frame_interval, PTSClock};
use crate::types::{Resolution, SessionKind};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(50);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// What simulated frames carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePayload {
    /// Size and timing only
    Timing,
    /// Full RGB24 gradient frames
    Synthetic,
}

/// Failures to inject into the simulated framework
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_open: bool,
    /// Open the device but never report it as opened
    pub withhold_opened: bool,
    pub fail_configure: bool,
    /// Accept sessions but never report them as configured
    pub withhold_configured: bool,
    pub fail_session_teardown: bool,
    pub disconnect_after_frames: Option<u64>,
    pub error_after_frames: Option<(u64, i32)>,
}

/// Everything the simulated framework was asked to do
#[derive(Debug, Clone, Default)]
pub struct SimulatedLog {
    pub opened_devices: Vec<String>,
    pub sessions: Vec<(SessionId, SessionKind)>,
    pub repeating_requests: Vec<CaptureRequest>,
    pub repeating_bursts: Vec<Vec<CaptureRequest>>,
    pub stop_repeating_calls: u32,
    pub closed_sessions: Vec<SessionId>,
    pub closed_devices: Vec<String>,
    pub frames_delivered: u64,
}

pub struct SimulatedCamera {
    cameras: Vec<String>,
    characteristics: CameraCharacteristics,
    payload: FramePayload,
    faults: Arc<Mutex<FaultPlan>>,
    log: Arc<Mutex<SimulatedLog>>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            cameras: vec!["0".to_string(), "1".to_string()],
            characteristics: Self::default_characteristics(),
            payload: FramePayload::Timing,
            faults: Arc::new(Mutex::new(FaultPlan::default())),
            log: Arc::new(Mutex::new(SimulatedLog::default())),
        }
    }

    /// A phone-class rear sensor: manual ISO 100-3200, 1/10000 s to 1 s,
    /// up to 120 fps normally and 240 fps high-speed at 720p and 1080p.
    pub fn default_characteristics() -> CameraCharacteristics {
        CameraCharacteristics {
            iso_range: (100, 3200),
            exposure_range_ns: (100_000, 1_000_000_000),
            max_standard_fps: 120,
            standard_resolutions: vec![Resolution::vga(), Resolution::hd(), Resolution::full_hd()],
            high_speed_modes: vec![
                HighSpeedMode {
                    resolution: Resolution::hd(),
                    max_fps: 240,
                },
                HighSpeedMode {
                    resolution: Resolution::full_hd(),
                    max_fps: 240,
                },
            ],
        }
    }

    pub fn with_cameras<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cameras = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_characteristics(mut self, characteristics: CameraCharacteristics) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn with_payload(mut self, payload: FramePayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        self.set_faults(faults);
        self
    }

    /// Replace the fault plan; applies to devices and sessions created afterwards
    /// and to frame-count triggers of running devices.
    pub fn set_faults(&self, faults: FaultPlan) {
        if let Ok(mut guard) = self.faults.lock() {
            *guard = faults;
        }
    }

    /// Snapshot of everything recorded so far
    pub fn log(&self) -> SimulatedLog {
        self.log.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn faults(&self) -> FaultPlan {
        self.faults.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SimulatedCamera {
    fn name(&self) -> &str {
        "simulated"
    }

    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        Ok(self.cameras.clone())
    }

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError> {
        if !self.cameras.iter().any(|c| c == camera_id) {
            return Err(CameraError::DeviceUnavailable(format!(
                "no camera with id {}",
                camera_id
            )));
        }
        Ok(self.characteristics.clone())
    }

    fn open_device(
        &self,
        camera_id: &str,
        events: EventSender,
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        if !self.cameras.iter().any(|c| c == camera_id) {
            return Err(CameraError::DeviceUnavailable(format!(
                "no camera with id {}",
                camera_id
            )));
        }
        if self.faults().fail_open {
            return Err(CameraError::DeviceUnavailable(format!(
                "camera {} is in use by another client",
                camera_id
            )));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = Worker {
            device_id: camera_id.to_string(),
            events,
            commands: rx,
            log: self.log.clone(),
            faults: self.faults.clone(),
            payload: self.payload,
            characteristics: self.characteristics.clone(),
            clock: PTSClock::new(),
            sessions: HashMap::new(),
            repeating: None,
            sequence: 0,
            failed: false,
        };

        let handle = std::thread::Builder::new()
            .name("procamera-camera".to_string())
            .spawn(move || worker.run())
            .map_err(|e| CameraError::DeviceUnavailable(format!("camera thread spawn failed: {e}")))?;

        if let Ok(mut log) = self.log.lock() {
            log.opened_devices.push(camera_id.to_string());
        }
        log::debug!("Simulated camera {} opening", camera_id);

        Ok(Box::new(SimulatedDevice {
            id: camera_id.to_string(),
            commands: tx,
            thread: Some(handle),
            log: self.log.clone(),
            faults: self.faults.clone(),
        }))
    }
}

enum Command {
    CreateSession {
        session: SessionId,
        kind: SessionKind,
        surfaces: Vec<Surface>,
    },
    Repeat {
        session: SessionId,
        requests: Vec<CaptureRequest>,
    },
    StopRepeating {
        session: SessionId,
    },
    CloseSession {
        session: SessionId,
    },
    CloseDevice,
}

struct SimulatedDevice {
    id: String,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    log: Arc<Mutex<SimulatedLog>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl CameraDevice for SimulatedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_session(
        &mut self,
        kind: SessionKind,
        outputs: &[Surface],
    ) -> Result<Box<dyn CaptureSession>, CameraError> {
        if outputs.is_empty() {
            return Err(CameraError::SessionConfigurationFailed(
                "a session needs at least one output surface".to_string(),
            ));
        }

        let session = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        self.commands
            .send(Command::CreateSession {
                session,
                kind,
                surfaces: outputs.to_vec(),
            })
            .map_err(|_| CameraError::DeviceDisconnected(self.id.clone()))?;

        if let Ok(mut log) = self.log.lock() {
            log.sessions.push((session, kind));
        }

        Ok(Box::new(SimulatedSession {
            id: session,
            kind,
            device_id: self.id.clone(),
            targets: outputs.iter().map(Surface::id).collect(),
            commands: self.commands.clone(),
            log: self.log.clone(),
            faults: self.faults.clone(),
            closed: false,
        }))
    }

    fn close(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        let _ = self.commands.send(Command::CloseDevice);
        if handle.join().is_err() {
            log::warn!("Simulated camera thread for {} panicked", self.id);
        }
        if let Ok(mut log) = self.log.lock() {
            log.closed_devices.push(self.id.clone());
        }
        log::debug!("Simulated camera {} closed", self.id);
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.close();
    }
}

struct SimulatedSession {
    id: SessionId,
    kind: SessionKind,
    device_id: String,
    targets: Vec<SurfaceId>,
    commands: Sender<Command>,
    log: Arc<Mutex<SimulatedLog>>,
    faults: Arc<Mutex<FaultPlan>>,
    closed: bool,
}

impl SimulatedSession {
    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.closed {
            return Err(CameraError::SessionConfigurationFailed(format!(
                "{} is closed",
                self.id
            )));
        }
        Ok(())
    }

    fn check_targets(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        if request.targets.is_empty() {
            return Err(CameraError::SessionConfigurationFailed(
                "capture request has no target surface".to_string(),
            ));
        }
        if let Some(unknown) = request.targets.iter().find(|t| !self.targets.contains(t)) {
            return Err(CameraError::SessionConfigurationFailed(format!(
                "surface {:?} is not an output of {}",
                unknown, self.id
            )));
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), CameraError> {
        self.commands
            .send(command)
            .map_err(|_| CameraError::DeviceDisconnected(self.device_id.clone()))
    }

    fn teardown_fails(&self) -> bool {
        self.faults
            .lock()
            .map(|f| f.fail_session_teardown)
            .unwrap_or(false)
    }
}

impl CaptureSession for SimulatedSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn kind(&self) -> SessionKind {
        self.kind
    }

    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.kind == SessionKind::HighSpeed {
            return Err(CameraError::SessionConfigurationFailed(
                "high-speed sessions only accept request bursts".to_string(),
            ));
        }
        self.check_targets(request)?;
        if let Ok(mut log) = self.log.lock() {
            log.repeating_requests.push(request.clone());
        }
        self.send(Command::Repeat {
            session: self.id,
            requests: vec![request.clone()],
        })
    }

    fn set_repeating_burst(&mut self, requests: &[CaptureRequest]) -> Result<(), CameraError> {
        self.ensure_open()?;
        if requests.is_empty() {
            return Err(CameraError::SessionConfigurationFailed(
                "empty request burst".to_string(),
            ));
        }
        for request in requests {
            self.check_targets(request)?;
        }
        if let Ok(mut log) = self.log.lock() {
            log.repeating_bursts.push(requests.to_vec());
        }
        self.send(Command::Repeat {
            session: self.id,
            requests: requests.to_vec(),
        })
    }

    fn stop_repeating(&mut self) -> Result<(), CameraError> {
        self.ensure_open()?;
        if let Ok(mut log) = self.log.lock() {
            log.stop_repeating_calls += 1;
        }
        self.send(Command::StopRepeating { session: self.id })?;
        if self.teardown_fails() {
            return Err(CameraError::DeviceError {
                device_id: self.device_id.clone(),
                code: 3,
            });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Ok(mut log) = self.log.lock() {
            log.closed_sessions.push(self.id);
        }
        // The device may already be gone; closing is still complete locally.
        let _ = self.commands.send(Command::CloseSession { session: self.id });
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        let _ = CaptureSession::close(self);
    }
}

struct SessionSlot {
    surfaces: Vec<Surface>,
}

struct Repeating {
    session: SessionId,
    requests: Vec<CaptureRequest>,
    cursor: usize,
    interval: Duration,
    next_frame_at: Instant,
}

struct Worker {
    device_id: String,
    events: EventSender,
    commands: Receiver<Command>,
    log: Arc<Mutex<SimulatedLog>>,
    faults: Arc<Mutex<FaultPlan>>,
    payload: FramePayload,
    characteristics: CameraCharacteristics,
    clock: PTSClock,
    sessions: HashMap<SessionId, SessionSlot>,
    repeating: Option<Repeating>,
    sequence: u64,
    failed: bool,
}

impl Worker {
    fn run(mut self) {
        if self.faults().withhold_opened {
            log::debug!("Simulated camera {} never reports opened", self.device_id);
        } else {
            self.emit(CameraEvent::DeviceOpened {
                device_id: self.device_id.clone(),
            });
        }

        loop {
            let timeout = match &self.repeating {
                Some(r) => r.next_frame_at.saturating_duration_since(Instant::now()),
                None => IDLE_POLL,
            };

            match self.commands.recv_timeout(timeout) {
                Ok(Command::CloseDevice) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.deliver_due_frame();
        }

        self.repeating = None;
        self.sessions.clear();
    }

    fn faults(&self) -> FaultPlan {
        self.faults.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn emit(&self, event: CameraEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Camera event receiver for {} dropped", self.device_id);
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::CreateSession {
                session,
                kind,
                surfaces,
            } => self.create_session(session, kind, surfaces),
            Command::Repeat { session, requests } => {
                if self.failed || !self.sessions.contains_key(&session) {
                    return;
                }
                let fps = requests
                    .first()
                    .and_then(|r| r.ae_target_fps_range)
                    .map(|r| r.max)
                    .unwrap_or(30);
                let interval = frame_interval(fps);
                self.repeating = Some(Repeating {
                    session,
                    requests,
                    cursor: 0,
                    interval,
                    next_frame_at: Instant::now() + interval,
                });
            }
            Command::StopRepeating { session } => {
                if self.repeating.as_ref().is_some_and(|r| r.session == session) {
                    self.repeating = None;
                }
            }
            Command::CloseSession { session } => {
                if self.repeating.as_ref().is_some_and(|r| r.session == session) {
                    self.repeating = None;
                }
                if self.sessions.remove(&session).is_some() {
                    self.emit(CameraEvent::SessionClosed { session });
                }
            }
            Command::CloseDevice => {}
        }
    }

    fn create_session(&mut self, session: SessionId, kind: SessionKind, surfaces: Vec<Surface>) {
        let faults = self.faults();

        let reason = if self.failed {
            Some("camera device is in an error state".to_string())
        } else if faults.fail_configure {
            Some("stream configuration rejected by the camera service".to_string())
        } else {
            self.unsupported_output(kind, &surfaces)
        };

        if let Some(reason) = reason {
            log::debug!("Simulated {} ({}) failed to configure: {}", session, kind, reason);
            self.emit(CameraEvent::SessionConfigureFailed { session, reason });
            return;
        }

        // A new session replaces the previous one, as on real devices.
        if let Some(previous) = self.sessions.keys().copied().next() {
            self.sessions.clear();
            self.repeating = None;
            self.emit(CameraEvent::SessionClosed { session: previous });
        }

        self.sessions.insert(session, SessionSlot { surfaces });
        if faults.withhold_configured {
            log::debug!("Simulated {} never reports configured", session);
            return;
        }
        self.emit(CameraEvent::SessionConfigured { session });
    }

    fn unsupported_output(&self, kind: SessionKind, surfaces: &[Surface]) -> Option<String> {
        match kind {
            SessionKind::HighSpeed => {
                if surfaces.len() > 2 {
                    return Some("high-speed sessions accept at most two outputs".to_string());
                }
                surfaces
                    .iter()
                    .find(|s| {
                        !self
                            .characteristics
                            .high_speed_modes
                            .iter()
                            .any(|m| m.resolution == s.resolution())
                    })
                    .map(|s| format!("{} has no high-speed mode", s.resolution()))
            }
            SessionKind::Standard => surfaces
                .iter()
                .find(|s| {
                    !self
                        .characteristics
                        .standard_resolutions
                        .contains(&s.resolution())
                })
                .map(|s| format!("{} is not a supported output size", s.resolution())),
        }
    }

    fn deliver_due_frame(&mut self) {
        let now = Instant::now();
        let (session, targets) = match self.repeating.as_mut() {
            Some(r) if now >= r.next_frame_at => {
                let request = &r.requests[r.cursor % r.requests.len()];
                r.cursor = r.cursor.wrapping_add(1);
                r.next_frame_at += r.interval;
                if now > r.next_frame_at + r.interval * 4 {
                    // Fell far behind; resynchronise instead of bursting.
                    r.next_frame_at = now + r.interval;
                }
                (r.session, request.targets.clone())
            }
            _ => return,
        };

        if !self.sessions.contains_key(&session) {
            self.repeating = None;
            return;
        }

        self.sequence += 1;
        let sequence = self.sequence;
        let timestamp_us = self.clock.pts_us();
        if let Some(slot) = self.sessions.get(&session) {
            for surface in slot.surfaces.iter().filter(|s| targets.contains(&s.id())) {
                let size = surface.resolution();
                let frame = match self.payload {
                    FramePayload::Timing => {
                        timing_only_frame(size.width, size.height, &self.device_id)
                    }
                    FramePayload::Synthetic => {
                        let mut frame = synthetic_video_frame(sequence, size.width, size.height);
                        frame.device_id = self.device_id.clone();
                        frame
                    }
                };
                surface.submit(frame.with_timing(sequence, timestamp_us));
            }
        }

        if let Ok(mut log) = self.log.lock() {
            log.frames_delivered += 1;
        }
        self.check_frame_faults(sequence);
    }

    /// `delivered` counts frames from this device only
    fn check_frame_faults(&mut self, delivered: u64) {
        let faults = self.faults();

        if faults.disconnect_after_frames.is_some_and(|n| delivered >= n) {
            log::debug!("Simulated camera {} disconnecting", self.device_id);
            self.fail();
            self.emit(CameraEvent::DeviceDisconnected {
                device_id: self.device_id.clone(),
            });
        } else if let Some((n, code)) = faults.error_after_frames {
            if delivered >= n {
                log::debug!("Simulated camera {} raising error {}", self.device_id, code);
                self.fail();
                self.emit(CameraEvent::DeviceError {
                    device_id: self.device_id.clone(),
                    code,
                });
            }
        }
    }

    fn fail(&mut self) {
        self.failed = true;
        self.repeating = None;
    }
}
