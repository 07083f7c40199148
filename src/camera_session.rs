use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    events::{CameraEvent, CameraEventSink},
    frame_source::{CaptureError, FrameSource},
    preview::{render_preview, PreviewSink},
    recorders::{Recorder, RecorderError, RecordingSummary},
    timer::{frame_period, PeriodicTimer},
    types::frame::Frame,
};

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Live,
    Disconnected,
    FailedToInit,
    Released,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera is not initialized")]
    NotInitialized,
    #[error("camera session has been released")]
    Released,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Recording(#[from] RecorderError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_captured: u64,
    pub frames_recorded: u64,
    pub disconnects: u64,
    pub reconnect_attempts: u64,
}

///
/// Binds one frame source to one recorder and keeps it alive across cable pulls.
///
/// The session is driven by `tick`, which the host event loop calls with the
/// current time. Each poll reads one frame and fans it out to the recorder and
/// the preview sink. A failed read closes the recording, releases the device
/// and starts the reconnect timer, which retries `initialize` at a fixed
/// interval until the camera answers again.
///
pub struct CameraSession {
    name: String,
    source: Box<dyn FrameSource>,
    recorder: Recorder,
    preview: Option<Arc<dyn PreviewSink>>,
    events: Arc<dyn CameraEventSink>,

    state: SessionState,
    is_initialized: bool,
    is_disconnected: bool,

    poll_timer: PeriodicTimer,
    reconnect_timer: PeriodicTimer,

    stats: SessionStats,
}

impl CameraSession {
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn FrameSource>,
        recorder: Recorder,
        events: Arc<dyn CameraEventSink>,
    ) -> Self {
        let poll_interval = frame_period(source.preview_frame_rate());
        Self {
            name: name.into(),
            source,
            recorder,
            preview: None,
            events,
            state: SessionState::Uninitialized,
            is_initialized: false,
            is_disconnected: false,
            poll_timer: PeriodicTimer::new(poll_interval),
            reconnect_timer: PeriodicTimer::new(DEFAULT_RECONNECT_INTERVAL),
            stats: SessionStats::default(),
        }
    }

    pub fn with_preview_sink(mut self, sink: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(sink);
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_timer.set_interval(interval);
        self
    }

    ///
    /// Opens the frame source and starts polling.
    /// On failure the operator is notified once and the reconnect loop takes over.
    /// Succeeding while disconnected ends the disconnect episode like a reconnect would.
    ///
    pub fn initialize(&mut self, now: Instant) -> Result<(), CameraError> {
        if self.state == SessionState::Released {
            return Err(CameraError::Released);
        }
        self.state = SessionState::Initializing;
        match self.source.initialize() {
            Ok(()) => {
                let was_disconnected = self.is_disconnected;
                self.go_live(now);
                log::info!("{} camera is live", self.name);
                if was_disconnected {
                    self.notify_restored();
                }
                Ok(())
            }
            Err(err) => {
                self.stop_capturing();
                self.state = SessionState::FailedToInit;
                self.events.notify(CameraEvent::InitializationFailed {
                    camera: self.name.clone(),
                    reason: err.to_string(),
                });
                self.reconnect_timer.start(now);
                Err(err.into())
            }
        }
    }

    fn go_live(&mut self, now: Instant) {
        self.is_initialized = true;
        self.state = SessionState::Live;
        self.reconnect_timer.stop();
        self.poll_timer
            .set_interval(frame_period(self.source.preview_frame_rate()));
        self.poll_timer.start(now);
        self.is_disconnected = false;
    }

    fn notify_restored(&self) {
        self.events.notify(CameraEvent::Restored {
            camera: self.name.clone(),
        });
    }

    // Polling and recording only run while the source is initialized.
    fn stop_capturing(&mut self) {
        self.poll_timer.stop();
        if let Some(summary) = self.recorder.stop_recording() {
            log::warn!(
                "{} camera lost while recording, closed {} after {} frames",
                self.name,
                summary.path.display(),
                summary.frames_written
            );
        }
        self.is_initialized = false;
    }

    /// Runs whichever of the poll and reconnect timers are due.
    pub fn tick(&mut self, now: Instant) {
        if self.poll_timer.fire_if_due(now) {
            self.poll(now);
        }
        if self.reconnect_timer.fire_if_due(now) {
            self.attempt_reconnect(now);
        }
    }

    fn poll(&mut self, now: Instant) {
        match self.source.capture_frame() {
            Ok(frame) => {
                self.stats.frames_captured += 1;
                self.fan_out(frame);
            }
            Err(err) => self.handle_lost_device(now, err),
        }
    }

    // One read, written to disk in its native order, then converted for display.
    fn fan_out(&mut self, frame: Frame) {
        if self.recorder.is_recording() {
            match self.recorder.write_frame(&frame) {
                Ok(()) => self.stats.frames_recorded += 1,
                Err(err) => {
                    log::error!("{} camera: recording write failed: {}", self.name, err);
                    self.recorder.stop_recording();
                    self.events.notify(CameraEvent::RecordingFailed {
                        camera: self.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if let Some(sink) = &self.preview {
            sink.publish(render_preview(frame, sink.surface_size()));
        }
    }

    fn handle_lost_device(&mut self, now: Instant, err: CaptureError) {
        self.stop_capturing();
        self.source.release_resources();
        self.state = SessionState::Disconnected;

        if !self.is_disconnected {
            self.is_disconnected = true;
            self.stats.disconnects += 1;
            log::warn!("{} camera stopped delivering frames: {}", self.name, err);
            self.events.notify(CameraEvent::Disconnected {
                camera: self.name.clone(),
            });
        }
        if !self.reconnect_timer.is_active() {
            self.reconnect_timer.start(now);
        }
    }

    fn attempt_reconnect(&mut self, now: Instant) {
        self.stats.reconnect_attempts += 1;
        log::debug!(
            "{} camera: reconnect attempt {}",
            self.name,
            self.stats.reconnect_attempts
        );
        match self.source.initialize() {
            Ok(()) => {
                self.go_live(now);
                log::info!("{} camera reconnected", self.name);
                self.notify_restored();
            }
            Err(err) => {
                log::debug!("{} camera still unavailable: {}", self.name, err);
            }
        }
    }

    ///
    /// Starts writing every captured frame to `path` at the source's record
    /// frame rate. An open recording is finalized first.
    ///
    pub fn start_recording(&mut self, path: &Path) -> Result<(), CameraError> {
        if self.state == SessionState::Released {
            return Err(CameraError::Released);
        }
        if !self.is_initialized || !self.source.is_initialized() {
            return Err(CameraError::NotInitialized);
        }
        self.recorder.start_recording(
            path,
            self.source.resolution(),
            self.source.record_frame_rate(),
        )?;
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Option<RecordingSummary> {
        self.recorder.stop_recording()
    }

    /// Stops everything and gives the device back. The session cannot be reused.
    pub fn release(&mut self) {
        if self.state == SessionState::Released {
            return;
        }
        self.recorder.stop_recording();
        self.poll_timer.stop();
        self.reconnect_timer.stop();
        self.source.release_resources();
        self.is_initialized = false;
        self.is_disconnected = false;
        self.state = SessionState::Released;
        log::info!("{} camera session released", self.name);
    }

    /// Makes a pending reconnect attempt run on the next tick.
    pub fn expedite_reconnect(&mut self, now: Instant) {
        self.reconnect_timer.expedite(now);
    }

    /// The earliest time `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.poll_timer.deadline(), self.reconnect_timer.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn is_disconnected(&self) -> bool {
        self.is_disconnected
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_active()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnect_timer.is_active()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_timer.interval()
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_timer.interval()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
