use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::types::frame::{Frame, Resolution};
use crate::types::media_formats::VideoCodec;

mod frame_scaler;
pub mod h264;
pub mod mjpeg_avi;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
    #[error("invalid recording geometry {resolution} at {fps} fps")]
    InvalidGeometry { resolution: Resolution, fps: u32 },
}

impl RecorderError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        RecorderError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingParams {
    pub resolution: Resolution,
    pub fps: u32,
}

///
/// An open video container. Frames are appended in order, `finish` writes
/// the trailing index and final headers.
///
pub trait VideoEncoder: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError>;

    fn finish(self: Box<Self>) -> Result<(), RecorderError>;
}

pub trait EncoderBackend: Send {
    fn codec(&self) -> VideoCodec;

    fn open(
        &self,
        path: &Path,
        params: RecordingParams,
    ) -> Result<Box<dyn VideoEncoder>, RecorderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub frames_written: u64,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// False if the container could not be finalized cleanly.
    pub finalized: bool,
}

struct ActiveRecording {
    encoder: Box<dyn VideoEncoder>,
    path: PathBuf,
    frames_written: u64,
    started_at: DateTime<Local>,
}

///
/// The single video writer of a camera session.
/// At most one container is open at a time: starting a new recording
/// finalizes the previous one first.
///
pub struct Recorder {
    backend: Box<dyn EncoderBackend>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(backend: Box<dyn EncoderBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Recorder writing Motion-JPEG AVI files.
    pub fn mjpeg(quality: u8) -> Self {
        Self::new(Box::new(mjpeg_avi::MjpegAviBackend::new(quality)))
    }

    pub fn h264() -> Self {
        Self::new(Box::new(h264::H264Backend))
    }

    pub fn codec(&self) -> VideoCodec {
        self.backend.codec()
    }

    pub fn start_recording(
        &mut self,
        path: &Path,
        resolution: Resolution,
        fps: u32,
    ) -> Result<(), RecorderError> {
        if self.active.is_some() {
            log::info!(
                "Recording started while another is open, finalizing {} first",
                self.current_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
            self.stop_recording();
        }

        if resolution.is_empty() || fps == 0 {
            return Err(RecorderError::InvalidGeometry { resolution, fps });
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|err| RecorderError::io(dir, err))?;
        }

        let params = RecordingParams { resolution, fps };
        let encoder = self.backend.open(path, params)?;
        log::info!(
            "Recording {} ({}, {} @ {} fps)",
            path.display(),
            self.backend.codec().name(),
            resolution,
            fps
        );
        self.active = Some(ActiveRecording {
            encoder,
            path: path.to_path_buf(),
            frames_written: 0,
            started_at: Local::now(),
        });
        Ok(())
    }

    /// Appends a frame to the open recording, does nothing when idle.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        active.encoder.write_frame(frame)?;
        active.frames_written += 1;
        Ok(())
    }

    ///
    /// Finalizes and closes the open recording. Returns `None` if nothing
    /// was being recorded.
    ///
    pub fn stop_recording(&mut self) -> Option<RecordingSummary> {
        let active = self.active.take()?;
        let finalized = match active.encoder.finish() {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to finalize {}: {}", active.path.display(), err);
                false
            }
        };
        let finished_at = Local::now();
        log::info!(
            "Stopped recording {}: {} frames in {:.1} s",
            active.path.display(),
            active.frames_written,
            (finished_at - active.started_at).num_milliseconds() as f64 / 1000.0
        );
        Some(RecordingSummary {
            path: active.path,
            frames_written: active.frames_written,
            started_at: active.started_at,
            finished_at,
            finalized,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn state(&self) -> RecorderState {
        if self.active.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    pub fn frames_written(&self) -> u64 {
        self.active.as_ref().map(|a| a.frames_written).unwrap_or(0)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop_recording();
    }
}
