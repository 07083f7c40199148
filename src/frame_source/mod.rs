use thiserror::Error;

use crate::types::frame::{Frame, Resolution};

pub mod generic_capture;
pub mod thermal_placeholder;
pub mod vendor_capture;

pub use generic_capture::GenericCapture;
pub use thermal_placeholder::ThermalPlaceholder;
pub use vendor_capture::VendorSdkCapture;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("no camera device found")]
    DeviceNotFound,
    #[error("device stopped delivering frames")]
    Disconnected,
    #[error("timed out waiting for a frame")]
    Timeout,
    #[error("capture backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("camera SDK error: {0}")]
    Sdk(String),
    #[error("frame source is not initialized")]
    NotInitialized,
}

///
/// A physical (or synthetic) camera producing one image per poll.
///
/// Implementations own their device handle exclusively. None of the methods
/// panic or propagate backend failures in any other form than `CaptureError`.
///
pub trait FrameSource: Send {
    ///
    /// Opens the device and applies resolution / frame rate.
    /// On failure the source is left in a clean, uninitialized state and can be
    /// initialized again later.
    ///
    fn initialize(&mut self) -> Result<(), CaptureError>;

    ///
    /// Reads one frame. Blocks at most for one bounded device call.
    /// A failed read is reported, never retried here.
    ///
    fn capture_frame(&mut self) -> Result<Frame, CaptureError>;

    ///
    /// Closes the device. Safe to call repeatedly and on a source that was
    /// never initialized.
    ///
    fn release_resources(&mut self);

    fn is_initialized(&self) -> bool;

    fn camera_name(&self) -> String;

    /// Configured capture resolution, also used as the recording geometry.
    fn resolution(&self) -> Resolution;

    fn preview_frame_rate(&self) -> u32;

    fn record_frame_rate(&self) -> u32;
}
