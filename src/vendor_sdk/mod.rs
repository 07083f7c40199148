//! Binding surface of the industrial camera vendor's driver.
//!
//! The driver models its objects as nested, reference counted acquisitions:
//! system → camera list → camera → acquisition stream. Each level must be
//! released before the one that produced it, otherwise the system singleton
//! stays referenced and cannot be acquired again in the same process.
//!
//! A concrete binding implements [`VendorSdk`] and [`VendorDevice`];
//! [`simulated::SimulatedVendorSdk`] is a pure software implementation.

use std::time::Duration;

use thiserror::Error;

use crate::types::frame::Resolution;

pub mod simulated;

pub use simulated::{SimDeviceSpec, SimulatedVendorSdk};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VendorError {
    #[error("{0}")]
    Call(String),
    #[error("image fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("incomplete image")]
    IncompleteImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorPixelFormat {
    Bgr8,
    Rgb8,
    Mono8,
    Other(String),
}

pub struct VendorImage {
    pub width: u32,
    pub height: u32,
    pub format: VendorPixelFormat,
    pub data: Vec<u8>,
}

pub trait VendorSdk: Send + Sync {
    /// Whether the driver library is present on this machine.
    fn is_available(&self) -> bool;

    fn acquire_system(&self) -> Result<(), VendorError>;

    fn release_system(&self) -> Result<(), VendorError>;

    ///
    /// Enumerates cameras. The returned list holds a reference on the system
    /// until `clear_camera_list` is called.
    ///
    fn camera_list(&self) -> Result<Vec<Box<dyn VendorDevice>>, VendorError>;

    fn clear_camera_list(&self);
}

pub trait VendorDevice: Send {
    fn model_name(&self) -> String;

    fn init(&mut self) -> Result<(), VendorError>;
    fn deinit(&mut self);

    fn pixel_formats(&self) -> Vec<VendorPixelFormat>;
    fn set_pixel_format(&mut self, format: &VendorPixelFormat) -> Result<(), VendorError>;

    fn set_offset(&mut self, x: u32, y: u32) -> Result<(), VendorError>;
    fn max_size(&self) -> Resolution;
    fn set_size(&mut self, size: Resolution) -> Result<(), VendorError>;
    fn set_frame_rate(&mut self, fps: f64) -> Result<(), VendorError>;

    fn begin_acquisition(&mut self) -> Result<(), VendorError>;
    fn end_acquisition(&mut self);

    fn next_image(&mut self, timeout: Duration) -> Result<VendorImage, VendorError>;
}
