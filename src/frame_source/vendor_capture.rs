use std::{sync::Arc, time::Duration};

use crate::palette::{default_palette, Palette};
use crate::settings::CameraSettings;
use crate::types::frame::{ColorOrder, Frame, Resolution};
use crate::vendor_sdk::{VendorDevice, VendorError, VendorImage, VendorPixelFormat, VendorSdk};

use super::{CaptureError, FrameSource};

// Colour layouts in order of preference, monochrome is the last resort.
const PREFERRED_FORMATS: [VendorPixelFormat; 3] = [
    VendorPixelFormat::Bgr8,
    VendorPixelFormat::Rgb8,
    VendorPixelFormat::Mono8,
];

struct SystemHandle {
    sdk: Arc<dyn VendorSdk>,
}

impl Drop for SystemHandle {
    fn drop(&mut self) {
        if let Err(err) = self.sdk.release_system() {
            log::error!("Vendor SDK system release failed: {}", err);
        }
    }
}

struct CameraListHandle {
    sdk: Arc<dyn VendorSdk>,
}

impl Drop for CameraListHandle {
    fn drop(&mut self) {
        self.sdk.clear_camera_list();
    }
}

// Owns the bound camera, ending the stream before de-initializing it.
struct DeviceHandle {
    device: Box<dyn VendorDevice>,
    initialized: bool,
    streaming: bool,
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if self.streaming {
            self.device.end_acquisition();
        }
        if self.initialized {
            self.device.deinit();
        }
    }
}

//
// The live driver objects of one session.
// Fields drop in declaration order, which is the reverse of acquisition:
// stream and camera first, then the camera list, then the system.
//
struct Acquisition {
    device: DeviceHandle,
    _camera_list: CameraListHandle,
    _system: SystemHandle,
}

///
/// Frame source for the vendor SDK based industrial camera.
/// Binds to the first enumerated camera.
///
pub struct VendorSdkCapture {
    name: String,
    settings: CameraSettings,
    sdk: Arc<dyn VendorSdk>,
    timeout: Duration,
    palette: &'static Palette,
    acquisition: Option<Acquisition>,
    warned_unsupported_format: bool,
}

impl VendorSdkCapture {
    pub fn new(
        name: impl Into<String>,
        settings: CameraSettings,
        sdk: Arc<dyn VendorSdk>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            sdk,
            timeout,
            palette: default_palette(),
            acquisition: None,
            warned_unsupported_format: false,
        }
    }

    fn acquire(&self) -> Result<Acquisition, CaptureError> {
        self.sdk.acquire_system().map_err(sdk_error)?;
        let system = SystemHandle {
            sdk: self.sdk.clone(),
        };

        let cameras = self.sdk.camera_list().map_err(sdk_error)?;
        let camera_list = CameraListHandle {
            sdk: self.sdk.clone(),
        };
        log::debug!("Vendor SDK enumerated {} camera(s)", cameras.len());

        // Locals are dropped in reverse order on early return, same teardown as Acquisition.
        let Some(device) = cameras.into_iter().next() else {
            return Err(CaptureError::DeviceNotFound);
        };
        let mut device = DeviceHandle {
            device,
            initialized: false,
            streaming: false,
        };

        device.device.init().map_err(sdk_error)?;
        device.initialized = true;

        self.configure(device.device.as_mut())?;

        device.device.begin_acquisition().map_err(sdk_error)?;
        device.streaming = true;

        Ok(Acquisition {
            device,
            _camera_list: camera_list,
            _system: system,
        })
    }

    fn configure(&self, device: &mut dyn VendorDevice) -> Result<(), CaptureError> {
        let available = device.pixel_formats();
        match negotiate_pixel_format(&available) {
            Some(format) => {
                device.set_pixel_format(&format).map_err(sdk_error)?;
                if format == VendorPixelFormat::Mono8 {
                    log::info!(
                        "{} camera only offers monochrome output, mapping to pseudocolor",
                        self.name
                    );
                }
            }
            None => log::warn!(
                "{} camera offers none of the known pixel formats ({:?}), keeping device default",
                self.name,
                available
            ),
        }

        // Offsets from a previous session must be cleared and the ROI opened up
        // before the requested size, otherwise the device rejects the size.
        device.set_offset(0, 0).map_err(sdk_error)?;
        let max = device.max_size();
        device.set_size(max).map_err(sdk_error)?;

        let requested = self.settings.resolution();
        let size = if requested.width > max.width || requested.height > max.height {
            log::warn!(
                "{} camera: requested {} exceeds sensor maximum {}, using maximum",
                self.name,
                requested,
                max
            );
            max
        } else {
            requested
        };
        device.set_size(size).map_err(sdk_error)?;

        if let Err(err) = device.set_frame_rate(self.settings.preview_fps as f64) {
            log::warn!("{} camera rejected frame rate: {}", self.name, err);
        }
        Ok(())
    }

    fn image_to_frame(&mut self, image: VendorImage) -> Result<Frame, CaptureError> {
        let resolution = Resolution::new(image.width, image.height);
        let frame = match &image.format {
            VendorPixelFormat::Bgr8 => Frame::new(resolution, ColorOrder::Bgr, image.data),
            VendorPixelFormat::Rgb8 => Frame::new(resolution, ColorOrder::Rgb, image.data),
            VendorPixelFormat::Mono8 => Frame::new(
                resolution,
                ColorOrder::Rgb,
                self.palette.colorize(&image.data),
            ),
            VendorPixelFormat::Other(name) => {
                if !self.warned_unsupported_format {
                    self.warned_unsupported_format = true;
                    log::warn!(
                        "{} camera delivers unsupported pixel format {}, interpreting as BGR",
                        self.name,
                        name
                    );
                }
                Frame::new(resolution, ColorOrder::Bgr, image.data)
            }
        };
        frame.map_err(|err| CaptureError::Sdk(err.to_string()))
    }

    pub fn model_name(&self) -> Option<String> {
        self.acquisition
            .as_ref()
            .map(|acq| acq.device.device.model_name())
    }
}

fn sdk_error(err: VendorError) -> CaptureError {
    match err {
        VendorError::Timeout(_) => CaptureError::Timeout,
        other => CaptureError::Sdk(other.to_string()),
    }
}

pub fn negotiate_pixel_format(available: &[VendorPixelFormat]) -> Option<VendorPixelFormat> {
    PREFERRED_FORMATS
        .iter()
        .find(|f| available.contains(*f))
        .cloned()
}

impl FrameSource for VendorSdkCapture {
    fn initialize(&mut self) -> Result<(), CaptureError> {
        self.release_resources();
        if !self.sdk.is_available() {
            return Err(CaptureError::BackendUnavailable(
                "vendor driver not available".to_string(),
            ));
        }
        let acquisition = self.acquire().inspect_err(|err| {
            log::warn!("Failed to initialize {} camera via vendor SDK: {}", self.name, err);
        })?;
        log::info!(
            "Opened {} camera via vendor SDK: {}",
            self.name,
            acquisition.device.device.model_name()
        );
        self.acquisition = Some(acquisition);
        self.warned_unsupported_format = false;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let acquisition = self
            .acquisition
            .as_mut()
            .ok_or(CaptureError::NotInitialized)?;
        let image = acquisition
            .device
            .device
            .next_image(self.timeout)
            .map_err(sdk_error)?;
        self.image_to_frame(image)
    }

    fn release_resources(&mut self) {
        if self.acquisition.take().is_some() {
            log::info!("Released {} camera (vendor SDK)", self.name);
        }
    }

    fn is_initialized(&self) -> bool {
        self.acquisition.is_some()
    }

    fn camera_name(&self) -> String {
        self.name.clone()
    }

    fn resolution(&self) -> Resolution {
        self.settings.resolution()
    }

    fn preview_frame_rate(&self) -> u32 {
        self.settings.preview_fps
    }

    fn record_frame_rate(&self) -> u32 {
        self.settings.record_fps
    }
}

impl Drop for VendorSdkCapture {
    fn drop(&mut self) {
        self.release_resources();
    }
}
