use std::sync::Arc;

use crate::settings::CameraSettings;
use crate::types::frame::{Frame, Resolution};

use super::{CaptureError, FrameSource};

///
/// An opened video device delivering decoded frames.
///
pub trait CaptureDevice: Send {
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Stops streaming. Called once before the device is dropped.
    fn close(&mut self) {}
}

pub type DeviceOpener =
    Arc<dyn Fn(u32, &CameraSettings) -> Result<Box<dyn CaptureDevice>, CaptureError> + Send + Sync>;

//
// Frame source for plain USB/UVC cameras, addressed by device index.
// Resolution and frame rate are requested on open, the device may pick the
// closest mode it supports.
//
pub struct GenericCapture {
    name: String,
    settings: CameraSettings,
    opener: DeviceOpener,
    device: Option<Box<dyn CaptureDevice>>,
}

impl GenericCapture {
    pub fn new(name: impl Into<String>, settings: CameraSettings) -> Self {
        Self::with_opener(name, settings, native_opener())
    }

    pub fn with_opener(
        name: impl Into<String>,
        settings: CameraSettings,
        opener: DeviceOpener,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            opener,
            device: None,
        }
    }

    pub fn device_index(&self) -> u32 {
        self.settings.device_index
    }
}

impl FrameSource for GenericCapture {
    fn initialize(&mut self) -> Result<(), CaptureError> {
        self.release_resources();
        let device = (self.opener)(self.settings.device_index, &self.settings).inspect_err(|err| {
            log::warn!(
                "Failed to open {} camera at index {}: {}",
                self.name,
                self.settings.device_index,
                err
            );
        })?;
        self.device = Some(device);
        log::info!(
            "Opened {} camera at index {} ({} @ {} fps)",
            self.name,
            self.settings.device_index,
            self.settings.resolution(),
            self.settings.preview_fps
        );
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let device = self.device.as_mut().ok_or(CaptureError::NotInitialized)?;
        // a failed read almost always means the cable was pulled
        device.read_frame().map_err(|err| {
            log::debug!("{} camera read failed: {}", self.name, err);
            match err {
                CaptureError::Timeout => CaptureError::Timeout,
                _ => CaptureError::Disconnected,
            }
        })
    }

    fn release_resources(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
            log::info!("Released {} camera at index {}", self.name, self.settings.device_index);
        }
    }

    fn is_initialized(&self) -> bool {
        self.device.is_some()
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

impl Drop for GenericCapture {
    fn drop(&mut self) {
        self.release_resources();
    }
}

#[cfg(feature = "native-capture")]
pub fn native_opener() -> DeviceOpener {
    Arc::new(|index: u32, settings: &CameraSettings| native::open(index, settings))
}

#[cfg(not(feature = "native-capture"))]
pub fn native_opener() -> DeviceOpener {
    Arc::new(|_index: u32, _settings: &CameraSettings| {
        Err::<Box<dyn CaptureDevice>, _>(CaptureError::BackendUnavailable(
            "built without the native-capture feature".to_string(),
        ))
    })
}

#[cfg(feature = "native-capture")]
mod native {
    use nokhwa::{
        pixel_format::RgbFormat,
        utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
        Camera,
    };

    use crate::settings::CameraSettings;
    use crate::types::frame::{ColorOrder, Frame, Resolution};

    use super::{CaptureDevice, CaptureError};

    pub struct NokhwaDevice {
        camera: Camera,
    }

    pub fn open(index: u32, settings: &CameraSettings) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let res = settings.resolution();
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                nokhwa::utils::Resolution::new(res.width, res.height),
                FrameFormat::MJPEG,
                settings.preview_fps,
            ),
        ));
        let mut camera = Camera::new(CameraIndex::Index(index), format).map_err(|err| {
            log::debug!("nokhwa could not open index {}: {}", index, err);
            CaptureError::DeviceNotFound
        })?;
        camera
            .open_stream()
            .map_err(|err| CaptureError::Sdk(err.to_string()))?;
        Ok(Box::new(NokhwaDevice { camera }))
    }

    impl CaptureDevice for NokhwaDevice {
        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            let buffer = self
                .camera
                .frame()
                .map_err(|err| CaptureError::Sdk(err.to_string()))?;
            let img = buffer
                .decode_image::<RgbFormat>()
                .map_err(|err| CaptureError::Sdk(err.to_string()))?;
            let (width, height) = (img.width(), img.height());
            Frame::new(
                Resolution::new(width, height),
                ColorOrder::Rgb,
                img.into_raw(),
            )
            .map_err(|err| CaptureError::Sdk(err.to_string()))
        }

        fn close(&mut self) {
            if let Err(err) = self.camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", err);
            }
        }
    }
}
