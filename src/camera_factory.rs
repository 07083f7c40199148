use std::{str::FromStr, sync::Arc};

use thiserror::Error;

use crate::{
    camera_registry::CameraRegistry,
    camera_session::CameraSession,
    events::CameraEventSink,
    frame_source::{
        generic_capture::{native_opener, DeviceOpener},
        FrameSource, GenericCapture, ThermalPlaceholder, VendorSdkCapture,
    },
    recorders::Recorder,
    settings::{RigSettings, ThermalBackend},
    types::{camera_role::CameraRole, media_formats::VideoCodec},
    vendor_sdk::VendorSdk,
};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unknown camera role '{0}', expected 'visible' or 'thermal'")]
    UnknownRole(String),
}

///
/// Builds frame sources, recorders and sessions from the rig settings.
/// The backend of each role is decided here once, sessions only see `FrameSource`.
///
pub struct CameraFactory {
    settings: RigSettings,
    vendor_sdk: Option<Arc<dyn VendorSdk>>,
    generic_opener: DeviceOpener,
}

impl CameraFactory {
    pub fn new(settings: RigSettings) -> Self {
        Self {
            settings,
            vendor_sdk: None,
            generic_opener: native_opener(),
        }
    }

    pub fn with_vendor_sdk(mut self, sdk: Arc<dyn VendorSdk>) -> Self {
        self.vendor_sdk = Some(sdk);
        self
    }

    /// Replaces how generic (UVC) devices are opened.
    pub fn with_generic_opener(mut self, opener: DeviceOpener) -> Self {
        self.generic_opener = opener;
        self
    }

    pub fn settings(&self) -> &RigSettings {
        &self.settings
    }

    pub fn create_camera(&self, role: &str) -> Result<Box<dyn FrameSource>, FactoryError> {
        let role =
            CameraRole::from_str(role).map_err(|_| FactoryError::UnknownRole(role.to_string()))?;
        Ok(self.create_for_role(role))
    }

    pub fn create_for_role(&self, role: CameraRole) -> Box<dyn FrameSource> {
        let settings = self.settings.camera(role).clone();
        match role {
            CameraRole::Visible => {
                if settings.prefer_vendor_sdk {
                    match &self.vendor_sdk {
                        Some(sdk) if sdk.is_available() => {
                            log::info!("Using vendor SDK for the {} camera", role);
                            return Box::new(VendorSdkCapture::new(
                                role.name(),
                                settings,
                                sdk.clone(),
                                self.settings.vendor_capture_timeout(),
                            ));
                        }
                        _ => log::info!(
                            "Vendor SDK not available, using device index {} for the {} camera",
                            settings.device_index,
                            role
                        ),
                    }
                }
                Box::new(GenericCapture::with_opener(
                    role.name(),
                    settings,
                    self.generic_opener.clone(),
                ))
            }
            CameraRole::Thermal => match self.settings.thermal_backend {
                ThermalBackend::Placeholder => Box::new(ThermalPlaceholder::new(role.name(), settings)),
                ThermalBackend::Generic => Box::new(GenericCapture::with_opener(
                    role.name(),
                    settings,
                    self.generic_opener.clone(),
                )),
            },
        }
    }

    pub fn create_recorder(&self) -> Recorder {
        match self.settings.recording.codec {
            VideoCodec::Mjpeg => Recorder::mjpeg(self.settings.recording.jpeg_quality),
            VideoCodec::H264 => Recorder::h264(),
        }
    }

    pub fn create_session(
        &self,
        role: &str,
        events: Arc<dyn CameraEventSink>,
    ) -> Result<CameraSession, FactoryError> {
        let source = self.create_camera(role)?;
        let recorder = self.create_recorder();
        Ok(CameraSession::new(role, source, recorder, events)
            .with_reconnect_interval(self.settings.reconnect_interval()))
    }

    /// A registry holding one session per camera role.
    pub fn create_registry(
        &self,
        events: Arc<dyn CameraEventSink>,
    ) -> Result<CameraRegistry, FactoryError> {
        let mut registry = CameraRegistry::new();
        for role in [CameraRole::Visible, CameraRole::Thermal] {
            registry.add_camera(role.name(), self.create_session(role.name(), events.clone())?);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        events::LogEventSink,
        frame_source::{generic_capture::CaptureDevice, thermal_placeholder::PLACEHOLDER_RESOLUTION, CaptureError},
        settings::CameraSettings,
        vendor_sdk::{SimDeviceSpec, SimulatedVendorSdk},
    };

    fn counting_opener(opened: Arc<AtomicUsize>) -> DeviceOpener {
        Arc::new(move |_index: u32, _settings: &CameraSettings| {
            opened.fetch_add(1, Ordering::SeqCst);
            Err::<Box<dyn CaptureDevice>, _>(CaptureError::DeviceNotFound)
        })
    }

    #[test]
    fn unknown_role_is_an_error() {
        let factory = CameraFactory::new(RigSettings::default());
        assert!(matches!(
            factory.create_camera("infrared"),
            Err(FactoryError::UnknownRole(role)) if role == "infrared"
        ));
    }

    #[test]
    fn visible_prefers_available_vendor_sdk() {
        let sdk = SimulatedVendorSdk::new(vec![SimDeviceSpec::color("BFS")]);
        let opened = Arc::new(AtomicUsize::new(0));
        let factory = CameraFactory::new(RigSettings::default())
            .with_vendor_sdk(Arc::new(sdk.clone()))
            .with_generic_opener(counting_opener(opened.clone()));

        let mut cam = factory.create_camera("visible").unwrap();
        cam.initialize().unwrap();
        assert!(sdk.calls().contains(&"begin_acquisition".to_string()));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn visible_falls_back_to_generic_capture() {
        let sdk = SimulatedVendorSdk::new(vec![SimDeviceSpec::color("BFS")]);
        sdk.set_available(false);
        let opened = Arc::new(AtomicUsize::new(0));
        let factory = CameraFactory::new(RigSettings::default())
            .with_vendor_sdk(Arc::new(sdk.clone()))
            .with_generic_opener(counting_opener(opened.clone()));

        let mut cam = factory.create_camera("visible").unwrap();
        assert_eq!(cam.initialize(), Err(CaptureError::DeviceNotFound));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn thermal_uses_placeholder_by_default() {
        let factory = CameraFactory::new(RigSettings::default());
        let mut cam = factory.create_camera("thermal").unwrap();
        cam.initialize().unwrap();
        assert_eq!(cam.resolution(), PLACEHOLDER_RESOLUTION);
        assert_eq!(cam.camera_name(), "thermal");
    }

    #[test]
    fn registry_has_both_roles() {
        let factory = CameraFactory::new(RigSettings::default());
        let registry = factory.create_registry(Arc::new(LogEventSink)).unwrap();
        assert_eq!(registry.names(), vec!["thermal".to_string(), "visible".to_string()]);
    }

    #[test]
    fn recorder_follows_configured_codec() {
        let mut settings = RigSettings::default();
        assert_eq!(
            CameraFactory::new(settings.clone()).create_recorder().codec(),
            VideoCodec::Mjpeg
        );
        settings.recording.codec = VideoCodec::H264;
        assert_eq!(
            CameraFactory::new(settings).create_recorder().codec(),
            VideoCodec::H264
        );
    }
}
