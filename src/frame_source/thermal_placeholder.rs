use crate::palette::{default_palette, Palette};
use crate::settings::CameraSettings;
use crate::types::frame::{ColorOrder, Frame, Resolution};

use super::{CaptureError, FrameSource};

// Sensor size of the common 256x192 USB thermal imagers.
pub const PLACEHOLDER_RESOLUTION: Resolution = Resolution::new(256, 192);

//
// Stand-in for the thermal imager until a real driver exists.
// Always initializes and produces a slowly drifting false-colour gradient so the
// preview and recording paths can be exercised end to end.
//
pub struct ThermalPlaceholder {
    name: String,
    settings: CameraSettings,
    palette: &'static Palette,
    initialized: bool,
    frame_counter: u32,
}

impl ThermalPlaceholder {
    pub fn new(name: impl Into<String>, settings: CameraSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            palette: default_palette(),
            initialized: false,
            frame_counter: 0,
        }
    }

    fn synthesize(&self) -> Vec<u8> {
        let Resolution { width, height } = PLACEHOLDER_RESOLUTION;
        let mut data = Vec::with_capacity(PLACEHOLDER_RESOLUTION.pixel_count() * 3);
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let max_dist = (cx * cx + cy * cy).sqrt();
        let drift = (self.frame_counter % 64) as f32 / 64.0;
        for y in 0..height {
            for x in 0..width {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                // hot spot in the middle, cooling towards the corners
                let heat = 1.0 - (dx * dx + dy * dy).sqrt() / max_dist;
                let v = (heat * 0.8 + drift * 0.2).clamp(0.0, 1.0);
                data.extend_from_slice(&self.palette.map_intensity((v * 255.0) as u8).0);
            }
        }
        data
    }
}

impl FrameSource for ThermalPlaceholder {
    fn initialize(&mut self) -> Result<(), CaptureError> {
        self.initialized = true;
        self.frame_counter = 0;
        log::info!(
            "{} camera uses the placeholder thermal backend ({})",
            self.name,
            PLACEHOLDER_RESOLUTION
        );
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.initialized {
            return Err(CaptureError::NotInitialized);
        }
        self.frame_counter = self.frame_counter.wrapping_add(1);
        Frame::new(PLACEHOLDER_RESOLUTION, ColorOrder::Rgb, self.synthesize())
            .map_err(|err| CaptureError::Sdk(err.to_string()))
    }

    fn release_resources(&mut self) {
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn camera_name(&self) -> String {
        self.name.clone()
    }

    fn resolution(&self) -> Resolution {
        PLACEHOLDER_RESOLUTION
    }

    fn preview_frame_rate(&self) -> u32 {
        self.settings.preview_fps
    }

    fn record_frame_rate(&self) -> u32 {
        self.settings.record_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_fixed_size_frames_once_initialized() {
        let mut cam = ThermalPlaceholder::new("thermal", CameraSettings::default());
        assert_eq!(cam.capture_frame().unwrap_err(), CaptureError::NotInitialized);
        cam.initialize().unwrap();
        let frame = cam.capture_frame().unwrap();
        assert_eq!(frame.resolution(), PLACEHOLDER_RESOLUTION);
        assert_eq!(frame.order(), ColorOrder::Rgb);
        cam.release_resources();
        cam.release_resources();
        assert!(!cam.is_initialized());
    }
}
