use std::sync::{Arc, Mutex};

use image::{imageops, RgbImage};

use crate::types::frame::{Frame, Resolution};

pub type RepaintCallback = Arc<dyn Fn() + Send + Sync>;

///
/// A drawing surface that shows the most recent frame of one camera.
///
pub trait PreviewSink: Send + Sync {
    ///
    /// Size of the surface the image is fitted into.
    /// `None` publishes frames at their captured size.
    ///
    fn surface_size(&self) -> Option<Resolution>;

    fn publish(&self, image: RgbImage);
}

//
// Single-slot preview: publishing replaces whatever the UI has not picked up yet.
// Frames are never queued, a slow UI just skips them.
//
pub struct LatestFrameSlot {
    surface: Option<Resolution>,
    slot: Mutex<Option<RgbImage>>,
    published: Mutex<u64>,
    on_publish: Option<RepaintCallback>,
}

impl LatestFrameSlot {
    pub fn new(surface: Option<Resolution>) -> Self {
        Self {
            surface,
            slot: Mutex::new(None),
            published: Mutex::new(0),
            on_publish: None,
        }
    }

    pub fn with_repaint_callback(mut self, callback: RepaintCallback) -> Self {
        self.on_publish = Some(callback);
        self
    }

    /// Takes the pending image, if a new one arrived since the last call.
    pub fn take(&self) -> Option<RgbImage> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Number of images published since creation, including replaced ones.
    pub fn published_count(&self) -> u64 {
        self.published.lock().map(|n| *n).unwrap_or(0)
    }
}

impl PreviewSink for LatestFrameSlot {
    fn surface_size(&self) -> Option<Resolution> {
        self.surface
    }

    fn publish(&self, image: RgbImage) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(image);
        }
        if let Ok(mut n) = self.published.lock() {
            *n += 1;
        }
        if let Some(callback) = &self.on_publish {
            callback(); // repaint so that the image can be read out
        }
    }
}

///
/// Converts a captured frame for display: RGB order, scaled to fit the surface
/// with the aspect ratio preserved.
///
pub fn render_preview(frame: Frame, surface: Option<Resolution>) -> RgbImage {
    let img = frame.into_rgb_image();
    let Some(surface) = surface else {
        return img;
    };
    let source = Resolution::new(img.width(), img.height());
    let target = source.fit_within(surface);
    if target == source {
        return img;
    }
    imageops::resize(
        &img,
        target.width,
        target.height,
        imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::frame::ColorOrder;

    fn bgr_frame(res: Resolution) -> Frame {
        Frame::new(res, ColorOrder::Bgr, vec![7; res.pixel_count() * 3]).unwrap()
    }

    #[test]
    fn latest_frame_wins() {
        let repaints = Arc::new(AtomicUsize::new(0));
        let counter = repaints.clone();
        let slot = LatestFrameSlot::new(None).with_repaint_callback(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        slot.publish(RgbImage::new(1, 1));
        slot.publish(RgbImage::new(2, 2));
        let img = slot.take().unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert!(slot.take().is_none());
        assert_eq!(slot.published_count(), 2);
        assert_eq!(repaints.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn preview_is_fitted_to_surface() {
        let img = render_preview(
            bgr_frame(Resolution::new(640, 480)),
            Some(Resolution::new(320, 320)),
        );
        assert_eq!(img.dimensions(), (320, 240));
    }

    #[test]
    fn preview_without_surface_keeps_size() {
        let img = render_preview(bgr_frame(Resolution::new(8, 4)), None);
        assert_eq!(img.dimensions(), (8, 4));
    }
}
