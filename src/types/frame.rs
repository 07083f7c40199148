use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    ///
    /// Largest size with the same aspect ratio as `self` that fits inside `bounds`.
    /// Never returns a zero dimension for a non-empty input.
    ///
    pub fn fit_within(&self, bounds: Resolution) -> Resolution {
        if self.is_empty() || bounds.is_empty() {
            return *self;
        }
        let scale = f64::min(
            bounds.width as f64 / self.width as f64,
            bounds.height as f64 / self.height as f64,
        );
        Resolution::new(
            ((self.width as f64 * scale).round() as u32).max(1),
            ((self.height as f64 * scale).round() as u32).max(1),
        )
    }
}

impl From<[u32; 2]> for Resolution {
    fn from(value: [u32; 2]) -> Self {
        Resolution::new(value[0], value[1])
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

///
/// Byte order of the pixels in a [`Frame`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    Bgr,
    Mono,
}

impl ColorOrder {
    pub fn channels(&self) -> usize {
        match self {
            ColorOrder::Rgb | ColorOrder::Bgr => 3,
            ColorOrder::Mono => 1,
        }
    }
}

#[derive(Debug, Error)]
#[error("frame buffer has {actual} bytes, expected {expected} for {resolution} {order:?}")]
pub struct FrameError {
    pub resolution: Resolution,
    pub order: ColorOrder,
    pub expected: usize,
    pub actual: usize,
}

//
// One captured image, tightly packed, row-major.
// Frames are produced fresh by every capture and are not shared: the recorder
// borrows a frame for the disk write and the preview then consumes it.
//
#[derive(Debug)]
pub struct Frame {
    resolution: Resolution,
    order: ColorOrder,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(
        resolution: Resolution,
        order: ColorOrder,
        data: Vec<u8>,
    ) -> Result<Frame, FrameError> {
        let expected = resolution.pixel_count() * order.channels();
        if data.len() != expected {
            return Err(FrameError {
                resolution,
                order,
                expected,
                actual: data.len(),
            });
        }
        Ok(Frame {
            resolution,
            order,
            data,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    pub fn order(&self) -> ColorOrder {
        self.order
    }

    pub fn channels(&self) -> usize {
        self.order.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    ///
    /// Converts to packed RGB, reusing the buffer when the frame already is RGB.
    ///
    pub fn into_rgb_image(self) -> RgbImage {
        let Resolution { width, height } = self.resolution;
        let data = match self.order {
            ColorOrder::Rgb => self.data,
            ColorOrder::Bgr => {
                let mut data = self.data;
                for px in data.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                data
            }
            ColorOrder::Mono => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        // Length was validated on construction.
        RgbImage::from_raw(width, height, data).unwrap_or_else(|| RgbImage::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_buffer_of_wrong_length() {
        let err = Frame::new(Resolution::new(2, 2), ColorOrder::Bgr, vec![0; 11]).unwrap_err();
        assert_eq!(err.expected, 12);
        assert_eq!(err.actual, 11);
    }

    #[test]
    fn bgr_frame_converts_to_rgb() {
        let frame = Frame::new(Resolution::new(1, 1), ColorOrder::Bgr, vec![1, 2, 3]).unwrap();
        let img = frame.into_rgb_image();
        assert_eq!(img.as_raw(), &vec![3, 2, 1]);
    }

    #[test]
    fn mono_frame_expands_to_grey() {
        let frame = Frame::new(Resolution::new(2, 1), ColorOrder::Mono, vec![10, 200]).unwrap();
        assert_eq!(frame.data(), &[10, 200]);
        assert_eq!(frame.into_rgb_image().as_raw(), &vec![10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        let src = Resolution::new(640, 480);
        assert_eq!(src.fit_within(Resolution::new(320, 320)), Resolution::new(320, 240));
        assert_eq!(src.fit_within(Resolution::new(1000, 300)), Resolution::new(400, 300));
        assert_eq!(Resolution::new(256, 192).fit_within(Resolution::new(512, 512)), Resolution::new(512, 384));
    }
}
