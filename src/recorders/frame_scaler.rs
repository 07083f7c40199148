extern crate ffmpeg_next as ffmpeg;

use ffmpeg::{
    format::Pixel,
    software::scaling::{context::Context as ScalingContext, flag::Flags},
    util::frame::video::Video as VideoFrame,
};
use once_cell::race::OnceBool;

use crate::types::frame::{ColorOrder, Frame, Resolution};

use super::RecorderError;

static DID_INIT_FFMPEG: OnceBool = OnceBool::new();

/// Initializes ffmpeg once per process.
pub(crate) fn init_ffmpeg() -> Result<(), RecorderError> {
    DID_INIT_FFMPEG.get_or_try_init(|| {
        video_rs::init().map_err(|err| RecorderError::Encode(err.to_string()))?;
        Ok::<bool, RecorderError>(true)
    })?;
    Ok(())
}

fn pixel_format(order: ColorOrder) -> Pixel {
    match order {
        ColorOrder::Rgb => Pixel::RGB24,
        ColorOrder::Bgr => Pixel::BGR24,
        ColorOrder::Mono => Pixel::GRAY8,
    }
}

///
/// Copies a packed frame into an ffmpeg frame in its native pixel order.
/// ffmpeg pads rows to its own alignment, so rows are copied one by one.
///
fn native_video_frame(frame: &Frame) -> VideoFrame {
    let mut video = VideoFrame::new(pixel_format(frame.order()), frame.width(), frame.height());
    let row_len = frame.width() as usize * frame.channels();
    let stride = video.stride(0);
    let plane = video.data_mut(0);
    for (y, row) in frame.data().chunks_exact(row_len).enumerate() {
        plane[y * stride..y * stride + row_len].copy_from_slice(row);
    }
    video
}

struct Scaler {
    input: (Pixel, Resolution),
    context: ScalingContext,
}

///
/// Converts captured frames to the pixel format and size an encoder expects.
/// The swscale context is rebuilt only when the input geometry or colour order changes.
///
pub(crate) struct FrameScaler {
    output: Pixel,
    target: Resolution,
    scaler: Option<Scaler>,
}

impl FrameScaler {
    pub(crate) fn new(output: Pixel, target: Resolution) -> Self {
        Self {
            output,
            target,
            scaler: None,
        }
    }

    pub(crate) fn scale(&mut self, frame: &Frame) -> Result<VideoFrame, RecorderError> {
        let input = (pixel_format(frame.order()), frame.resolution());
        let mut scaler = match self.scaler.take() {
            Some(scaler) if scaler.input == input => scaler,
            _ => {
                if frame.resolution() != self.target {
                    log::debug!(
                        "Scaling {} frames to the recording size {}",
                        frame.resolution(),
                        self.target
                    );
                }
                Scaler {
                    input,
                    context: ScalingContext::get(
                        input.0,
                        frame.width(),
                        frame.height(),
                        self.output,
                        self.target.width,
                        self.target.height,
                        Flags::BILINEAR,
                    )?,
                }
            }
        };

        let mut converted = VideoFrame::empty();
        let result = scaler.context.run(&native_video_frame(frame), &mut converted);
        self.scaler = Some(scaler);
        result?;
        Ok(converted)
    }
}
