use std::path::Path;

use video_rs::encode::Settings;
use video_rs::ffmpeg::format::Pixel;
use video_rs::time::Time;
use video_rs::Encoder;

use crate::types::frame::Frame;
use crate::types::media_formats::VideoCodec;

use super::{
    frame_scaler::{init_ffmpeg, FrameScaler},
    EncoderBackend, RecorderError, RecordingParams, VideoEncoder,
};

/// H.264 through video-rs, for long sessions where MJPEG files grow too large.
pub struct H264Backend;

impl EncoderBackend for H264Backend {
    fn codec(&self) -> VideoCodec {
        VideoCodec::H264
    }

    fn open(
        &self,
        path: &Path,
        params: RecordingParams,
    ) -> Result<Box<dyn VideoEncoder>, RecorderError> {
        init_ffmpeg()?;

        let preset = Settings::preset_h264_yuv420p(
            params.resolution.width as usize,
            params.resolution.height as usize,
            false,
        );
        let encoder = Encoder::new(path.to_path_buf(), preset)
            .map_err(|err| RecorderError::Encode(format!("failed to create encoder: {}", err)))?;

        Ok(Box::new(H264Encoder {
            encoder,
            // video-rs converts from packed RGB itself
            scaler: FrameScaler::new(Pixel::RGB24, params.resolution),
            frame_duration: Time::from_nth_of_a_second(params.fps as usize),
            position: Time::zero(),
        }))
    }
}

struct H264Encoder {
    encoder: Encoder,
    scaler: FrameScaler,
    frame_duration: Time,
    position: Time,
}

impl VideoEncoder for H264Encoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        let mut video_frame = self.scaler.scale(frame)?;
        video_frame.set_pts(
            self.position
                .with_time_base(self.encoder.time_base())
                .into_value(),
        );
        self.encoder
            .encode_raw(video_frame)
            .map_err(|err| RecorderError::Encode(format!("failed to encode frame: {}", err)))?;
        self.position = self.position.aligned_with(&self.frame_duration).add();
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), RecorderError> {
        self.encoder
            .finish()
            .map_err(|err| RecorderError::Encode(format!("failed to finish encoding: {}", err)))
    }
}
