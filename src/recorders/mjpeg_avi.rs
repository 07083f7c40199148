extern crate ffmpeg_next as ffmpeg;

use std::path::Path;

use ffmpeg::{
    codec::{self, flag::Flags as CodecFlags},
    encoder,
    format::{self, Pixel},
    Packet, Rational,
};

use crate::types::frame::Frame;
use crate::types::media_formats::VideoCodec;

use super::{
    frame_scaler::{init_ffmpeg, FrameScaler},
    EncoderBackend, RecorderError, RecordingParams, VideoEncoder,
};

// Lambda units per quantizer step, FF_QP2LAMBDA in libavutil.
const QP2LAMBDA: usize = 118;

/// Motion-JPEG frames in an AVI container, the rig's default recording format.
pub struct MjpegAviBackend {
    quality: u8,
}

impl MjpegAviBackend {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    // JPEG quality 100 is quantizer 2, quality 1 is the coarsest quantizer 31.
    fn qscale(&self) -> usize {
        2 + (100 - self.quality as usize) * 29 / 99
    }
}

impl EncoderBackend for MjpegAviBackend {
    fn codec(&self) -> VideoCodec {
        VideoCodec::Mjpeg
    }

    fn open(
        &self,
        path: &Path,
        params: RecordingParams,
    ) -> Result<Box<dyn VideoEncoder>, RecorderError> {
        init_ffmpeg()?;
        Ok(Box::new(MjpegAviEncoder::create(
            path,
            params,
            self.qscale(),
        )?))
    }
}

struct MjpegAviEncoder {
    output: format::context::Output,
    encoder: encoder::video::Encoder,
    scaler: FrameScaler,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    next_pts: i64,
}

impl MjpegAviEncoder {
    fn create(path: &Path, params: RecordingParams, qscale: usize) -> Result<Self, RecorderError> {
        let mut output = format::output_as(&path, "avi")?;
        let codec = encoder::find(codec::Id::MJPEG)
            .ok_or_else(|| RecorderError::Encode("ffmpeg was built without an MJPEG encoder".into()))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let time_base = Rational::new(1, params.fps as i32);
        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        video.set_width(params.resolution.width);
        video.set_height(params.resolution.height);
        video.set_format(Pixel::YUVJ420P);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(Rational::new(params.fps as i32, 1)));
        // Fixed quantizer instead of a bit rate target.
        let mut flags = CodecFlags::QSCALE;
        if global_header {
            flags |= CodecFlags::GLOBAL_HEADER;
        }
        video.set_flags(flags);
        video.set_quality(qscale * QP2LAMBDA);
        let encoder = video.open_as(codec)?;

        let stream_index = {
            let mut stream = output.add_stream(codec)?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            stream.index()
        };
        output.write_header()?;
        // The muxer may pick its own time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(time_base);

        Ok(Self {
            output,
            encoder,
            scaler: FrameScaler::new(Pixel::YUVJ420P, params.resolution),
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            next_pts: 0,
        })
    }

    fn write_pending_packets(&mut self) -> Result<(), RecorderError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet.write_interleaved(&mut self.output)?;
        }
        Ok(())
    }
}

impl VideoEncoder for MjpegAviEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        let mut video_frame = self.scaler.scale(frame)?;
        video_frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;
        self.encoder.send_frame(&video_frame)?;
        self.write_pending_packets()
    }

    fn finish(mut self: Box<Self>) -> Result<(), RecorderError> {
        self.encoder.send_eof()?;
        self.write_pending_packets()?;
        self.output.write_trailer()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::frame::{ColorOrder, Resolution};
    use ffmpeg_next::media::Type;

    struct Playback {
        codec: codec::Id,
        resolution: Resolution,
        time_base: Rational,
        frames: usize,
    }

    fn play(path: &Path) -> Playback {
        let mut input = format::input(&path).unwrap();
        let stream = input.streams().best(Type::Video).unwrap();
        let index = stream.index();
        let time_base = stream.time_base();
        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .unwrap()
            .decoder()
            .video()
            .unwrap();
        let playback = Playback {
            codec: decoder.id(),
            resolution: Resolution::new(decoder.width(), decoder.height()),
            time_base,
            frames: 0,
        };
        let frames = input
            .packets()
            .filter(|(stream, _)| stream.index() == index)
            .count();
        Playback { frames, ..playback }
    }

    fn frame(res: Resolution, order: ColorOrder) -> Frame {
        let len = res.pixel_count() * order.channels();
        Frame::new(res, order, (0..len).map(|i| (i % 251) as u8).collect()).unwrap()
    }

    fn record(path: &Path, params: RecordingParams, frames: &[Frame]) {
        let mut encoder = MjpegAviBackend::new(85).open(path, params).unwrap();
        for frame in frames {
            encoder.write_frame(frame).unwrap();
        }
        encoder.finish().unwrap();
    }

    #[test]
    fn writes_every_colour_order_as_mjpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone_visible.avi");
        let res = Resolution::new(16, 8);
        record(
            &path,
            RecordingParams { resolution: res, fps: 5 },
            &[
                frame(res, ColorOrder::Bgr),
                frame(res, ColorOrder::Rgb),
                frame(res, ColorOrder::Mono),
            ],
        );

        let playback = play(&path);
        assert_eq!(playback.codec, codec::Id::MJPEG);
        assert_eq!(playback.resolution, res);
        assert_eq!(playback.time_base, Rational::new(1, 5));
        assert_eq!(playback.frames, 3);
    }

    #[test]
    fn mismatched_frames_are_scaled_to_the_recording_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resized.avi");
        let target = Resolution::new(8, 6);
        record(
            &path,
            RecordingParams { resolution: target, fps: 5 },
            &[
                frame(Resolution::new(32, 24), ColorOrder::Rgb),
                frame(target, ColorOrder::Rgb),
            ],
        );

        let playback = play(&path);
        assert_eq!(playback.resolution, target);
        assert_eq!(playback.frames, 2);
    }

    #[test]
    fn empty_recording_is_still_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.avi");
        record(
            &path,
            RecordingParams {
                resolution: Resolution::new(4, 4),
                fps: 5,
            },
            &[],
        );
        assert_eq!(play(&path).frames, 0);
    }

    #[test]
    fn quality_maps_onto_the_jpeg_quantizer_range() {
        assert_eq!(MjpegAviBackend::new(100).qscale(), 2);
        assert_eq!(MjpegAviBackend::new(1).qscale(), 31);
        assert_eq!(MjpegAviBackend::new(0).qscale(), 31);
    }
}
