#![allow(dead_code)]

extern crate ffmpeg_next as ffmpeg;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use image::RgbImage;

use thermal_rig::{
    preview::PreviewSink,
    recorders::{EncoderBackend, RecorderError, RecordingParams, VideoEncoder},
    types::media_formats::VideoCodec,
    CameraEvent, CameraEventSink, CaptureError, ColorOrder, Frame, FrameSource, Recorder,
    Resolution,
};

pub const SOURCE_RESOLUTION: Resolution = Resolution::new(4, 2);

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[derive(Debug, Default)]
pub struct SourceState {
    pub device_present: bool,
    pub open: bool,
    pub frame_counter: u8,
    pub init_calls: u32,
    pub successful_inits: u32,
    pub handles_released: u32,
    pub release_calls: u32,
}

///
/// Frame source whose device presence is switched from the test.
/// Every frame is filled with its sequence number.
///
pub struct ScriptedSource {
    name: String,
    state: Arc<Mutex<SourceState>>,
}

#[derive(Clone)]
pub struct SourceControl(Arc<Mutex<SourceState>>);

impl SourceControl {
    pub fn plug(&self) {
        self.0.lock().unwrap().device_present = true;
    }

    pub fn unplug(&self) {
        self.0.lock().unwrap().device_present = false;
    }

    pub fn state<R>(&self, f: impl FnOnce(&SourceState) -> R) -> R {
        f(&self.0.lock().unwrap())
    }
}

impl ScriptedSource {
    pub fn new(name: &str, device_present: bool) -> (Self, SourceControl) {
        let state = Arc::new(Mutex::new(SourceState {
            device_present,
            ..Default::default()
        }));
        (
            Self {
                name: name.to_string(),
                state: state.clone(),
            },
            SourceControl(state),
        )
    }
}

impl FrameSource for ScriptedSource {
    fn initialize(&mut self) -> Result<(), CaptureError> {
        let mut s = self.state.lock().unwrap();
        s.init_calls += 1;
        if s.open {
            s.open = false;
            s.handles_released += 1;
        }
        if !s.device_present {
            return Err(CaptureError::DeviceNotFound);
        }
        s.open = true;
        s.successful_inits += 1;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let mut s = self.state.lock().unwrap();
        if !s.open {
            return Err(CaptureError::NotInitialized);
        }
        if !s.device_present {
            return Err(CaptureError::Disconnected);
        }
        s.frame_counter = s.frame_counter.wrapping_add(1);
        let len = SOURCE_RESOLUTION.pixel_count() * 3;
        Ok(Frame::new(SOURCE_RESOLUTION, ColorOrder::Rgb, vec![s.frame_counter; len]).unwrap())
    }

    fn release_resources(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.release_calls += 1;
        if s.open {
            s.open = false;
            s.handles_released += 1;
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn camera_name(&self) -> String {
        self.name.clone()
    }

    fn resolution(&self) -> Resolution {
        SOURCE_RESOLUTION
    }

    fn preview_frame_rate(&self) -> u32 {
        10
    }

    fn record_frame_rate(&self) -> u32 {
        5
    }
}

#[derive(Default)]
pub struct CollectedEvents(Mutex<Vec<CameraEvent>>);

impl CollectedEvents {
    pub fn all(&self) -> Vec<CameraEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&CameraEvent) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl CameraEventSink for CollectedEvents {
    fn notify(&self, event: CameraEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct CollectedPreview(Mutex<Vec<RgbImage>>);

impl CollectedPreview {
    pub fn frames(&self) -> Vec<RgbImage> {
        self.0.lock().unwrap().clone()
    }
}

impl PreviewSink for CollectedPreview {
    fn surface_size(&self) -> Option<Resolution> {
        None
    }

    fn publish(&self, image: RgbImage) {
        self.0.lock().unwrap().push(image);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderCall {
    Open(PathBuf),
    Write(PathBuf, Vec<u8>),
    Finish(PathBuf),
}

#[derive(Default)]
pub struct EncoderJournal {
    pub calls: Vec<EncoderCall>,
    pub fail_open: bool,
    pub fail_writes: bool,
}

/// Encoder backend keeping everything in memory.
#[derive(Clone, Default)]
pub struct MemoryBackend(pub Arc<Mutex<EncoderJournal>>);

impl MemoryBackend {
    pub fn recorder(&self) -> Recorder {
        Recorder::new(Box::new(self.clone()))
    }

    pub fn calls(&self) -> Vec<EncoderCall> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn written(&self, path: &Path) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EncoderCall::Write(p, data) if p == path => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.0.lock().unwrap().fail_open = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.0.lock().unwrap().fail_writes = fail;
    }
}

struct MemoryEncoder {
    path: PathBuf,
    journal: Arc<Mutex<EncoderJournal>>,
}

impl VideoEncoder for MemoryEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        let mut journal = self.journal.lock().unwrap();
        if journal.fail_writes {
            return Err(RecorderError::Encode("disk full".to_string()));
        }
        journal
            .calls
            .push(EncoderCall::Write(self.path.clone(), frame.data().to_vec()));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RecorderError> {
        self.journal
            .lock()
            .unwrap()
            .calls
            .push(EncoderCall::Finish(self.path.clone()));
        Ok(())
    }
}

impl EncoderBackend for MemoryBackend {
    fn codec(&self) -> VideoCodec {
        VideoCodec::Mjpeg
    }

    fn open(
        &self,
        path: &Path,
        _params: RecordingParams,
    ) -> Result<Box<dyn VideoEncoder>, RecorderError> {
        let mut journal = self.0.lock().unwrap();
        if journal.fail_open {
            return Err(RecorderError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        journal.calls.push(EncoderCall::Open(path.to_path_buf()));
        Ok(Box::new(MemoryEncoder {
            path: path.to_path_buf(),
            journal: self.0.clone(),
        }))
    }
}

/// Instant used as time zero by the tests.
pub fn t0() -> Instant {
    Instant::now()
}

/// What a player sees when opening a recorded file.
#[derive(Debug)]
pub struct RecordedVideo {
    pub codec: ffmpeg::codec::Id,
    pub resolution: Resolution,
    pub time_base: ffmpeg::Rational,
    pub frames: usize,
}

pub fn read_recording(path: &Path) -> RecordedVideo {
    let mut input = ffmpeg::format::input(&path).unwrap();
    let stream = input.streams().best(ffmpeg::media::Type::Video).unwrap();
    let index = stream.index();
    let time_base = stream.time_base();
    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .unwrap()
        .decoder()
        .video()
        .unwrap();
    let codec = decoder.id();
    let resolution = Resolution::new(decoder.width(), decoder.height());
    let frames = input
        .packets()
        .filter(|(stream, _)| stream.index() == index)
        .count();
    RecordedVideo {
        codec,
        resolution,
        time_base,
        frames,
    }
}
