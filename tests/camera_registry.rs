mod common;

use std::sync::Arc;

use common::*;
use thermal_rig::{
    camera_registry::recording_path, CameraRegistry, CameraSession, LogEventSink, Recorder,
};

fn session(name: &str, device_present: bool, recorder: Recorder) -> (CameraSession, SourceControl) {
    let (source, control) = ScriptedSource::new(name, device_present);
    (
        CameraSession::new(name, Box::new(source), recorder, Arc::new(LogEventSink)),
        control,
    )
}

#[test]
fn one_absent_camera_does_not_stop_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = CameraRegistry::new();
    let (visible, _) = session("visible", true, Recorder::mjpeg(85));
    let (thermal, _) = session("thermal", false, Recorder::mjpeg(85));
    registry.add_camera("visible", visible);
    registry.add_camera("thermal", thermal);

    let now = t0();
    let initialized = registry.initialize_all(now);
    assert_eq!(initialized.get("visible"), Some(&true));
    assert_eq!(initialized.get("thermal"), Some(&false));

    let base = dir.path().join("z1");
    let started = registry.start_recording_all(&base);
    assert_eq!(started.len(), 1);
    let path = started["visible"].as_ref().unwrap().clone();
    assert_eq!(path, dir.path().join("z1_visible.avi"));

    for i in 1..=3 {
        registry.tick(now + ms(100 * i));
    }
    let summaries = registry.stop_recording_all();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].frames_written, 3);

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files, vec![path.clone()]);
    assert!(!recording_path(&base, "thermal").exists());

    let video = read_recording(&path);
    assert_eq!(video.codec, ffmpeg_next::codec::Id::MJPEG);
    assert_eq!(video.resolution, SOURCE_RESOLUTION);
    assert_eq!(video.time_base, ffmpeg_next::Rational::new(1, 5));
    assert_eq!(video.frames, 3);

    registry.release_all();
}

#[test]
fn batch_stop_and_release_visit_every_session() {
    let backend = MemoryBackend::default();
    let mut registry = CameraRegistry::new();
    let (a, a_control) = session("visible", true, backend.recorder());
    let (b, b_control) = session("thermal", true, backend.recorder());
    registry.add_camera("visible", a);
    registry.add_camera("thermal", b);

    registry.initialize_all(t0());
    let started = registry.start_recording_all(std::path::Path::new("batch"));
    assert!(started.values().all(|r| r.is_ok()));
    assert!(registry.is_any_recording());

    assert_eq!(registry.stop_recording_all().len(), 2);
    assert!(registry.stop_recording_all().is_empty());

    registry.release_all();
    registry.release_all();
    assert_eq!(a_control.state(|s| s.handles_released), 1);
    assert_eq!(b_control.state(|s| s.handles_released), 1);
    assert_eq!(registry.next_deadline(), None);
}

#[test]
fn failed_start_is_reported_per_camera() {
    let broken = MemoryBackend::default();
    broken.set_fail_open(true);
    let mut registry = CameraRegistry::new();
    let (visible, _) = session("visible", true, MemoryBackend::default().recorder());
    let (thermal, _) = session("thermal", true, broken.recorder());
    registry.add_camera("visible", visible);
    registry.add_camera("thermal", thermal);
    registry.initialize_all(t0());

    let started = registry.start_recording_all(std::path::Path::new("partial"));
    assert!(started["visible"].is_ok());
    assert!(started["thermal"].is_err());
    assert!(registry.get("visible").unwrap().is_recording());
    assert!(!registry.get("thermal").unwrap().is_recording());
}

#[test]
fn re_adding_a_name_replaces_the_session() {
    let mut registry = CameraRegistry::new();
    let (first, first_control) = session("visible", true, MemoryBackend::default().recorder());
    let (second, _) = session("visible", true, MemoryBackend::default().recorder());
    assert!(registry.add_camera("visible", first).is_none());
    registry.initialize_all(t0());

    let mut replaced = registry.add_camera("visible", second).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(replaced.is_initialized());
    assert!(!registry.get("visible").unwrap().is_initialized());

    replaced.release();
    assert_eq!(first_control.state(|s| s.handles_released), 1);
}

#[test]
fn next_deadline_is_the_earliest_session_deadline() {
    let mut registry = CameraRegistry::new();
    let (live, _) = session("visible", true, MemoryBackend::default().recorder());
    let (absent, _) = session("thermal", false, MemoryBackend::default().recorder());
    registry.add_camera("visible", live);
    registry.add_camera("thermal", absent);

    let now = t0();
    registry.initialize_all(now);
    // 10 fps poll versus the 5 s reconnect interval
    assert_eq!(registry.next_deadline(), Some(now + ms(100)));

    registry.expedite_reconnects(now);
    assert_eq!(registry.next_deadline(), Some(now));
}
