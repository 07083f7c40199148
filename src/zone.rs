use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use thiserror::Error;

use crate::{
    camera_registry::{recording_path, CameraRegistry},
    camera_session::CameraError,
    settings::RigSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneCoordinates {
    pub x: i32,
    pub y: i32,
}

impl fmt::Display for ZoneCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl FromStr for ZoneCoordinates {
    type Err = anyhow::Error;

    /// Parses `X,Y`, optionally wrapped in parentheses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let (x, y) = inner
            .split_once(',')
            .ok_or_else(|| anyhow!("zone must be given as X,Y, got '{}'", s))?;
        Ok(Self {
            x: x.trim().parse()?,
            y: y.trim().parse()?,
        })
    }
}

/// `{save_dir}/{object}_zone({x},{y})` with spaces in the object name replaced.
pub fn zone_base_path(save_dir: &Path, object: &str, zone: ZoneCoordinates) -> PathBuf {
    save_dir.join(format!("{}_zone{}", object.trim().replace(' ', "_"), zone))
}

pub fn zone_files(base: &Path, cameras: &[String]) -> Vec<PathBuf> {
    cameras.iter().map(|name| recording_path(base, name)).collect()
}

///
/// Removes the recordings of an aborted zone. Files that were never created
/// are skipped; the deleted paths are returned.
///
pub fn delete_zone_files(base: &Path, cameras: &[String]) -> Vec<PathBuf> {
    let mut deleted = vec![];
    for path in zone_files(base, cameras) {
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted {}", path.display());
                deleted.push(path);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::error!("Failed to delete {}: {}", path.display(), err),
        }
    }
    deleted
}

pub trait Heater: Send {
    fn turn_on(&mut self) -> anyhow::Result<()>;
    fn turn_off(&mut self) -> anyhow::Result<()>;
    fn is_on(&self) -> bool;
}

/// Heater stand-in for rigs without the controller attached.
#[derive(Debug, Default)]
pub struct MockHeater {
    on: bool,
    switch_count: u32,
}

impl MockHeater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }
}

impl Heater for MockHeater {
    fn turn_on(&mut self) -> anyhow::Result<()> {
        log::info!("Mock heater on");
        self.on = true;
        self.switch_count += 1;
        Ok(())
    }

    fn turn_off(&mut self) -> anyhow::Result<()> {
        log::info!("Mock heater off");
        self.on = false;
        self.switch_count += 1;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("zone cycle already running")]
    AlreadyRunning,
    #[error("no camera is ready to record")]
    NoCameraRecording,
    #[error("failed to start recording on {camera} camera: {error}")]
    Recording {
        camera: String,
        #[source]
        error: CameraError,
    },
    #[error("heater failed: {0:#}")]
    Heater(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ZonePhase {
    Idle,
    Heating,
    Cooling,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTiming {
    pub heating: Duration,
    /// Heating plus cooldown, measured from the start of the zone.
    pub total: Duration,
}

impl ZoneTiming {
    pub fn from_settings(settings: &RigSettings) -> Self {
        Self {
            heating: Duration::from_secs(settings.heating_duration as u64),
            total: Duration::from_secs(settings.duration_of_testing as u64),
        }
    }
}

///
/// One heat pulse and cooldown at a zone, recorded on every ready camera.
///
/// ```text
/// Idle -> Heating -> Cooling -> Completed
///            \---------\-----> Aborted
/// ```
///
pub struct ZoneCycle {
    base: PathBuf,
    timing: ZoneTiming,
    heater: Box<dyn Heater>,
    phase: ZonePhase,
    started_at: Option<Instant>,
    files: Vec<PathBuf>,
}

impl ZoneCycle {
    pub fn new(base: PathBuf, timing: ZoneTiming, heater: Box<dyn Heater>) -> Self {
        Self {
            base,
            timing,
            heater,
            phase: ZonePhase::Idle,
            started_at: None,
            files: vec![],
        }
    }

    ///
    /// Starts recording on all initialized cameras, then switches the heater on.
    /// If any ready camera cannot record, nothing is left behind: recordings are
    /// stopped, their files deleted and the cycle stays idle.
    ///
    pub fn start(
        &mut self,
        registry: &mut CameraRegistry,
        now: Instant,
    ) -> Result<Vec<PathBuf>, ZoneError> {
        if self.is_running() {
            return Err(ZoneError::AlreadyRunning);
        }

        let mut files = vec![];
        let mut failure = None;
        for (camera, result) in registry.start_recording_all(&self.base) {
            match result {
                Ok(path) => files.push(path),
                Err(error) => {
                    if failure.is_none() {
                        failure = Some(ZoneError::Recording { camera, error });
                    }
                }
            }
        }
        if failure.is_none() && files.is_empty() {
            failure = Some(ZoneError::NoCameraRecording);
        }
        if failure.is_none() {
            if let Err(err) = self.heater.turn_on() {
                failure = Some(ZoneError::Heater(err));
            }
        }

        if let Some(err) = failure {
            log::error!("Zone {} not started: {}", self.base.display(), err);
            self.discard_recordings(registry);
            self.phase = ZonePhase::Idle;
            return Err(err);
        }

        log::info!(
            "Zone {} started, heating for {} s of {} s",
            self.base.display(),
            self.timing.heating.as_secs(),
            self.timing.total.as_secs()
        );
        self.files = files.clone();
        self.started_at = Some(now);
        self.phase = ZonePhase::Heating;
        Ok(files)
    }

    /// Advances the cycle. Returns the phase after the update.
    pub fn tick(&mut self, registry: &mut CameraRegistry, now: Instant) -> ZonePhase {
        let Some(started_at) = self.started_at else {
            return self.phase;
        };
        let elapsed = now.saturating_duration_since(started_at);

        if self.phase == ZonePhase::Heating && elapsed >= self.timing.heating {
            self.switch_heater_off();
            self.phase = ZonePhase::Cooling;
            log::info!("Zone {}: heating done, cooling down", self.base.display());
        }
        if self.phase == ZonePhase::Cooling && elapsed >= self.timing.total {
            registry.stop_recording_all();
            self.phase = ZonePhase::Completed;
            log::info!("Zone {} completed", self.base.display());
        }
        self.phase
    }

    ///
    /// Stops the zone: heater off, recordings stopped and deleted.
    /// Returns the deleted files.
    ///
    pub fn abort(&mut self, registry: &mut CameraRegistry) -> Vec<PathBuf> {
        if !self.is_running() {
            return vec![];
        }
        self.switch_heater_off();
        let deleted = self.discard_recordings(registry);
        self.phase = ZonePhase::Aborted;
        log::warn!("Zone {} aborted", self.base.display());
        deleted
    }

    fn switch_heater_off(&mut self) {
        if let Err(err) = self.heater.turn_off() {
            log::error!("Failed to switch heater off: {:#}", err);
        }
    }

    fn discard_recordings(&mut self, registry: &mut CameraRegistry) -> Vec<PathBuf> {
        registry.stop_recording_all();
        delete_zone_files(&self.base, &registry.names())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let started_at = self.started_at?;
        match self.phase {
            ZonePhase::Heating => Some(started_at + self.timing.heating),
            ZonePhase::Cooling => Some(started_at + self.timing.total),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, ZonePhase::Heating | ZonePhase::Cooling)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ZonePhase::Completed | ZonePhase::Aborted)
    }

    pub fn phase(&self) -> ZonePhase {
        self.phase
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn heater(&self) -> &dyn Heater {
        self.heater.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_follows_naming_scheme() {
        let base = zone_base_path(
            Path::new("/data"),
            "steam pipe 3",
            ZoneCoordinates { x: 2, y: -1 },
        );
        assert_eq!(base, PathBuf::from("/data/steam_pipe_3_zone(2,-1)"));
        assert_eq!(
            zone_files(&base, &["thermal".to_string()]),
            vec![PathBuf::from("/data/steam_pipe_3_zone(2,-1)_thermal.avi")]
        );
    }

    #[test]
    fn parses_coordinates() {
        assert_eq!(
            "3,4".parse::<ZoneCoordinates>().unwrap(),
            ZoneCoordinates { x: 3, y: 4 }
        );
        assert_eq!(
            "(0, 12)".parse::<ZoneCoordinates>().unwrap(),
            ZoneCoordinates { x: 0, y: 12 }
        );
        assert!("3".parse::<ZoneCoordinates>().is_err());
        assert!("a,b".parse::<ZoneCoordinates>().is_err());
    }

    #[test]
    fn deleting_missing_files_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("obj_zone(0,0)");
        let cameras = vec!["visible".to_string(), "thermal".to_string()];
        fs::write(recording_path(&base, "visible"), b"x").unwrap();

        let deleted = delete_zone_files(&base, &cameras);
        assert_eq!(deleted, vec![recording_path(&base, "visible")]);
        assert!(!recording_path(&base, "visible").exists());
    }
}
