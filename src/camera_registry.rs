use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{
    camera_session::{CameraError, CameraSession},
    recorders::RecordingSummary,
    types::media_formats::VIDEO_EXTENSION,
};

/// Output file of one camera for a zone: `{base}_{name}.avi`.
pub fn recording_path(base: &Path, name: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(format!("_{}.{}", name, VIDEO_EXTENSION));
    PathBuf::from(path)
}

///
/// Named camera sessions of the rig.
/// Batch operations visit every session and never stop at the first failure.
///
#[derive(Default)]
pub struct CameraRegistry {
    sessions: BTreeMap<String, CameraSession>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Registers a session, replacing any session of the same name.
    /// The replaced session is returned so the caller can release it.
    ///
    pub fn add_camera(
        &mut self,
        name: impl Into<String>,
        session: CameraSession,
    ) -> Option<CameraSession> {
        let name = name.into();
        let previous = self.sessions.insert(name.clone(), session);
        if previous.is_some() {
            log::warn!("Replaced camera session {}", name);
        }
        previous
    }

    pub fn initialize_all(&mut self, now: Instant) -> BTreeMap<String, bool> {
        self.sessions
            .iter_mut()
            .map(|(name, session)| {
                let ok = session
                    .initialize(now)
                    .inspect_err(|err| log::warn!("{} camera failed to initialize: {}", name, err))
                    .is_ok();
                (name.clone(), ok)
            })
            .collect()
    }

    ///
    /// Starts recording `{base}_{name}.avi` on every initialized session.
    /// Sessions that are not initialized are skipped and do not appear in the result.
    ///
    pub fn start_recording_all(
        &mut self,
        base: &Path,
    ) -> BTreeMap<String, Result<PathBuf, CameraError>> {
        let mut results = BTreeMap::new();
        for (name, session) in self.sessions.iter_mut() {
            if !session.is_initialized() {
                log::info!("Skipping recording on {} camera, not initialized", name);
                continue;
            }
            let path = recording_path(base, name);
            let result = session.start_recording(&path).map(|()| path);
            if let Err(err) = &result {
                log::error!("Failed to start recording on {} camera: {}", name, err);
            }
            results.insert(name.clone(), result);
        }
        results
    }

    pub fn stop_recording_all(&mut self) -> Vec<RecordingSummary> {
        self.sessions
            .values_mut()
            .filter_map(|session| session.stop_recording())
            .collect()
    }

    pub fn release_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.release();
        }
    }

    pub fn tick(&mut self, now: Instant) {
        for session in self.sessions.values_mut() {
            session.tick(now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions
            .values()
            .filter_map(|session| session.next_deadline())
            .min()
    }

    pub fn expedite_reconnects(&mut self, now: Instant) {
        for session in self.sessions.values_mut() {
            session.expedite_reconnect(now);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&CameraSession> {
        self.sessions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CameraSession> {
        self.sessions.get_mut(name)
    }

    pub fn sessions(&self) -> impl Iterator<Item = (&String, &CameraSession)> {
        self.sessions.iter()
    }

    pub fn is_any_recording(&self) -> bool {
        self.sessions.values().any(|s| s.is_recording())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
