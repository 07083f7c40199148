use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{camera_role::CameraRole, frame::Resolution, media_formats::VideoCodec};

const MAX_KNOWN_SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalBackend {
    /// Synthetic frames, used until a real thermal imager driver is available.
    #[default]
    Placeholder,
    /// The thermal imager exposed as a regular USB video device.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraSettings {
    pub device_index: u32,
    pub resolution: [u32; 2],
    pub preview_fps: u32,
    pub record_fps: u32,
    pub prefer_vendor_sdk: bool,
}

impl CameraSettings {
    pub fn resolution(&self) -> Resolution {
        Resolution::from(self.resolution)
    }

    fn defaults_for(role: CameraRole) -> Self {
        match role {
            CameraRole::Visible => Self {
                device_index: 0,
                resolution: [640, 480],
                preview_fps: 30,
                record_fps: 5,
                prefer_vendor_sdk: true,
            },
            CameraRole::Thermal => Self {
                device_index: 1,
                resolution: [640, 480],
                preview_fps: 20,
                record_fps: 5,
                prefer_vendor_sdk: false,
            },
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self::defaults_for(CameraRole::Visible)
    }
}

// A camera block as written in the file, missing keys fall back to the role's defaults.
#[derive(Deserialize)]
struct CameraSettingsFile {
    device_index: Option<u32>,
    resolution: Option<[u32; 2]>,
    preview_fps: Option<u32>,
    record_fps: Option<u32>,
    prefer_vendor_sdk: Option<bool>,
}

impl CameraSettingsFile {
    fn over(self, defaults: CameraSettings) -> CameraSettings {
        CameraSettings {
            device_index: self.device_index.unwrap_or(defaults.device_index),
            resolution: self.resolution.unwrap_or(defaults.resolution),
            preview_fps: self.preview_fps.unwrap_or(defaults.preview_fps),
            record_fps: self.record_fps.unwrap_or(defaults.record_fps),
            prefer_vendor_sdk: self.prefer_vendor_sdk.unwrap_or(defaults.prefer_vendor_sdk),
        }
    }
}

fn visible_camera<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CameraSettings, D::Error> {
    CameraSettingsFile::deserialize(deserializer)
        .map(|file| file.over(CameraSettings::defaults_for(CameraRole::Visible)))
}

fn thermal_camera<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CameraSettings, D::Error> {
    CameraSettingsFile::deserialize(deserializer)
        .map(|file| file.over(CameraSettings::defaults_for(CameraRole::Thermal)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub codec: VideoCodec,
    pub jpeg_quality: u8,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::Mjpeg,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigSettings {
    pub settings_version: u32,

    // Zone cycle timing, seconds
    pub duration_of_testing: u32,
    pub heating_duration: u32,

    #[serde(deserialize_with = "visible_camera")]
    pub visible_camera: CameraSettings,
    #[serde(deserialize_with = "thermal_camera")]
    pub thermal_camera: CameraSettings,
    pub thermal_backend: ThermalBackend,

    pub reconnect_interval_ms: u64,
    pub vendor_capture_timeout_ms: u64,

    pub recording: RecordingSettings,

    pub mock_heater: bool,
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            settings_version: 1,
            duration_of_testing: 30,
            heating_duration: 10,
            visible_camera: CameraSettings::defaults_for(CameraRole::Visible),
            thermal_camera: CameraSettings::defaults_for(CameraRole::Thermal),
            thermal_backend: ThermalBackend::Placeholder,
            reconnect_interval_ms: 5000,
            vendor_capture_timeout_ms: 1000,
            recording: RecordingSettings::default(),
            mock_heater: true,
        }
    }
}

impl RigSettings {
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().context("No configuration directory on this system")?;
        path.push("thermal-rig");
        path.push("settings.json");
        Ok(path)
    }

    /// Loads from the per-user configuration directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);
        let settings: RigSettings = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if settings.settings_version > MAX_KNOWN_SETTINGS_VERSION {
            return Err(anyhow!(
                "Unknown settings version {}",
                settings.settings_version
            ));
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for role in [CameraRole::Visible, CameraRole::Thermal] {
            let cam = self.camera(role);
            if cam.preview_fps == 0 || cam.record_fps == 0 {
                return Err(anyhow!("{} camera frame rates must be positive", role));
            }
            if cam.resolution().is_empty() {
                return Err(anyhow!("{} camera resolution must be non-zero", role));
            }
        }
        if self.thermal_backend == ThermalBackend::Generic
            && self.thermal_camera.device_index == self.visible_camera.device_index
        {
            return Err(anyhow!(
                "Visible and thermal cameras both use device index {}",
                self.visible_camera.device_index
            ));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(anyhow!("Reconnect interval must be positive"));
        }
        if self.vendor_capture_timeout_ms == 0 {
            return Err(anyhow!("Vendor capture timeout must be positive"));
        }
        if self.heating_duration > self.duration_of_testing {
            return Err(anyhow!(
                "Heating duration ({}s) exceeds the testing duration ({}s)",
                self.heating_duration,
                self.duration_of_testing
            ));
        }
        Ok(())
    }

    pub fn camera(&self, role: CameraRole) -> &CameraSettings {
        match role {
            CameraRole::Visible => &self.visible_camera,
            CameraRole::Thermal => &self.thermal_camera,
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn vendor_capture_timeout(&self) -> Duration {
        Duration::from_millis(self.vendor_capture_timeout_ms)
    }
}
