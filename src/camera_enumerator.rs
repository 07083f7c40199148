use std::{fmt, fs, io, path::Path};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

//
// A video device found on the system, with the USB PID/VID when it sits on USB.
// The index is what `CameraSettings::device_index` refers to.
//
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedCamera {
    pub index: u32,
    pub name: String,
    pub usb_vid_pid: Option<(u16, u16)>,
}

impl fmt::Display for EnumeratedCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)?;
        if let Some((vid, pid)) = self.usb_vid_pid {
            write!(f, " (USB {:04x}:{:04x})", vid, pid)?;
        }
        Ok(())
    }
}

static VIDEO_NODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^video(\d+)$").unwrap());

static UEVENT_PRODUCT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PRODUCT=(\w+)/(\w+)/(\w+)").unwrap());

#[cfg(target_os = "linux")]
pub fn enumerate_cameras() -> Result<Vec<EnumeratedCamera>> {
    enumerate_video4linux(Path::new("/sys/class/video4linux"))
}

#[cfg(not(target_os = "linux"))]
pub fn enumerate_cameras() -> Result<Vec<EnumeratedCamera>> {
    Ok(vec![])
}

///
/// Lists the `videoN` nodes of a video4linux sysfs class directory.
/// A missing directory means no video devices.
///
pub fn enumerate_video4linux(class_dir: &Path) -> Result<Vec<EnumeratedCamera>> {
    let entries = match fs::read_dir(class_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to list {}", class_dir.display()))
        }
    };

    let mut cameras = vec![];
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(index) = VIDEO_NODE_REGEX
            .captures(&file_name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        let node = entry.path();
        let name = fs::read_to_string(node.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| file_name.clone());
        let usb_vid_pid = fs::read_to_string(node.join("device").join("uevent"))
            .ok()
            .and_then(|uevent| parse_uevent_vid_pid(&uevent));

        cameras.push(EnumeratedCamera {
            index,
            name,
            usb_vid_pid,
        });
    }
    cameras.sort_by_key(|c| c.index);
    Ok(cameras)
}

fn parse_uevent_vid_pid(uevent: &str) -> Option<(u16, u16)> {
    let captures = UEVENT_PRODUCT_REGEX.captures(uevent)?;
    let vid = u16::from_str_radix(captures.get(1)?.as_str(), 16).ok()?;
    let pid = u16::from_str_radix(captures.get(2)?.as_str(), 16).ok()?;
    Some((vid, pid))
}
