use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::types::frame::Resolution;

use super::{VendorDevice, VendorError, VendorImage, VendorPixelFormat, VendorSdk};

#[derive(Debug, Clone)]
pub struct SimDeviceSpec {
    pub model: String,
    pub formats: Vec<VendorPixelFormat>,
    pub max_size: Resolution,
    /// Offset left over from whoever used the camera before us.
    pub initial_offset: (u32, u32),
}

impl SimDeviceSpec {
    pub fn color(model: &str) -> Self {
        Self {
            model: model.to_string(),
            formats: vec![
                VendorPixelFormat::Mono8,
                VendorPixelFormat::Bgr8,
                VendorPixelFormat::Rgb8,
            ],
            max_size: Resolution::new(1440, 1080),
            initial_offset: (0, 0),
        }
    }

    pub fn mono(model: &str) -> Self {
        Self {
            formats: vec![VendorPixelFormat::Mono8],
            ..Self::color(model)
        }
    }
}

// Device registers persist across sessions, like on real hardware.
#[derive(Debug, Clone)]
struct SimDeviceState {
    spec: SimDeviceSpec,
    offset: (u32, u32),
    size: Resolution,
    format: VendorPixelFormat,
    initialized: bool,
    streaming: bool,
}

#[derive(Debug, Default)]
struct SimState {
    unavailable: bool,
    unplugged: bool,
    devices: Vec<SimDeviceState>,
    system_refs: u32,
    list_held: bool,
    leaked: bool,
    timeouts_pending: u32,
    frame_counter: u64,
    calls: Vec<String>,
}

//
// Software stand-in for the vendor driver.
// Keeps the driver's reference counting rules so teardown mistakes show up
// as failed re-acquisition, and records every call for inspection.
//
#[derive(Clone)]
pub struct SimulatedVendorSdk {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedVendorSdk {
    pub fn new(devices: Vec<SimDeviceSpec>) -> Self {
        let devices = devices
            .into_iter()
            .map(|spec| SimDeviceState {
                offset: spec.initial_offset,
                size: spec.max_size,
                format: spec
                    .formats
                    .first()
                    .cloned()
                    .unwrap_or(VendorPixelFormat::Mono8),
                initialized: false,
                streaming: false,
                spec,
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(SimState {
                devices,
                ..Default::default()
            })),
        }
    }

    pub fn without_devices() -> Self {
        Self::new(vec![])
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // a poisoned lock only means a test panicked while holding it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    /// Simulates pulling the cable: streams fail and enumeration comes back empty.
    pub fn unplug(&self) {
        self.lock().unplugged = true;
    }

    pub fn plug(&self) {
        self.lock().unplugged = false;
    }

    /// The next `count` image fetches time out.
    pub fn inject_timeouts(&self, count: u32) {
        self.lock().timeouts_pending = count;
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn system_refs(&self) -> u32 {
        self.lock().system_refs
    }

    pub fn is_leaked(&self) -> bool {
        self.lock().leaked
    }

    pub fn device_offset(&self, index: usize) -> Option<(u32, u32)> {
        self.lock().devices.get(index).map(|d| d.offset)
    }

    pub fn device_size(&self, index: usize) -> Option<Resolution> {
        self.lock().devices.get(index).map(|d| d.size)
    }

    pub fn device_format(&self, index: usize) -> Option<VendorPixelFormat> {
        self.lock().devices.get(index).map(|d| d.format.clone())
    }
}

impl VendorSdk for SimulatedVendorSdk {
    fn is_available(&self) -> bool {
        !self.lock().unavailable
    }

    fn acquire_system(&self) -> Result<(), VendorError> {
        let mut state = self.lock();
        state.calls.push("acquire_system".to_string());
        if state.unavailable {
            return Err(VendorError::Call("driver library not loaded".to_string()));
        }
        if state.leaked {
            return Err(VendorError::Call(
                "system instance still referenced by a previous session".to_string(),
            ));
        }
        state.system_refs += 1;
        Ok(())
    }

    fn release_system(&self) -> Result<(), VendorError> {
        let mut state = self.lock();
        state.calls.push("release_system".to_string());
        let device_refs = state.devices.iter().any(|d| d.initialized || d.streaming);
        if state.list_held || device_refs {
            state.leaked = true;
            return Err(VendorError::Call(
                "cannot release system while cameras are referenced".to_string(),
            ));
        }
        state.system_refs = state.system_refs.saturating_sub(1);
        Ok(())
    }

    fn camera_list(&self) -> Result<Vec<Box<dyn VendorDevice>>, VendorError> {
        let mut state = self.lock();
        state.calls.push("camera_list".to_string());
        if state.system_refs == 0 {
            return Err(VendorError::Call("system not acquired".to_string()));
        }
        state.list_held = true;
        if state.unplugged {
            return Ok(vec![]);
        }
        let count = state.devices.len();
        Ok((0..count)
            .map(|index| {
                Box::new(SimDevice {
                    index,
                    state: self.state.clone(),
                }) as Box<dyn VendorDevice>
            })
            .collect())
    }

    fn clear_camera_list(&self) {
        let mut state = self.lock();
        state.calls.push("clear_camera_list".to_string());
        state.list_held = false;
    }
}

struct SimDevice {
    index: usize,
    state: Arc<Mutex<SimState>>,
}

impl SimDevice {
    fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn call(&self, name: String) {
        self.with(|s| s.calls.push(name));
    }
}

impl VendorDevice for SimDevice {
    fn model_name(&self) -> String {
        self.with(|s| s.devices[self.index].spec.model.clone())
    }

    fn init(&mut self) -> Result<(), VendorError> {
        self.call("init".to_string());
        self.with(|s| {
            if s.unplugged {
                return Err(VendorError::Call("device not present".to_string()));
            }
            s.devices[self.index].initialized = true;
            Ok(())
        })
    }

    fn deinit(&mut self) {
        self.call("deinit".to_string());
        self.with(|s| s.devices[self.index].initialized = false);
    }

    fn pixel_formats(&self) -> Vec<VendorPixelFormat> {
        self.with(|s| s.devices[self.index].spec.formats.clone())
    }

    fn set_pixel_format(&mut self, format: &VendorPixelFormat) -> Result<(), VendorError> {
        self.call(format!("set_pixel_format {:?}", format));
        self.with(|s| {
            let dev = &mut s.devices[self.index];
            if !dev.spec.formats.contains(format) {
                return Err(VendorError::Call(format!("format {:?} not supported", format)));
            }
            dev.format = format.clone();
            Ok(())
        })
    }

    fn set_offset(&mut self, x: u32, y: u32) -> Result<(), VendorError> {
        self.call(format!("set_offset {} {}", x, y));
        self.with(|s| {
            let dev = &mut s.devices[self.index];
            if x + dev.size.width > dev.spec.max_size.width
                || y + dev.size.height > dev.spec.max_size.height
            {
                return Err(VendorError::Call("offset out of range".to_string()));
            }
            dev.offset = (x, y);
            Ok(())
        })
    }

    fn max_size(&self) -> Resolution {
        self.with(|s| s.devices[self.index].spec.max_size)
    }

    fn set_size(&mut self, size: Resolution) -> Result<(), VendorError> {
        self.call(format!("set_size {}", size));
        self.with(|s| {
            let dev = &mut s.devices[self.index];
            // same rule as the hardware: the ROI must fit together with the offset
            if size.is_empty()
                || dev.offset.0 + size.width > dev.spec.max_size.width
                || dev.offset.1 + size.height > dev.spec.max_size.height
            {
                return Err(VendorError::Call(format!(
                    "size {} conflicts with offset {:?}",
                    size, dev.offset
                )));
            }
            dev.size = size;
            Ok(())
        })
    }

    fn set_frame_rate(&mut self, fps: f64) -> Result<(), VendorError> {
        self.call(format!("set_frame_rate {}", fps));
        Ok(())
    }

    fn begin_acquisition(&mut self) -> Result<(), VendorError> {
        self.call("begin_acquisition".to_string());
        self.with(|s| {
            let dev = &mut s.devices[self.index];
            if !dev.initialized {
                return Err(VendorError::Call("camera not initialized".to_string()));
            }
            dev.streaming = true;
            Ok(())
        })
    }

    fn end_acquisition(&mut self) {
        self.call("end_acquisition".to_string());
        self.with(|s| s.devices[self.index].streaming = false);
    }

    fn next_image(&mut self, timeout: Duration) -> Result<VendorImage, VendorError> {
        self.with(|s| {
            if s.unplugged {
                return Err(VendorError::Call("device removed".to_string()));
            }
            if s.timeouts_pending > 0 {
                s.timeouts_pending -= 1;
                return Err(VendorError::Timeout(timeout));
            }
            s.frame_counter += 1;
            let counter = s.frame_counter;
            let dev = &s.devices[self.index];
            if !dev.streaming {
                return Err(VendorError::Call("acquisition not started".to_string()));
            }
            let channels = match dev.format {
                VendorPixelFormat::Mono8 => 1,
                _ => 3,
            };
            let (width, height) = (dev.size.width, dev.size.height);
            let data = (0..(width as usize * height as usize * channels))
                .map(|i| ((i as u64 + counter) % 256) as u8)
                .collect();
            Ok(VendorImage {
                width,
                height,
                format: dev.format.clone(),
                data,
            })
        })
    }
}
