//! Camera acquisition and recording for the dual-camera thermal inspection rig.
//!
//! A [`CameraRegistry`] holds one [`CameraSession`] per camera role. Each
//! session polls its [`FrameSource`] on a single-threaded schedule driven by
//! the host loop through `tick`, writes frames to its [`Recorder`] and
//! publishes them to a preview sink. Lost devices are closed cleanly and
//! retried at a fixed interval.

pub mod camera_enumerator;
pub mod camera_factory;
pub mod camera_registry;
pub mod camera_session;
pub mod events;
pub mod frame_source;
#[cfg(feature = "hotplug")]
pub mod hotplug_detector;
pub mod palette;
pub mod preview;
pub mod recorders;
pub mod settings;
pub mod timer;
pub mod types;
pub mod vendor_sdk;
pub mod zone;

pub use camera_factory::{CameraFactory, FactoryError};
pub use camera_registry::CameraRegistry;
pub use camera_session::{CameraError, CameraSession, SessionState};
pub use events::{CameraEvent, CameraEventSink, LogEventSink};
pub use frame_source::{CaptureError, FrameSource};
pub use recorders::{Recorder, RecorderError};
pub use settings::RigSettings;
pub use types::frame::{ColorOrder, Frame, Resolution};
