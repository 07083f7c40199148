use std::sync::mpsc::Sender;

///
/// Notifications surfaced to the operator.
/// Each disconnect episode produces exactly one `Disconnected` and, once the
/// device answers again, exactly one `Restored`.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    InitializationFailed { camera: String, reason: String },
    Disconnected { camera: String },
    Restored { camera: String },
    RecordingFailed { camera: String, reason: String },
}

impl CameraEvent {
    pub fn camera(&self) -> &str {
        match self {
            CameraEvent::InitializationFailed { camera, .. }
            | CameraEvent::Disconnected { camera }
            | CameraEvent::Restored { camera }
            | CameraEvent::RecordingFailed { camera, .. } => camera,
        }
    }

    /// Human readable text, as shown in the operator's message box.
    pub fn message(&self) -> String {
        match self {
            CameraEvent::InitializationFailed { camera, reason } => {
                format!("Failed to initialize {} camera: {}", camera, reason)
            }
            CameraEvent::Disconnected { camera } => format!("Camera {} was disconnected", camera),
            CameraEvent::Restored { camera } => format!("Camera {} restored", camera),
            CameraEvent::RecordingFailed { camera, reason } => {
                format!("Recording on {} camera failed: {}", camera, reason)
            }
        }
    }
}

pub trait CameraEventSink: Send + Sync {
    fn notify(&self, event: CameraEvent);
}

/// Default sink, writes events to the log.
pub struct LogEventSink;

impl CameraEventSink for LogEventSink {
    fn notify(&self, event: CameraEvent) {
        match &event {
            CameraEvent::Restored { .. } => log::info!("{}", event.message()),
            _ => log::warn!("{}", event.message()),
        }
    }
}

impl CameraEventSink for Sender<CameraEvent> {
    fn notify(&self, event: CameraEvent) {
        if let Err(err) = self.send(event) {
            log::error!("Failed to deliver camera event: {}", err);
        }
    }
}
