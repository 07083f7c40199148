use serde::{Deserialize, Serialize};

/// Container extension shared by every codec, the zone file naming depends on it.
pub const VIDEO_EXTENSION: &str = "avi";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    Mjpeg,
    H264,
}

impl VideoCodec {
    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::Mjpeg => "Motion JPEG",
            VideoCodec::H264 => "H.264",
        }
    }
}
