pub mod camera_role;
pub mod frame;
pub mod media_formats;
