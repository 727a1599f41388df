pub mod constants;
pub mod frame;
pub mod landmarks;
pub mod video_metadata;
