use std::path::PathBuf;

/// Stream properties probed when a video is opened.
///
/// A job cannot leave the `Opened` state without all four of frame count,
/// width, height and frame rate being known.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}
