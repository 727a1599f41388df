use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// The video could not be opened or its stream properties probed.
/// Fatal to the job that owns the video.
#[derive(Debug, Error)]
pub enum VideoOpenError {
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("no video stream found in {path}")]
    NoVideoStream { path: PathBuf },
    #[error("could not probe stream properties of {path}: {message}")]
    Probe { path: PathBuf, message: String },
}

/// A frame failed to decode mid-stream. Fatal to the job; sinks are left
/// unfinalized.
#[derive(Debug, Error)]
#[error("failed to decode frame {index}: {message}")]
pub struct VideoReadError {
    pub index: usize,
    pub message: String,
}

/// Reads frames from a video source, one at a time.
///
/// Implementations handle I/O details (codec, container format) while the
/// pipeline works with the abstract [`Frame`] and [`VideoMetadata`] types.
/// The pull interface makes the per-frame suspension point explicit; the
/// runner guarantees `close` runs on every exit path, including failure
/// and cancellation.
pub trait VideoReader: Send {
    /// Opens a video file and returns its probed metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoOpenError>;

    /// Pulls the next frame in decode order, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<Result<Frame, VideoReadError>>;

    /// Releases decoder resources. Idempotent.
    fn close(&mut self);
}
