use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoOpenError, VideoReadError, VideoReader};

const BACKGROUND_LUMA: u8 = 10;
const DOT_LUMA: u8 = 255;

/// Deterministic in-memory video source: dark frames with a single bright
/// 3x3 dot that moves one pixel per frame along the diagonal.
///
/// Exists so the pipeline can be exercised end to end without codec
/// dependencies or fixture files; the centroid estimator recovers the dot
/// position exactly.
pub struct SyntheticReader {
    width: u32,
    height: u32,
    frame_count: usize,
    fps: f64,
    next_index: usize,
    opened: bool,
}

impl SyntheticReader {
    pub fn new(width: u32, height: u32, frame_count: usize, fps: f64) -> Self {
        Self {
            width,
            height,
            frame_count,
            fps,
            next_index: 0,
            opened: false,
        }
    }

    /// Center of the bright dot in frame `index`.
    pub fn dot_position(&self, index: usize) -> (u32, u32) {
        let x = (2 + index as u32) % self.width.saturating_sub(2).max(1);
        let y = (2 + index as u32) % self.height.saturating_sub(2).max(1);
        (x.max(1), y.max(1))
    }

    fn render(&self, index: usize) -> Frame {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut data = vec![BACKGROUND_LUMA; w * h * 3];
        let (cx, cy) = self.dot_position(index);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
                    let offset = (y as usize * w + x as usize) * 3;
                    data[offset..offset + 3].fill(DOT_LUMA);
                }
            }
        }
        Frame::new(data, self.width, self.height, index)
    }
}

impl VideoReader for SyntheticReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoOpenError> {
        if self.width < 4 || self.height < 4 {
            return Err(VideoOpenError::Probe {
                path: path.to_path_buf(),
                message: "synthetic frames must be at least 4x4".to_string(),
            });
        }
        self.opened = true;
        self.next_index = 0;
        Ok(VideoMetadata {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count: self.frame_count,
            codec: "synthetic".to_string(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn next_frame(&mut self) -> Option<Result<Frame, VideoReadError>> {
        if !self.opened || self.next_index >= self.frame_count {
            return None;
        }
        let frame = self.render(self.next_index);
        self.next_index += 1;
        Some(Ok(frame))
    }

    fn close(&mut self) {
        self.opened = false;
    }
}
