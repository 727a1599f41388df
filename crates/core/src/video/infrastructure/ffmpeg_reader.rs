use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoOpenError, VideoReadError, VideoReader};

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Each decoded frame is converted to RGB24 and wrapped in a [`Frame`].
/// Frames are pulled one at a time, so only the current frame is resident
/// in memory.
pub struct FfmpegReader {
    inner: Option<Decoding>,
    metadata: Option<VideoMetadata>,
}

struct Decoding {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: FfmpegReader is owned by exactly one job worker at a time.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            inner: None,
            metadata: None,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoOpenError> {
        let open_err = |e: ffmpeg_next::Error| VideoOpenError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        ffmpeg_next::init().map_err(open_err)?;
        let ictx = ffmpeg_next::format::input(path).map_err(open_err)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| VideoOpenError::NoVideoStream {
                path: path.to_path_buf(),
            })?;
        let video_stream_index = stream.index();

        let probe_err = |message: String| VideoOpenError::Probe {
            path: path.to_path_buf(),
            message,
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| probe_err(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| probe_err(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(probe_err("stream reports zero dimensions".to_string()));
        }

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        } else {
            0.0
        };
        if fps <= 0.0 {
            return Err(probe_err("stream reports no frame rate".to_string()));
        }

        let frame_count = probe_frame_count(&stream, fps)
            .ok_or_else(|| probe_err("stream reports no frame count".to_string()))?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| probe_err(e.to_string()))?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            frame_count,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.metadata = Some(metadata.clone());
        self.inner = Some(Decoding {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        });

        Ok(metadata)
    }

    fn next_frame(&mut self) -> Option<Result<Frame, VideoReadError>> {
        let inner = self.inner.as_mut()?;
        inner.next_frame()
    }

    fn close(&mut self) {
        self.inner = None;
        self.metadata = None;
    }
}

impl Decoding {
    fn next_frame(&mut self) -> Option<Result<Frame, VideoReadError>> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                // Corrupt packet; the decoder recovers on the next one.
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }

    fn try_receive(&mut self) -> Option<Result<Frame, VideoReadError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(VideoReadError {
                index: self.frame_index,
                message: e.to_string(),
            }));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

/// Frame count from the container, falling back to duration * fps when the
/// container does not record an explicit count.
fn probe_frame_count(stream: &ffmpeg_next::format::stream::Stream<'_>, fps: f64) -> Option<usize> {
    let declared = stream.frames();
    if declared > 0 {
        return Some(declared as usize);
    }

    let duration = stream.duration();
    if duration <= 0 {
        return None;
    }
    let tb = stream.time_base();
    if tb.denominator() == 0 {
        return None;
    }
    let seconds = duration as f64 * f64::from(tb.numerator()) / f64::from(tb.denominator());
    let estimated = (seconds * fps).round() as usize;
    (estimated > 0).then_some(estimated)
}

/// Copies pixel data from an ffmpeg frame into a tightly-packed RGB buffer,
/// stripping any row padding (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        let fps = 25;
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        for i in 0..num_frames {
            let mut yuv = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::YUV420P,
                width,
                height,
            );
            let luma = ((i * 37) % 256) as u8;
            for plane in 0..3 {
                let value = if plane == 0 { luma } else { 128 };
                for byte in yuv.data_mut(plane) {
                    *byte = value;
                }
            }
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            drain(&mut encoder, &mut octx, fps, ost_time_base);
        }

        encoder.send_eof().unwrap();
        drain(&mut encoder, &mut octx, fps, ost_time_base);
        octx.write_trailer().unwrap();
    }

    fn drain(
        encoder: &mut ffmpeg_next::encoder::Video,
        octx: &mut ffmpeg_next::format::context::Output,
        fps: i32,
        ost_time_base: ffmpeg_next::Rational,
    ) {
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            // Without an explicit duration the mp4 muxer records the final
            // sample as zero-length and the edit list trims it on demux.
            encoded.set_duration(1);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded.write_interleaved(octx).unwrap();
        }
    }

    fn test_video_path(dir: &Path) -> PathBuf {
        dir.join("test.mp4")
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        write_test_video(&path, 5, 160, 120);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert!(meta.fps > 0.0);
        assert!(meta.frame_count > 0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut reader = FfmpegReader::new();
        let result = reader.open(Path::new("/nonexistent/test.mp4"));
        assert!(matches!(result, Err(VideoOpenError::Open { .. })));
    }

    #[test]
    fn test_pull_yields_all_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        write_test_video(&path, 5, 160, 120);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let mut count = 0;
        while let Some(frame) = reader.next_frame() {
            let frame = frame.unwrap();
            assert_eq!(frame.index(), count);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_next_frame_before_open_is_end_of_stream() {
        let mut reader = FfmpegReader::new();
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        write_test_video(&path, 1, 160, 120);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
        assert!(reader.next_frame().is_none());
    }
}
