pub mod ffmpeg_reader;
pub mod synthetic_reader;
