/// File extensions accepted by the default resolver pattern.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v"];

/// Zero-padded width of chunk file names in the chunked store
/// (`000000.bin`, `000001.bin`, ...). Keeps lexicographic order equal to
/// frame order for up to a million frames per video.
pub const CHUNK_NAME_WIDTH: usize = 6;

/// Coordinate axis labels used in tabular headers. Axes beyond the third
/// fall back to a numeric label.
pub const AXIS_LABELS: &[&str] = &["x", "y", "z"];

/// Label for axis `i` of a landmark coordinate (x, y, z, a3, a4, ...).
pub fn axis_label(i: usize) -> String {
    AXIS_LABELS
        .get(i)
        .map(|s| (*s).to_string())
        .unwrap_or_else(|| format!("a{i}"))
}
