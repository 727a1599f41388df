use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::shared::constants::CHUNK_NAME_WIDTH;
use crate::shared::landmarks::{CategorySpec, FrameRecord, JobMetadata};
use crate::sinks::domain::collector_sink::{CollectorSink, SequenceGuard, SinkError};

const ATTRIBUTES_FILE: &str = "attributes.json";

/// Attribute block stored at the root of a chunked store.
///
/// `frame_count` is `None` while the job is still being written and is
/// filled in by finalize; readers use it to tell a finished store from a
/// crashed or in-flight one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreAttributes {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: Option<usize>,
    pub categories: Vec<CategorySpec>,
}

/// Chunked hierarchical store: a directory with one subdirectory per
/// category and one raw f64-LE chunk file per frame, plus an attribute
/// block.
///
/// Unlike the buffering sinks this writes incrementally, one chunk per
/// append, so a still-open (or crashed) job can be inspected with
/// [`ChunkedStoreReader`] at any time.
pub struct ChunkedStoreSink {
    root: PathBuf,
    attributes: StoreAttributes,
    guard: SequenceGuard,
}

impl ChunkedStoreSink {
    pub fn open(metadata: &JobMetadata, root: &Path) -> Result<Self, SinkError> {
        let init_err = |message: String| SinkError::Init {
            path: root.to_path_buf(),
            message,
        };

        fs::create_dir_all(root).map_err(|e| init_err(e.to_string()))?;
        for cat in &metadata.categories {
            fs::create_dir_all(root.join(&cat.name)).map_err(|e| init_err(e.to_string()))?;
        }

        let attributes = StoreAttributes {
            source: metadata.source.clone(),
            width: metadata.width,
            height: metadata.height,
            fps: metadata.fps,
            frame_count: None,
            categories: metadata.categories.clone(),
        };
        write_attributes(root, &attributes).map_err(|e| init_err(e.to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
            attributes,
            guard: SequenceGuard::new(),
        })
    }
}

fn write_attributes(root: &Path, attributes: &StoreAttributes) -> Result<(), SinkError> {
    let json = serde_json::to_string_pretty(attributes)
        .map_err(|e| SinkError::Encode(e.to_string()))?;
    fs::write(root.join(ATTRIBUTES_FILE), json)?;
    Ok(())
}

fn chunk_name(index: usize) -> String {
    format!("{index:0width$}.bin", width = CHUNK_NAME_WIDTH)
}

impl CollectorSink for ChunkedStoreSink {
    fn append(&mut self, record: &FrameRecord) -> Result<(), SinkError> {
        self.guard.accept(record.index)?;
        for cat in &self.attributes.categories {
            let arr = record
                .landmarks
                .get(&cat.name)
                .ok_or_else(|| SinkError::Encode(format!("missing category '{}'", cat.name)))?;
            if arr.len() != cat.values_per_frame() {
                return Err(SinkError::Encode(format!(
                    "category '{}' carries {} values, expected {}",
                    cat.name,
                    arr.len(),
                    cat.values_per_frame()
                )));
            }
            let mut bytes = Vec::with_capacity(arr.len() * 8);
            for v in arr.iter() {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            fs::write(self.root.join(&cat.name).join(chunk_name(record.index)), bytes)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>, SinkError> {
        let frames = self.guard.finish()?;
        self.attributes.frame_count = Some(frames);
        write_attributes(&self.root, &self.attributes)?;
        Ok(vec![self.root.clone()])
    }
}

/// Read side of the chunked store, usable on finished stores and on
/// partial ones left by a crash or still being written.
pub struct ChunkedStoreReader {
    root: PathBuf,
    attributes: StoreAttributes,
}

impl ChunkedStoreReader {
    pub fn open(root: &Path) -> Result<Self, SinkError> {
        let json = fs::read_to_string(root.join(ATTRIBUTES_FILE))?;
        let attributes =
            serde_json::from_str(&json).map_err(|e| SinkError::Encode(e.to_string()))?;
        Ok(Self {
            root: root.to_path_buf(),
            attributes,
        })
    }

    pub fn attributes(&self) -> &StoreAttributes {
        &self.attributes
    }

    /// Assembles the chunks of one category into a
    /// `(frames, keypoints * coords)` array. Chunk file names sort in
    /// frame order, so the row order is the append order.
    pub fn read_category(&self, name: &str) -> Result<Array2<f64>, SinkError> {
        let cat = self
            .attributes
            .categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SinkError::Encode(format!("no category '{name}' in store")))?;
        let values_per_frame = cat.values_per_frame();

        let mut chunk_paths: Vec<PathBuf> = fs::read_dir(self.root.join(name))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        chunk_paths.sort();

        let mut values = Vec::with_capacity(chunk_paths.len() * values_per_frame);
        for path in &chunk_paths {
            let bytes = fs::read(path)?;
            if bytes.len() != values_per_frame * 8 {
                return Err(SinkError::Encode(format!(
                    "chunk {} holds {} bytes, expected {}",
                    path.display(),
                    bytes.len(),
                    values_per_frame * 8
                )));
            }
            for chunk in bytes.chunks_exact(8) {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                values.push(f64::from_le_bytes(buf));
            }
        }

        let frames = chunk_paths.len();
        Array2::from_shape_vec((frames, values_per_frame), values)
            .map_err(|e| SinkError::Encode(e.to_string()))
    }
}
