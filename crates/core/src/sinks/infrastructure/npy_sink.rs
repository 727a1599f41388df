use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray_npy::WriteNpyExt;

use crate::shared::landmarks::{FrameRecord, JobMetadata};
use crate::sinks::domain::category_buffers::CategoryBuffers;
use crate::sinks::domain::collector_sink::{CollectorSink, SequenceGuard, SinkError};

/// Flat binary sink: one `.npy` file per category, written whole at
/// finalize as a `(frames, keypoints * coords)` f64 array.
///
/// Given a base path `out/clip.npy` and categories `pointA`, `pointB`, the
/// artifacts are `out/clip.pointA.npy` and `out/clip.pointB.npy`.
pub struct NpySink {
    base: PathBuf,
    buffers: CategoryBuffers,
    guard: SequenceGuard,
}

impl NpySink {
    pub fn open(metadata: &JobMetadata, base: &Path) -> Result<Self, SinkError> {
        let first = metadata.categories.first().ok_or_else(|| SinkError::Init {
            path: base.to_path_buf(),
            message: "no categories declared".to_string(),
        })?;
        // Probe writability up front so a bad destination fails the sink
        // at open rather than at the end of the job.
        let probe = category_path(base, &first.name);
        File::create(&probe).map_err(|e| SinkError::Init {
            path: probe.clone(),
            message: e.to_string(),
        })?;
        std::fs::remove_file(&probe).map_err(|e| SinkError::Init {
            path: probe,
            message: e.to_string(),
        })?;

        Ok(Self {
            base: base.to_path_buf(),
            buffers: CategoryBuffers::new(&metadata.categories),
            guard: SequenceGuard::new(),
        })
    }
}

fn category_path(base: &Path, category: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("landmarks");
    base.with_file_name(format!("{stem}.{category}.npy"))
}

impl CollectorSink for NpySink {
    fn append(&mut self, record: &FrameRecord) -> Result<(), SinkError> {
        self.guard.accept(record.index)?;
        self.buffers.push(record)
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>, SinkError> {
        self.guard.finish()?;
        let mut artifacts = Vec::new();
        for (i, cat) in self.buffers.categories().iter().enumerate() {
            let path = category_path(&self.base, &cat.name);
            let file = File::create(&path)?;
            self.buffers
                .array(i)?
                .write_npy(file)
                .map_err(|e| SinkError::Encode(e.to_string()))?;
            artifacts.push(path);
        }
        Ok(artifacts)
    }
}
