use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use safetensors::tensor::{Dtype, TensorView};

use crate::shared::landmarks::{FrameRecord, JobMetadata};
use crate::sinks::domain::category_buffers::CategoryBuffers;
use crate::sinks::domain::collector_sink::{CollectorSink, SequenceGuard, SinkError};

/// Tensor-bundle sink: the full per-category buffer set serialized at
/// finalize as one safetensors file, with the source video's properties
/// embedded in the string-metadata header.
pub struct SafetensorsSink {
    path: PathBuf,
    metadata: JobMetadata,
    buffers: CategoryBuffers,
    guard: SequenceGuard,
}

impl SafetensorsSink {
    pub fn open(metadata: &JobMetadata, path: &Path) -> Result<Self, SinkError> {
        // Probe writability up front; the real payload arrives at finalize.
        File::create(path).map_err(|e| SinkError::Init {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            metadata: metadata.clone(),
            buffers: CategoryBuffers::new(&metadata.categories),
            guard: SequenceGuard::new(),
        })
    }
}

impl CollectorSink for SafetensorsSink {
    fn append(&mut self, record: &FrameRecord) -> Result<(), SinkError> {
        self.guard.accept(record.index)?;
        self.buffers.push(record)
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>, SinkError> {
        let frames = self.guard.finish()?;

        let byte_buffers: Vec<Vec<u8>> = (0..self.buffers.categories().len())
            .map(|i| self.buffers.le_bytes(i))
            .collect();
        let mut tensors: Vec<(String, TensorView<'_>)> = Vec::new();
        for (i, cat) in self.buffers.categories().iter().enumerate() {
            let view = TensorView::new(
                Dtype::F64,
                vec![frames, cat.values_per_frame()],
                &byte_buffers[i],
            )
            .map_err(|e| SinkError::Encode(format!("{e:?}")))?;
            tensors.push((cat.name.clone(), view));
        }

        let header: HashMap<String, String> = HashMap::from([
            ("frame_count".to_string(), frames.to_string()),
            ("width".to_string(), self.metadata.width.to_string()),
            ("height".to_string(), self.metadata.height.to_string()),
            ("fps".to_string(), self.metadata.fps.to_string()),
            (
                "source".to_string(),
                self.metadata.source.display().to_string(),
            ),
        ]);

        safetensors::tensor::serialize_to_file(tensors, &Some(header), &self.path)
            .map_err(|e| SinkError::Encode(format!("{e:?}")))?;
        Ok(vec![self.path.clone()])
    }
}
