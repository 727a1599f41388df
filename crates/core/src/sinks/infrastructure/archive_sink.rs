use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray_npy::WriteNpyExt;
use zip::write::SimpleFileOptions;

use crate::shared::landmarks::{FrameRecord, JobMetadata};
use crate::sinks::domain::category_buffers::CategoryBuffers;
use crate::sinks::domain::collector_sink::{CollectorSink, SequenceGuard, SinkError};

/// Compressed archive sink: an `.npz`-compatible zip with one
/// `<category>.npy` entry per category, all written at finalize.
pub struct ArchiveSink {
    path: PathBuf,
    file: Option<File>,
    buffers: CategoryBuffers,
    guard: SequenceGuard,
}

impl ArchiveSink {
    pub fn open(metadata: &JobMetadata, path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|e| SinkError::Init {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            buffers: CategoryBuffers::new(&metadata.categories),
            guard: SequenceGuard::new(),
        })
    }
}

impl CollectorSink for ArchiveSink {
    fn append(&mut self, record: &FrameRecord) -> Result<(), SinkError> {
        self.guard.accept(record.index)?;
        self.buffers.push(record)
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>, SinkError> {
        self.guard.finish()?;
        let file = self.file.take().ok_or(SinkError::AlreadyFinalized)?;
        let mut zip = zip::ZipWriter::new(file);
        let encode = |e: zip::result::ZipError| SinkError::Encode(e.to_string());

        for (i, cat) in self.buffers.categories().iter().enumerate() {
            zip.start_file(format!("{}.npy", cat.name), SimpleFileOptions::default())
                .map_err(encode)?;
            self.buffers
                .array(i)?
                .write_npy(&mut zip)
                .map_err(|e| SinkError::Encode(e.to_string()))?;
        }

        zip.finish().map_err(encode)?;
        Ok(vec![self.path.clone()])
    }
}
