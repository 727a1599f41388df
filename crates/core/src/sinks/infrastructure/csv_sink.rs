use std::fs::File;
use std::path::{Path, PathBuf};

use crate::shared::constants::axis_label;
use crate::shared::landmarks::{CategorySpec, FrameRecord, JobMetadata};
use crate::sinks::domain::collector_sink::{CollectorSink, SequenceGuard, SinkError};

/// Tabular text sink: one row per frame, one column per
/// `category.keypoint.axis`, preceded by a header row.
///
/// Rows are streamed as they arrive; the file is only flushed (and thus
/// valid) at finalize. Missing-data frames appear as `NaN` cells.
pub struct CsvSink {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
    categories: Vec<CategorySpec>,
    guard: SequenceGuard,
}

impl CsvSink {
    pub fn open(metadata: &JobMetadata, path: &Path) -> Result<Self, SinkError> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| SinkError::Init {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        writer
            .write_record(header(&metadata.categories))
            .map_err(|e| SinkError::Init {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            categories: metadata.categories.clone(),
            guard: SequenceGuard::new(),
        })
    }
}

fn header(categories: &[CategorySpec]) -> Vec<String> {
    let mut columns = vec!["frame".to_string()];
    for cat in categories {
        for kp in 0..cat.keypoints {
            for axis in 0..cat.coords {
                columns.push(format!("{}.{}.{}", cat.name, kp, axis_label(axis)));
            }
        }
    }
    columns
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v}")
    }
}

impl CollectorSink for CsvSink {
    fn append(&mut self, record: &FrameRecord) -> Result<(), SinkError> {
        self.guard.accept(record.index)?;
        let writer = self.writer.as_mut().ok_or(SinkError::AlreadyFinalized)?;

        let mut row = vec![record.index.to_string()];
        for cat in &self.categories {
            let arr = record
                .landmarks
                .get(&cat.name)
                .ok_or_else(|| SinkError::Encode(format!("missing category '{}'", cat.name)))?;
            row.extend(arr.iter().map(|v| format_value(*v)));
        }
        writer
            .write_record(&row)
            .map_err(|e| SinkError::Encode(e.to_string()))
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>, SinkError> {
        self.guard.finish()?;
        let mut writer = self.writer.take().ok_or(SinkError::AlreadyFinalized)?;
        writer.flush()?;
        Ok(vec![self.path.clone()])
    }
}
