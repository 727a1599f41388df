use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sinks::infrastructure::sink_factory::SinkKind;

/// Classified per-job failure carried inside an [`ExecutionResult`].
///
/// String payloads (rather than wrapped source errors) keep the type
/// serializable, which the process-pool strategy relies on to ship results
/// back over a pipe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "class", content = "detail", rename_all = "snake_case")]
pub enum JobError {
    #[error("failed to open video: {0}")]
    VideoOpen(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
    #[error("sink initialization failed: {0}")]
    SinkInit(String),
    #[error("sink write failed: {0}")]
    SinkWrite(String),
    #[error("finalize failed: {0}")]
    Finalize(String),
    #[error("estimation failed fatally: {0}")]
    EstimationFatal(String),
    #[error("frame sequencing violated: {0}")]
    Sequence(String),
    #[error("worker crashed: {0}")]
    WorkerCrashed(String),
    #[error("cancelled before completion")]
    Cancelled,
}

/// Where in a sink's lifecycle a non-job-fatal failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkStage {
    Open,
    Finalize,
}

/// A sink that was dropped at open (job continued with the remaining
/// sinks) or failed its finalize (sibling sinks kept their artifacts).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SinkFailure {
    pub kind: SinkKind,
    pub stage: SinkStage,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Done { artifacts: Vec<PathBuf> },
    Failed { error: JobError, last_frame: Option<usize> },
}

/// Per-job outcome: success with produced artifact paths, or a classified
/// failure with the last frame index that was fully processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub source: PathBuf,
    pub outcome: JobOutcome,
    pub frames_processed: usize,
    /// Frames recorded as missing data (recoverable estimation failures
    /// and explicit no-detections).
    pub missing_frames: usize,
    /// Partial-success detail: sinks dropped at open or failed at
    /// finalize while the job itself carried on.
    pub sink_failures: Vec<SinkFailure>,
}

impl ExecutionResult {
    pub fn done(source: PathBuf, artifacts: Vec<PathBuf>) -> Self {
        Self {
            source,
            outcome: JobOutcome::Done { artifacts },
            frames_processed: 0,
            missing_frames: 0,
            sink_failures: Vec::new(),
        }
    }

    pub fn failed(source: PathBuf, error: JobError, last_frame: Option<usize>) -> Self {
        Self {
            source,
            outcome: JobOutcome::Failed { error, last_frame },
            frames_processed: last_frame.map_or(0, |f| f + 1),
            missing_frames: 0,
            sink_failures: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, JobOutcome::Done { .. })
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        match &self.outcome {
            JobOutcome::Done { artifacts } => artifacts,
            JobOutcome::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            JobOutcome::Done { .. } => None,
            JobOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// Aggregate outcome of one batch. Result order always matches submission
/// order regardless of completion order across the pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Vec<ExecutionResult>,
}

impl RunReport {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self { results }
    }

    pub fn all_done(&self) -> bool {
        self.results.iter().all(ExecutionResult::is_done)
    }

    pub fn done_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_done()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.is_done())
    }
}
