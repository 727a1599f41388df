use std::path::PathBuf;

use thiserror::Error;

use crate::shared::landmarks::FrameRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    /// Backing storage could not be allocated (unwritable destination,
    /// permission failure). Raised at open time only.
    #[error("failed to initialize sink at {path}: {message}")]
    Init { path: PathBuf, message: String },
    /// A frame arrived out of order. Programming-error class: never
    /// retried, always fatal to the job.
    #[error("frame {got} delivered out of order, expected {expected}")]
    Sequence { expected: usize, got: usize },
    /// `finalize` (or `append`) was called on an already-finalized sink.
    /// Programming-error class; the first finalize's artifact stays valid.
    #[error("sink already finalized")]
    AlreadyFinalized,
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Stateful per-job writer for one output format.
///
/// Invariants: receives records for exactly one job, strictly in increasing
/// frame-index order starting at 0 with no gaps; must be finalized exactly
/// once before its artifact is valid; must never be reused across jobs.
/// Construction happens through the sink registry
/// (`sinks::infrastructure::sink_factory::open_sink`), which allocates the
/// backing storage.
pub trait CollectorSink: Send {
    /// Appends one frame's landmark data.
    fn append(&mut self, record: &FrameRecord) -> Result<(), SinkError>;

    /// Flushes buffered data, writes format-specific trailer metadata, and
    /// releases resources. Returns the artifact paths produced.
    fn finalize(&mut self) -> Result<Vec<PathBuf>, SinkError>;
}

/// Enforces the per-sink ordering contract: indices 0, 1, 2, ... with no
/// gaps, and exactly one finalize. Shared by every sink implementation.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    next: usize,
    finalized: bool,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and consumes the next frame index.
    pub fn accept(&mut self, index: usize) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::AlreadyFinalized);
        }
        if index != self.next {
            return Err(SinkError::Sequence {
                expected: self.next,
                got: index,
            });
        }
        self.next += 1;
        Ok(())
    }

    /// Marks the sink finalized, returning the number of frames accepted.
    pub fn finish(&mut self) -> Result<usize, SinkError> {
        if self.finalized {
            return Err(SinkError::AlreadyFinalized);
        }
        self.finalized = true;
        Ok(self.next)
    }

    pub fn frames_accepted(&self) -> usize {
        self.next
    }
}
