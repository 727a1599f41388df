use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::report::{ExecutionResult, JobError};
use crate::pipeline::run_spec::RunSpec;

/// The work executed for one [`RunSpec`]. Shared across workers, so it must
/// be callable from any thread.
pub type JobFn = Arc<dyn Fn(&RunSpec) -> ExecutionResult + Send + Sync>;

/// Schedules a batch of jobs and collects their results.
///
/// Implementations differ only in the isolation they provide between jobs;
/// all of them return results in submission order regardless of completion
/// order, and honor the cancellation flag between jobs.
pub trait JobExecutor: Send + Sync {
    fn run_all(
        &self,
        specs: &[RunSpec],
        job: JobFn,
        cancelled: Arc<AtomicBool>,
    ) -> Vec<ExecutionResult>;
}

/// Result recorded for a job that was cancelled before it started.
pub fn cancelled_result(spec: &RunSpec) -> ExecutionResult {
    ExecutionResult::failed(spec.source.clone(), JobError::Cancelled, None)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStrategy {
    /// Single calling thread, no isolation.
    Sequential,
    /// Bounded thread pool; a panicking job is caught and recorded.
    Threads,
    /// Bounded process pool; a crashing worker only fails its own job.
    Processes,
}

impl ExecutorStrategy {
    pub const ALL: &'static [ExecutorStrategy] = &[
        ExecutorStrategy::Sequential,
        ExecutorStrategy::Threads,
        ExecutorStrategy::Processes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExecutorStrategy::Sequential => "sequential",
            ExecutorStrategy::Threads => "threads",
            ExecutorStrategy::Processes => "processes",
        }
    }
}

impl fmt::Display for ExecutorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExecutorStrategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ExecutorStrategy::ALL.iter().map(|s| s.name()).collect();
                format!(
                    "unknown executor strategy '{s}', expected one of: {}",
                    known.join(", ")
                )
            })
    }
}
