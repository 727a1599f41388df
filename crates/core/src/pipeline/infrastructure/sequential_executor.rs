use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::job_executor::{cancelled_result, JobExecutor, JobFn};
use crate::pipeline::report::ExecutionResult;
use crate::pipeline::run_spec::RunSpec;

/// Runs jobs one after another on the calling thread.
///
/// No isolation: a panicking job propagates to the caller. Useful for
/// debugging and as the degenerate case the pools must match result-wise.
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SequentialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobExecutor for SequentialExecutor {
    fn run_all(
        &self,
        specs: &[RunSpec],
        job: JobFn,
        cancelled: Arc<AtomicBool>,
    ) -> Vec<ExecutionResult> {
        specs
            .iter()
            .map(|spec| {
                if cancelled.load(Ordering::Relaxed) {
                    cancelled_result(spec)
                } else {
                    job(spec)
                }
            })
            .collect()
    }
}
