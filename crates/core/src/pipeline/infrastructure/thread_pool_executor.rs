use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::job_executor::{cancelled_result, JobExecutor, JobFn};
use crate::pipeline::report::{ExecutionResult, JobError};
use crate::pipeline::run_spec::RunSpec;

/// Bounded thread pool over a shared job queue.
///
/// A job that panics is caught on its worker and recorded as a
/// `WorkerCrashed` result; the remaining jobs are unaffected. Requires the
/// process to unwind on panic, so the binary must not be built with
/// `panic = "abort"`.
pub struct ThreadPoolExecutor {
    workers: usize,
}

impl ThreadPoolExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl JobExecutor for ThreadPoolExecutor {
    fn run_all(
        &self,
        specs: &[RunSpec],
        job: JobFn,
        cancelled: Arc<AtomicBool>,
    ) -> Vec<ExecutionResult> {
        let workers = self.workers.min(specs.len().max(1));
        let (spec_tx, spec_rx) = crossbeam_channel::unbounded::<usize>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, ExecutionResult)>();

        for index in 0..specs.len() {
            // Unbounded queue, send cannot fail while the receiver lives.
            let _ = spec_tx.send(index);
        }
        drop(spec_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let spec_rx = spec_rx.clone();
                let result_tx = result_tx.clone();
                let job = job.clone();
                let cancelled = cancelled.clone();
                scope.spawn(move || {
                    for index in spec_rx {
                        let spec = &specs[index];
                        let result = if cancelled.load(Ordering::Relaxed) {
                            cancelled_result(spec)
                        } else {
                            run_guarded(spec, &job)
                        };
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<ExecutionResult>> = vec![None; specs.len()];
        for (index, result) in result_rx {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .zip(specs)
            .map(|(slot, spec)| slot.unwrap_or_else(|| cancelled_result(spec)))
            .collect()
    }
}

fn run_guarded(spec: &RunSpec, job: &JobFn) -> ExecutionResult {
    match catch_unwind(AssertUnwindSafe(|| job(spec))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("worker panicked on {}: {message}", spec.source.display());
            ExecutionResult::failed(
                spec.source.clone(),
                JobError::WorkerCrashed(message),
                None,
            )
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
