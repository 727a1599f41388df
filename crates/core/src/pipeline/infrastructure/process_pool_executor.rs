use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::pipeline::job_executor::{cancelled_result, JobExecutor, JobFn};
use crate::pipeline::report::{ExecutionResult, JobError};
use crate::pipeline::run_spec::RunSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Command line used to launch one worker process per job.
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    pub program: std::path::PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Re-invokes the current binary in worker mode. The binary's entry
    /// point must route this flag to [`serve_worker`].
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["--internal-worker".to_string()],
        })
    }
}

/// Bounded pool of worker processes, one job per process.
///
/// Each worker receives its [`RunSpec`] as JSON on stdin and reports an
/// [`ExecutionResult`] as JSON on stdout. Address-space isolation: a worker
/// that segfaults or aborts fails only its own job, recorded as
/// `WorkerCrashed`. Cancellation hard-terminates in-flight workers, leaving
/// their sinks unfinalized.
pub struct ProcessPoolExecutor {
    workers: usize,
    command: Option<WorkerCommand>,
}

impl ProcessPoolExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            command: None,
        }
    }

    /// Overrides the worker command line; `new` defaults to re-invoking the
    /// current binary with `--internal-worker`.
    pub fn with_command(workers: usize, command: WorkerCommand) -> Self {
        Self {
            workers: workers.max(1),
            command: Some(command),
        }
    }

    fn resolve_command(&self) -> io::Result<WorkerCommand> {
        match &self.command {
            Some(command) => Ok(command.clone()),
            None => WorkerCommand::current_exe(),
        }
    }
}

struct Slot {
    index: usize,
    child: Child,
    output: JoinHandle<String>,
}

impl JobExecutor for ProcessPoolExecutor {
    // The job closure is ignored: worker processes run the job themselves
    // from the serialized spec.
    fn run_all(
        &self,
        specs: &[RunSpec],
        _job: JobFn,
        cancelled: Arc<AtomicBool>,
    ) -> Vec<ExecutionResult> {
        let command = match self.resolve_command() {
            Ok(command) => command,
            Err(e) => {
                return specs
                    .iter()
                    .map(|spec| {
                        ExecutionResult::failed(
                            spec.source.clone(),
                            JobError::WorkerCrashed(format!("cannot locate worker binary: {e}")),
                            None,
                        )
                    })
                    .collect();
            }
        };

        let mut results: Vec<Option<ExecutionResult>> = vec![None; specs.len()];
        let mut running: Vec<Slot> = Vec::new();
        let mut next = 0;

        loop {
            if cancelled.load(Ordering::Relaxed) {
                for mut slot in running.drain(..) {
                    let _ = slot.child.kill();
                    let _ = slot.child.wait();
                    results[slot.index] = Some(cancelled_result(&specs[slot.index]));
                }
                break;
            }

            while running.len() < self.workers && next < specs.len() {
                match spawn_worker(&command, &specs[next]) {
                    Ok((child, output)) => running.push(Slot {
                        index: next,
                        child,
                        output,
                    }),
                    Err(e) => {
                        results[next] = Some(ExecutionResult::failed(
                            specs[next].source.clone(),
                            JobError::WorkerCrashed(format!("failed to spawn worker: {e}")),
                            None,
                        ));
                    }
                }
                next += 1;
            }

            if running.is_empty() {
                break;
            }

            let mut i = 0;
            while i < running.len() {
                match running[i].child.try_wait() {
                    Ok(Some(status)) => {
                        let slot = running.swap_remove(i);
                        let output = slot.output.join().unwrap_or_default();
                        results[slot.index] =
                            Some(harvest(&output, status.success(), &specs[slot.index]));
                    }
                    Ok(None) => i += 1,
                    Err(e) => {
                        let slot = running.swap_remove(i);
                        results[slot.index] = Some(ExecutionResult::failed(
                            specs[slot.index].source.clone(),
                            JobError::WorkerCrashed(format!("failed to reap worker: {e}")),
                            None,
                        ));
                    }
                }
            }

            std::thread::sleep(POLL_INTERVAL);
        }

        results
            .into_iter()
            .zip(specs)
            .map(|(slot, spec)| slot.unwrap_or_else(|| cancelled_result(spec)))
            .collect()
    }
}

fn spawn_worker(
    command: &WorkerCommand,
    spec: &RunSpec,
) -> io::Result<(Child, JoinHandle<String>)> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    // Drain stdout while the worker runs; a result larger than the pipe
    // buffer must never block the child against our exit poll.
    let mut stdout = child.stdout.take();
    let output = std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(stdout) = stdout.as_mut() {
            let _ = stdout.read_to_string(&mut buffer);
        }
        buffer
    });

    let payload = serde_json::to_vec(spec).map_err(io::Error::other)?;
    if let Some(mut stdin) = child.stdin.take() {
        // A worker that dies before reading its spec closes the pipe; the
        // failure is reported through its exit status, not this write.
        let _ = stdin.write_all(&payload);
    }
    Ok((child, output))
}

/// Parses a finished worker's drained stdout into its result.
fn harvest(output: &str, success: bool, spec: &RunSpec) -> ExecutionResult {
    if !success {
        return ExecutionResult::failed(
            spec.source.clone(),
            JobError::WorkerCrashed("worker exited abnormally".to_string()),
            None,
        );
    }
    match serde_json::from_str::<ExecutionResult>(output.trim()) {
        Ok(result) => result,
        Err(e) => ExecutionResult::failed(
            spec.source.clone(),
            JobError::WorkerCrashed(format!("unreadable worker output: {e}")),
            None,
        ),
    }
}

/// Worker-side half of the process pool protocol: reads one [`RunSpec`] as
/// JSON from `input`, runs `job`, and writes the [`ExecutionResult`] as
/// JSON to `output`.
pub fn serve_worker<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    job: &dyn Fn(&RunSpec) -> ExecutionResult,
) -> io::Result<()> {
    let mut payload = String::new();
    input.read_to_string(&mut payload)?;
    let spec: RunSpec = serde_json::from_str(&payload).map_err(io::Error::other)?;

    let result = job(&spec);
    serde_json::to_writer(&mut output, &result).map_err(io::Error::other)?;
    output.flush()
}
