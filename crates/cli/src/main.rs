use std::io;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use clap::Parser;

use landmarker_core::estimation::infrastructure::estimator_factory::{
    EstimatorConfig, EstimatorKind,
};
use landmarker_core::pipeline::extract_landmarks_use_case::{run_job, ExtractLandmarksUseCase};
use landmarker_core::pipeline::job_executor::{ExecutorStrategy, JobExecutor};
use landmarker_core::pipeline::infrastructure::process_pool_executor::{
    serve_worker, ProcessPoolExecutor,
};
use landmarker_core::pipeline::infrastructure::sequential_executor::SequentialExecutor;
use landmarker_core::pipeline::infrastructure::thread_pool_executor::ThreadPoolExecutor;
use landmarker_core::pipeline::report::RunReport;
use landmarker_core::pipeline::run_spec::RunConfig;
use landmarker_core::sinks::infrastructure::sink_factory::SinkKind;
use landmarker_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Per-frame landmark extraction from videos.
#[derive(Parser)]
#[command(name = "landmarker")]
struct Cli {
    /// Input video file or directory of videos.
    source: Option<PathBuf>,

    /// Output file or directory.
    destination: Option<PathBuf>,

    /// Output formats (comma-separated): csv, npy, npz, chunks, safetensors.
    #[arg(long, value_delimiter = ',', default_value = "csv", value_parser = parse_sink_kind)]
    format: Vec<SinkKind>,

    /// Worker count (defaults to the number of CPUs).
    #[arg(long)]
    workers: Option<usize>,

    /// Scheduling strategy: sequential, threads or processes.
    #[arg(long, default_value = "threads", value_parser = parse_strategy)]
    executor: ExecutorStrategy,

    /// Filename glob for directory sources (default: known video extensions).
    #[arg(long)]
    pattern: Option<String>,

    /// Recurse into subdirectories of a directory source.
    #[arg(long)]
    recursive: bool,

    /// Stop each job after this many frames.
    #[arg(long)]
    frame_cap: Option<usize>,

    /// Estimation engine.
    #[arg(long, default_value = "centroid", value_parser = parse_estimator)]
    estimator: EstimatorKind,

    /// Category name for the estimator's output.
    #[arg(long, default_value = "centroid")]
    category: String,

    /// Minimum luma a pixel needs to count as signal (0-255).
    #[arg(long, default_value = "128.0")]
    min_luma: f64,

    /// Run as a process-pool worker: read a job spec from stdin, write the
    /// result to stdout.
    #[arg(long, hide = true)]
    internal_worker: bool,
}

fn parse_sink_kind(s: &str) -> Result<SinkKind, String> {
    SinkKind::from_str(s)
}

fn parse_strategy(s: &str) -> Result<ExecutorStrategy, String> {
    ExecutorStrategy::from_str(s)
}

fn parse_estimator(s: &str) -> Result<EstimatorKind, String> {
    match s {
        "centroid" => Ok(EstimatorKind::Centroid),
        other => Err(format!("unknown estimator '{other}', expected: centroid")),
    }
}

fn main() {
    env_logger::init();

    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.internal_worker {
        run_worker()?;
        return Ok(0);
    }

    let source = cli.source.ok_or("missing source path")?;
    let destination = cli.destination.ok_or("missing output destination")?;

    let mut config = RunConfig::new(source, destination, cli.format);
    config.pattern = cli.pattern;
    config.recursive = cli.recursive;
    config.frame_cap = cli.frame_cap;
    config.estimator = EstimatorConfig {
        kind: cli.estimator,
        category: cli.category,
        min_luma: cli.min_luma,
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    let executor = build_executor(cli.executor, config.workers);
    let report = ExtractLandmarksUseCase::new(executor).run(&config)?;
    log_summary(&report);

    Ok(if report.all_done() { 0 } else { 2 })
}

fn build_executor(strategy: ExecutorStrategy, workers: usize) -> Box<dyn JobExecutor> {
    match strategy {
        ExecutorStrategy::Sequential => Box::new(SequentialExecutor::new()),
        ExecutorStrategy::Threads => Box::new(ThreadPoolExecutor::new(workers)),
        ExecutorStrategy::Processes => Box::new(ProcessPoolExecutor::new(workers)),
    }
}

fn run_worker() -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve_worker(stdin.lock(), stdout.lock(), &|spec| {
        let mut reader = FfmpegReader::new();
        run_job(spec, &mut reader, &AtomicBool::new(false), None)
    })
}

fn log_summary(report: &RunReport) {
    for result in report.failed() {
        if let Some(error) = result.error() {
            log::warn!("{}: {error}", result.source.display());
        }
    }
    log::info!(
        "{}/{} jobs done",
        report.done_count(),
        report.results.len()
    );
}
