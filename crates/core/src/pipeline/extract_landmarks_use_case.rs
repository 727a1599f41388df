use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::estimation::domain::landmark_estimator::{
    EstimatorError, FrameEstimate, LandmarkEstimator,
};
use crate::estimation::infrastructure::estimator_factory::build_estimator;
use crate::pipeline::job_executor::{JobExecutor, JobFn};
use crate::pipeline::report::{
    ExecutionResult, JobError, JobOutcome, RunReport, SinkFailure, SinkStage,
};
use crate::pipeline::run_spec::{resolve_run_specs, PathError, RunConfig, RunSpec};
use crate::shared::landmarks::{FrameRecord, JobMetadata};
use crate::sinks::domain::collector_sink::{CollectorSink, SinkError};
use crate::sinks::infrastructure::sink_factory::open_sink;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Builds a fresh reader per job; workers must never share decoder state.
pub type ReaderFactory = Arc<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;

/// Called after each processed frame with (frames done, frames expected).
/// Returning `false` requests cooperative cancellation.
pub type ProgressFn = Arc<dyn Fn(usize, usize) -> bool + Send + Sync>;

/// Per-job lifecycle, logged at each transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobState {
    Pending,
    Opened,
    Processing,
    Finalizing,
}

/// Batch entry point: resolves a request into jobs, schedules them on the
/// configured executor, and aggregates per-job results into a report.
pub struct ExtractLandmarksUseCase {
    reader_factory: ReaderFactory,
    executor: Box<dyn JobExecutor>,
    cancelled: Arc<AtomicBool>,
    progress: Option<ProgressFn>,
}

impl ExtractLandmarksUseCase {
    pub fn new(executor: Box<dyn JobExecutor>) -> Self {
        Self {
            reader_factory: Arc::new(|| Box::new(FfmpegReader::new())),
            executor,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Swaps the decoder implementation; used by tests and synthetic runs.
    pub fn with_reader_factory(mut self, factory: ReaderFactory) -> Self {
        self.reader_factory = factory;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Shared flag observed between frames and between jobs. Setting it
    /// cancels not-yet-started jobs and stops in-flight ones cooperatively.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Resolves the request into jobs and executes them.
    pub fn run(&self, config: &RunConfig) -> Result<RunReport, PathError> {
        let specs = resolve_run_specs(config)?;
        Ok(self.execute(&specs))
    }

    /// Executes already-resolved jobs. Results come back in spec order.
    pub fn execute(&self, specs: &[RunSpec]) -> RunReport {
        let reader_factory = self.reader_factory.clone();
        let cancelled = self.cancelled.clone();
        let progress = self.progress.clone();
        let job: JobFn = Arc::new(move |spec: &RunSpec| {
            let mut reader = reader_factory();
            run_job(spec, &mut *reader, &cancelled, progress.as_ref())
        });
        RunReport::new(self.executor.run_all(specs, job, self.cancelled.clone()))
    }
}

/// Runs one job start to finish: open, per-frame decode → estimate → fan
/// out, then best-effort finalize. The reader is closed on every exit path.
pub fn run_job(
    spec: &RunSpec,
    reader: &mut dyn VideoReader,
    cancelled: &AtomicBool,
    progress: Option<&ProgressFn>,
) -> ExecutionResult {
    let estimator = match build_estimator(&spec.estimator) {
        Ok(estimator) => estimator,
        Err(e) => {
            return ExecutionResult::failed(
                spec.source.clone(),
                JobError::EstimationFatal(e.to_string()),
                None,
            )
        }
    };
    run_job_with_estimator(spec, reader, estimator, cancelled, progress)
}

/// [`run_job`] with the estimator already built. Exposed so callers can
/// inject engines the factory does not know about.
pub fn run_job_with_estimator(
    spec: &RunSpec,
    reader: &mut dyn VideoReader,
    estimator: Box<dyn LandmarkEstimator>,
    cancelled: &AtomicBool,
    progress: Option<&ProgressFn>,
) -> ExecutionResult {
    let result = run_job_inner(spec, reader, estimator, cancelled, progress);
    reader.close();
    match &result.outcome {
        JobOutcome::Done { artifacts } => {
            log::info!(
                "{}: done, {} frames, {} artifacts",
                spec.source.display(),
                result.frames_processed,
                artifacts.len()
            );
        }
        JobOutcome::Failed { error, .. } => {
            log::warn!("{}: failed: {error}", spec.source.display());
        }
    }
    result
}

fn run_job_inner(
    spec: &RunSpec,
    reader: &mut dyn VideoReader,
    mut estimator: Box<dyn LandmarkEstimator>,
    cancelled: &AtomicBool,
    progress: Option<&ProgressFn>,
) -> ExecutionResult {
    let mut state = JobState::Pending;

    let metadata = match reader.open(&spec.source) {
        Ok(metadata) => metadata,
        Err(e) => {
            return ExecutionResult::failed(
                spec.source.clone(),
                JobError::VideoOpen(e.to_string()),
                None,
            )
        }
    };
    transition(spec, &mut state, JobState::Opened);

    let job_metadata = JobMetadata {
        source: spec.source.clone(),
        stem: job_stem(&spec.source),
        width: metadata.width,
        height: metadata.height,
        fps: metadata.fps,
        frame_count: metadata.frame_count,
        categories: estimator.categories().to_vec(),
    };

    let (mut sinks, mut sink_failures) = match open_sinks(spec, &job_metadata) {
        Ok(opened) => opened,
        Err(message) => {
            return ExecutionResult::failed(spec.source.clone(), JobError::SinkInit(message), None)
        }
    };

    transition(spec, &mut state, JobState::Processing);
    let expected = match spec.frame_cap {
        Some(cap) => metadata.frame_count.min(cap),
        None => metadata.frame_count,
    };

    let mut frames_processed = 0usize;
    let mut missing_frames = 0usize;
    let mut last_frame: Option<usize> = None;

    macro_rules! fail {
        ($error:expr) => {{
            let mut result = ExecutionResult::failed(spec.source.clone(), $error, last_frame);
            result.missing_frames = missing_frames;
            result.sink_failures = sink_failures;
            return result;
        }};
    }

    while spec.frame_cap.map_or(true, |cap| frames_processed < cap) {
        if cancelled.load(Ordering::Relaxed) {
            fail!(JobError::Cancelled);
        }

        let frame = match reader.next_frame() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => fail!(JobError::Decode(e.to_string())),
            None => break,
        };
        let index = frame.index();

        let record = match estimator.estimate(&frame) {
            Ok(FrameEstimate::Detected(landmarks)) => {
                let record = FrameRecord::new(index, landmarks);
                if let Err(message) = validate_shapes(&record, &job_metadata) {
                    fail!(JobError::EstimationFatal(message));
                }
                record
            }
            Ok(FrameEstimate::Missing) => {
                missing_frames += 1;
                FrameRecord::missing(index, &job_metadata.categories)
            }
            Err(EstimatorError::Frame { index, message }) => {
                log::debug!("{}: frame {index} missing: {message}", spec.source.display());
                missing_frames += 1;
                FrameRecord::missing(index, &job_metadata.categories)
            }
            Err(e) => fail!(JobError::EstimationFatal(e.to_string())),
        };

        for sink in sinks.iter_mut() {
            if let Err(e) = sink.append(&record) {
                match e {
                    SinkError::Sequence { .. } | SinkError::AlreadyFinalized => {
                        fail!(JobError::Sequence(e.to_string()))
                    }
                    other => fail!(JobError::SinkWrite(other.to_string())),
                }
            }
        }

        last_frame = Some(index);
        frames_processed += 1;
        if let Some(progress) = progress {
            if !progress(frames_processed, expected) {
                cancelled.store(true, Ordering::Relaxed);
            }
        }
    }

    transition(spec, &mut state, JobState::Finalizing);
    let mut artifacts = Vec::new();
    for (sink, target) in sinks.iter_mut().zip(&spec.sinks) {
        match sink.finalize() {
            Ok(mut produced) => artifacts.append(&mut produced),
            Err(e) => {
                log::warn!(
                    "{}: {} sink failed to finalize: {e}",
                    spec.source.display(),
                    target.kind
                );
                sink_failures.push(SinkFailure {
                    kind: target.kind,
                    stage: SinkStage::Finalize,
                    message: e.to_string(),
                });
            }
        }
    }

    if artifacts.is_empty() {
        fail!(JobError::Finalize(
            "no sink produced a valid artifact".to_string()
        ));
    }

    let mut result = ExecutionResult::done(spec.source.clone(), artifacts);
    result.frames_processed = frames_processed;
    result.missing_frames = missing_frames;
    result.sink_failures = sink_failures;
    result
}

/// Opens every requested sink. With a single sink, an open failure fails
/// the job; with several, failed sinks are dropped and recorded while the
/// job continues on the survivors.
fn open_sinks(
    spec: &RunSpec,
    metadata: &JobMetadata,
) -> Result<(Vec<Box<dyn CollectorSink>>, Vec<SinkFailure>), String> {
    let mut sinks = Vec::with_capacity(spec.sinks.len());
    let mut failures = Vec::new();
    for target in &spec.sinks {
        match open_sink(target.kind, metadata, &target.destination) {
            Ok(sink) => sinks.push(sink),
            Err(e) if spec.sinks.len() == 1 => return Err(e.to_string()),
            Err(e) => {
                log::warn!(
                    "{}: dropping {} sink: {e}",
                    spec.source.display(),
                    target.kind
                );
                failures.push(SinkFailure {
                    kind: target.kind,
                    stage: SinkStage::Open,
                    message: e.to_string(),
                });
            }
        }
    }
    if sinks.is_empty() {
        return Err("every requested sink failed to open".to_string());
    }
    Ok((sinks, failures))
}

/// Rejects estimates whose categories or array shapes deviate from the
/// engine's declared contract. A deviation means the engine is broken, so
/// it fails the job rather than one frame.
fn validate_shapes(record: &FrameRecord, metadata: &JobMetadata) -> Result<(), String> {
    for category in &metadata.categories {
        match record.landmarks.get(&category.name) {
            Some(array) if array.dim() == (category.keypoints, category.coords) => {}
            Some(array) => {
                return Err(format!(
                    "category '{}' produced shape {:?}, declared ({}, {})",
                    category.name,
                    array.dim(),
                    category.keypoints,
                    category.coords
                ))
            }
            None => return Err(format!("category '{}' missing from estimate", category.name)),
        }
    }
    if let Some(extra) = record
        .landmarks
        .keys()
        .find(|name| metadata.category(name).is_none())
    {
        return Err(format!("undeclared category '{extra}' in estimate"));
    }
    Ok(())
}

fn job_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn transition(spec: &RunSpec, state: &mut JobState, to: JobState) {
    log::debug!("{}: {state:?} -> {to:?}", spec.source.display());
    *state = to;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::infrastructure::sequential_executor::SequentialExecutor;
    use crate::pipeline::infrastructure::thread_pool_executor::ThreadPoolExecutor;
    use crate::pipeline::run_spec::SinkTarget;
    use crate::shared::frame::Frame;
    use crate::shared::landmarks::CategorySpec;
    use crate::sinks::infrastructure::chunked_store::ChunkedStoreReader;
    use crate::sinks::infrastructure::sink_factory::SinkKind;
    use crate::video::infrastructure::synthetic_reader::SyntheticReader;
    use ndarray::Array2;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const WIDTH: u32 = 32;
    const HEIGHT: u32 = 24;
    const FRAMES: usize = 10;

    fn synthetic_factory() -> ReaderFactory {
        Arc::new(|| Box::new(SyntheticReader::new(WIDTH, HEIGHT, FRAMES, 25.0)))
    }

    fn spec_with_sinks(out: &Path, kinds: &[SinkKind]) -> RunSpec {
        RunSpec {
            source: PathBuf::from("clip.mp4"),
            sinks: kinds
                .iter()
                .map(|&kind| SinkTarget {
                    kind,
                    destination: out.join("clip").with_extension(kind.extension()),
                })
                .collect(),
            estimator: Default::default(),
            frame_cap: None,
        }
    }

    fn use_case() -> ExtractLandmarksUseCase {
        ExtractLandmarksUseCase::new(Box::new(SequentialExecutor::new()))
            .with_reader_factory(synthetic_factory())
    }

    fn run_stubbed(spec: &RunSpec, estimator: Box<dyn LandmarkEstimator>) -> ExecutionResult {
        let mut reader = SyntheticReader::new(WIDTH, HEIGHT, FRAMES, 25.0);
        run_job_with_estimator(
            spec,
            &mut reader,
            estimator,
            &AtomicBool::new(false),
            None,
        )
    }

    // --- stub estimators ---

    struct FlakyEstimator {
        categories: Vec<CategorySpec>,
        fail_on: usize,
        fatal: bool,
    }

    impl FlakyEstimator {
        fn new(fail_on: usize, fatal: bool) -> Self {
            Self {
                categories: vec![CategorySpec::new("centroid", 1, 2)],
                fail_on,
                fatal,
            }
        }
    }

    impl LandmarkEstimator for FlakyEstimator {
        fn categories(&self) -> &[CategorySpec] {
            &self.categories
        }

        fn estimate(&mut self, frame: &Frame) -> Result<FrameEstimate, EstimatorError> {
            if frame.index() == self.fail_on {
                if self.fatal {
                    return Err(EstimatorError::Fatal("engine wedged".to_string()));
                }
                return Err(EstimatorError::Frame {
                    index: frame.index(),
                    message: "blurry".to_string(),
                });
            }
            let mut landmarks = BTreeMap::new();
            landmarks.insert(
                "centroid".to_string(),
                Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap(),
            );
            Ok(FrameEstimate::Detected(landmarks))
        }
    }

    struct WrongShapeEstimator {
        categories: Vec<CategorySpec>,
    }

    impl LandmarkEstimator for WrongShapeEstimator {
        fn categories(&self) -> &[CategorySpec] {
            &self.categories
        }

        fn estimate(&mut self, _frame: &Frame) -> Result<FrameEstimate, EstimatorError> {
            let mut landmarks = BTreeMap::new();
            landmarks.insert("centroid".to_string(), Array2::zeros((3, 3)));
            Ok(FrameEstimate::Detected(landmarks))
        }
    }

    // --- end to end ---

    #[test]
    fn test_ten_frame_job_produces_csv_and_chunks() {
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Csv, SinkKind::Chunks]);

        let report = use_case().execute(std::slice::from_ref(&spec));
        assert!(report.all_done());
        let result = &report.results[0];
        assert_eq!(result.frames_processed, FRAMES);
        assert_eq!(result.missing_frames, 0);
        assert_eq!(result.artifacts().len(), 2);

        let csv = fs::read_to_string(out.path().join("clip.csv")).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), FRAMES + 1);
        assert_eq!(lines[0], "frame,centroid.0.x,centroid.0.y");

        let store = ChunkedStoreReader::open(&out.path().join("clip.chunks")).unwrap();
        assert_eq!(store.attributes().frame_count, Some(FRAMES));
        let array = store.read_category("centroid").unwrap();
        assert_eq!(array.dim(), (FRAMES, 2));
    }

    #[test]
    fn test_executor_strategies_produce_identical_artifacts() {
        let reference = TempDir::new().unwrap();
        let spec = spec_with_sinks(reference.path(), &[SinkKind::Csv]);
        assert!(use_case().execute(std::slice::from_ref(&spec)).all_done());
        let expected = fs::read(reference.path().join("clip.csv")).unwrap();

        for workers in [1, 2, 8] {
            let out = TempDir::new().unwrap();
            let spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
            let pooled = ExtractLandmarksUseCase::new(Box::new(ThreadPoolExecutor::new(workers)))
                .with_reader_factory(synthetic_factory());
            assert!(pooled.execute(std::slice::from_ref(&spec)).all_done());
            let actual = fs::read(out.path().join("clip.csv")).unwrap();
            assert_eq!(actual, expected, "workers={workers}");
        }
    }

    #[test]
    fn test_worker_protocol_matches_sequential_artifacts() {
        use crate::pipeline::infrastructure::process_pool_executor::serve_worker;

        let reference = TempDir::new().unwrap();
        let spec = spec_with_sinks(reference.path(), &[SinkKind::Csv, SinkKind::Chunks]);
        assert!(use_case().execute(std::slice::from_ref(&spec)).all_done());
        let expected_csv = fs::read(reference.path().join("clip.csv")).unwrap();
        let expected_store = ChunkedStoreReader::open(&reference.path().join("clip.chunks"))
            .unwrap()
            .read_category("centroid")
            .unwrap();

        // Same job through the process pool's stdin/stdout protocol.
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Csv, SinkKind::Chunks]);
        let input = serde_json::to_vec(&spec).unwrap();
        let mut output = Vec::new();
        serve_worker(input.as_slice(), &mut output, &|spec: &RunSpec| {
            let mut reader = SyntheticReader::new(WIDTH, HEIGHT, FRAMES, 25.0);
            run_job(spec, &mut reader, &AtomicBool::new(false), None)
        })
        .unwrap();

        let result: ExecutionResult = serde_json::from_slice(&output).unwrap();
        assert!(result.is_done());
        assert_eq!(result.frames_processed, FRAMES);

        let actual_csv = fs::read(out.path().join("clip.csv")).unwrap();
        assert_eq!(actual_csv, expected_csv);
        let store = ChunkedStoreReader::open(&out.path().join("clip.chunks")).unwrap();
        assert_eq!(store.attributes().frame_count, Some(FRAMES));
        assert_eq!(store.read_category("centroid").unwrap(), expected_store);
    }

    #[test]
    fn test_batch_results_match_spec_order() {
        let out = TempDir::new().unwrap();
        let specs: Vec<_> = (0..4)
            .map(|i| {
                let mut spec = spec_with_sinks(out.path(), &[SinkKind::Npy]);
                spec.source = PathBuf::from(format!("clip{i}.mp4"));
                spec.sinks[0].destination = out.path().join(format!("clip{i}.npy"));
                spec
            })
            .collect();

        let pooled = ExtractLandmarksUseCase::new(Box::new(ThreadPoolExecutor::new(3)))
            .with_reader_factory(synthetic_factory());
        let report = pooled.execute(&specs);
        assert!(report.all_done());
        let sources: Vec<_> = report.results.iter().map(|r| r.source.clone()).collect();
        let expected: Vec<_> = specs.iter().map(|s| s.source.clone()).collect();
        assert_eq!(sources, expected);
    }

    // --- failure classification ---

    #[test]
    fn test_video_open_failure_fails_job() {
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
        // 2x2 synthetic frames are rejected at open.
        let tiny: ReaderFactory = Arc::new(|| Box::new(SyntheticReader::new(2, 2, FRAMES, 25.0)));
        let uc = ExtractLandmarksUseCase::new(Box::new(SequentialExecutor::new()))
            .with_reader_factory(tiny);

        let report = uc.execute(std::slice::from_ref(&spec));
        assert!(matches!(report.results[0].error(), Some(JobError::VideoOpen(_))));
        assert!(!out.path().join("clip.csv").exists());
    }

    /// Synthetic reader that refuses to open any path containing "bad".
    struct PathSensitiveReader(SyntheticReader);

    impl VideoReader for PathSensitiveReader {
        fn open(
            &mut self,
            path: &Path,
        ) -> Result<crate::shared::video_metadata::VideoMetadata, crate::video::domain::video_reader::VideoOpenError>
        {
            if path.to_string_lossy().contains("bad") {
                return Err(crate::video::domain::video_reader::VideoOpenError::Open {
                    path: path.to_path_buf(),
                    message: "unreadable container".to_string(),
                });
            }
            self.0.open(path)
        }

        fn next_frame(
            &mut self,
        ) -> Option<Result<Frame, crate::video::domain::video_reader::VideoReadError>> {
            self.0.next_frame()
        }

        fn close(&mut self) {
            self.0.close();
        }
    }

    #[test]
    fn test_failed_job_does_not_block_siblings() {
        let out = TempDir::new().unwrap();
        let mut specs = Vec::new();
        for name in ["a.mp4", "bad.mp4", "c.mp4"] {
            let mut spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
            spec.source = PathBuf::from(name);
            let stem = name.trim_end_matches(".mp4");
            spec.sinks[0].destination = out.path().join(format!("{stem}.csv"));
            specs.push(spec);
        }

        let factory: ReaderFactory = Arc::new(|| {
            Box::new(PathSensitiveReader(SyntheticReader::new(
                WIDTH, HEIGHT, FRAMES, 25.0,
            )))
        });
        let uc = ExtractLandmarksUseCase::new(Box::new(SequentialExecutor::new()))
            .with_reader_factory(factory);

        let report = uc.execute(&specs);
        assert_eq!(report.done_count(), 2);
        assert!(matches!(report.results[1].error(), Some(JobError::VideoOpen(_))));
        assert!(out.path().join("a.csv").exists());
        assert!(out.path().join("c.csv").exists());
        assert!(!out.path().join("bad.csv").exists());
    }

    #[test]
    fn test_recoverable_frame_failure_records_missing_data() {
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);

        let result = run_stubbed(&spec, Box::new(FlakyEstimator::new(2, false)));
        assert!(result.is_done());
        assert_eq!(result.frames_processed, FRAMES);
        assert_eq!(result.missing_frames, 1);

        let csv = fs::read_to_string(out.path().join("clip.csv")).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), FRAMES + 1);
        assert_eq!(lines[3], "2,NaN,NaN");
    }

    #[test]
    fn test_fatal_estimator_failure_leaves_sinks_unfinalized() {
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Chunks]);

        let result = run_stubbed(&spec, Box::new(FlakyEstimator::new(3, true)));
        assert!(matches!(result.error(), Some(JobError::EstimationFatal(_))));
        assert_eq!(result.frames_processed, 3);

        // Crashed-job store stays inspectable but marked unfinished.
        let store = ChunkedStoreReader::open(&out.path().join("clip.chunks")).unwrap();
        assert_eq!(store.attributes().frame_count, None);
        assert_eq!(store.read_category("centroid").unwrap().dim(), (3, 2));
    }

    #[test]
    fn test_shape_contract_violation_is_fatal() {
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
        let estimator = WrongShapeEstimator {
            categories: vec![CategorySpec::new("centroid", 1, 2)],
        };

        let result = run_stubbed(&spec, Box::new(estimator));
        assert!(matches!(result.error(), Some(JobError::EstimationFatal(_))));
        assert_eq!(result.frames_processed, 0);
    }

    #[test]
    fn test_single_sink_open_failure_fails_job() {
        let out = TempDir::new().unwrap();
        let blocker = out.path().join("taken");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let mut spec = spec_with_sinks(out.path(), &[SinkKind::Chunks]);
        spec.sinks[0].destination = blocker.join("clip.chunks");

        let report = use_case().execute(std::slice::from_ref(&spec));
        assert!(matches!(report.results[0].error(), Some(JobError::SinkInit(_))));
    }

    #[test]
    fn test_failed_sink_is_dropped_when_others_survive() {
        let out = TempDir::new().unwrap();
        let blocker = out.path().join("taken");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let mut spec = spec_with_sinks(out.path(), &[SinkKind::Chunks, SinkKind::Csv]);
        spec.sinks[0].destination = blocker.join("clip.chunks");

        let report = use_case().execute(std::slice::from_ref(&spec));
        let result = &report.results[0];
        assert!(result.is_done());
        assert_eq!(result.sink_failures.len(), 1);
        assert_eq!(result.sink_failures[0].kind, SinkKind::Chunks);
        assert_eq!(result.sink_failures[0].stage, SinkStage::Open);
        assert!(out.path().join("clip.csv").exists());
    }

    #[test]
    fn test_frame_cap_stops_early() {
        let out = TempDir::new().unwrap();
        let mut spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
        spec.frame_cap = Some(4);

        let report = use_case().execute(std::slice::from_ref(&spec));
        let result = &report.results[0];
        assert!(result.is_done());
        assert_eq!(result.frames_processed, 4);
        let csv = fs::read_to_string(out.path().join("clip.csv")).unwrap();
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn test_progress_callback_can_cancel() {
        let out = TempDir::new().unwrap();
        let spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
        let uc = use_case().with_progress(Arc::new(|done, _total| done < 3));

        let report = uc.execute(std::slice::from_ref(&spec));
        let result = &report.results[0];
        assert_eq!(result.error(), Some(&JobError::Cancelled));
        assert_eq!(result.frames_processed, 3);
    }

    #[test]
    fn test_progress_reports_capped_total() {
        let out = TempDir::new().unwrap();
        let mut spec = spec_with_sinks(out.path(), &[SinkKind::Csv]);
        spec.frame_cap = Some(6);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let uc = use_case().with_progress(Arc::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
            true
        }));

        assert!(uc.execute(std::slice::from_ref(&spec)).all_done());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 6);
        assert!(seen.iter().all(|&(_, total)| total == 6));
    }
}
