use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::estimation::infrastructure::estimator_factory::EstimatorConfig;
use crate::shared::constants::VIDEO_EXTENSIONS;
use crate::sinks::infrastructure::sink_factory::SinkKind;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("source path does not exist: {0}")]
    SourceMissing(PathBuf),
    #[error("source path is neither a file nor a directory: {0}")]
    NotFileOrDirectory(PathBuf),
    #[error("no files matching '{pattern}' in {directory}")]
    NoMatches { directory: PathBuf, pattern: String },
    #[error("invalid filename pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("failed to create output directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
}

/// One sink to open for a job: the format and the exact path (or, for the
/// chunked store, directory) its artifact lands at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkTarget {
    pub kind: SinkKind,
    pub destination: PathBuf,
}

/// One resolved unit of work. Immutable once built; serializable so the
/// process-pool strategy can hand it to a worker process over stdin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub source: PathBuf,
    pub sinks: Vec<SinkTarget>,
    pub estimator: EstimatorConfig,
    /// Stop after this many frames even if the video has more.
    pub frame_cap: Option<usize>,
}

/// A batch request as handed in by the caller, before path resolution.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub formats: Vec<SinkKind>,
    /// Filename glob applied in directory mode. `None` matches every file
    /// with a known video extension.
    pub pattern: Option<String>,
    pub recursive: bool,
    pub workers: usize,
    pub frame_cap: Option<usize>,
    pub estimator: EstimatorConfig,
}

impl RunConfig {
    pub fn new(source: PathBuf, destination: PathBuf, formats: Vec<SinkKind>) -> Self {
        Self {
            source,
            destination,
            formats,
            pattern: None,
            recursive: false,
            workers: num_cpus::get(),
            frame_cap: None,
            estimator: EstimatorConfig::default(),
        }
    }
}

/// Turns a [`RunConfig`] into the list of jobs to execute.
///
/// A file source yields exactly one spec; a directory source yields one
/// spec per matching file, in lexicographic path order. Output directories
/// are created here so that sink `open` only ever deals with files.
pub fn resolve_run_specs(config: &RunConfig) -> Result<Vec<RunSpec>, PathError> {
    if !config.source.exists() {
        return Err(PathError::SourceMissing(config.source.clone()));
    }

    if config.source.is_file() {
        let base = single_file_base(&config.source, &config.destination);
        ensure_parent_dir(&base)?;
        return Ok(vec![build_spec(config, &config.source, &base)]);
    }

    if !config.source.is_dir() {
        return Err(PathError::NotFileOrDirectory(config.source.clone()));
    }

    let matcher = FileMatcher::new(config.pattern.as_deref())?;
    let mut sources = enumerate_sources(&config.source, &matcher, config.recursive)?;
    if sources.is_empty() {
        return Err(PathError::NoMatches {
            directory: config.source.clone(),
            pattern: matcher.describe(),
        });
    }
    sources.sort();

    let mut specs = Vec::with_capacity(sources.len());
    for source in sources {
        // Mirror the source tree's relative layout under the destination.
        let relative = source
            .strip_prefix(&config.source)
            .unwrap_or(source.as_path());
        let base = config.destination.join(relative.with_extension(""));
        ensure_parent_dir(&base)?;
        specs.push(build_spec(config, &source, &base));
    }
    Ok(specs)
}

fn single_file_base(source: &Path, destination: &Path) -> PathBuf {
    if destination.is_dir() {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        destination.join(stem)
    } else {
        destination.with_extension("")
    }
}

fn build_spec(config: &RunConfig, source: &Path, base: &Path) -> RunSpec {
    let sinks = config
        .formats
        .iter()
        .map(|&kind| SinkTarget {
            kind,
            destination: base.with_extension(kind.extension()),
        })
        .collect();
    RunSpec {
        source: source.to_path_buf(),
        sinks,
        estimator: config.estimator.clone(),
        frame_cap: config.frame_cap,
    }
}

fn ensure_parent_dir(base: &Path) -> Result<(), PathError> {
    if let Some(parent) = base.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| PathError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

enum FileMatcher {
    Glob(Pattern),
    KnownExtensions,
}

impl FileMatcher {
    fn new(pattern: Option<&str>) -> Result<Self, PathError> {
        match pattern {
            Some(p) => Pattern::new(p)
                .map(FileMatcher::Glob)
                .map_err(|e| PathError::Pattern {
                    pattern: p.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(FileMatcher::KnownExtensions),
        }
    }

    fn matches(&self, path: &Path) -> bool {
        match self {
            FileMatcher::Glob(pattern) => path
                .file_name()
                .map(|name| pattern.matches(&name.to_string_lossy()))
                .unwrap_or(false),
            FileMatcher::KnownExtensions => path
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    VIDEO_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false),
        }
    }

    fn describe(&self) -> String {
        match self {
            FileMatcher::Glob(pattern) => pattern.as_str().to_string(),
            FileMatcher::KnownExtensions => format!("*.{{{}}}", VIDEO_EXTENSIONS.join(",")),
        }
    }
}

fn enumerate_sources(
    directory: &Path,
    matcher: &FileMatcher,
    recursive: bool,
) -> Result<Vec<PathBuf>, PathError> {
    if recursive {
        let mut matches = Vec::new();
        for entry in WalkDir::new(directory) {
            let entry = entry.map_err(|e| PathError::ReadDir {
                path: directory.to_path_buf(),
                source: io::Error::other(e.to_string()),
            })?;
            if entry.file_type().is_file() && matcher.matches(entry.path()) {
                matches.push(entry.into_path());
            }
        }
        return Ok(matches);
    }

    let entries = fs::read_dir(directory).map_err(|source| PathError::ReadDir {
        path: directory.to_path_buf(),
        source,
    })?;
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PathError::ReadDir {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && matcher.matches(&path) {
            matches.push(path);
        }
    }
    Ok(matches)
}
