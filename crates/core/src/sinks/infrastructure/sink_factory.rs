use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::landmarks::JobMetadata;
use crate::sinks::domain::collector_sink::{CollectorSink, SinkError};
use crate::sinks::infrastructure::archive_sink::ArchiveSink;
use crate::sinks::infrastructure::chunked_store::ChunkedStoreSink;
use crate::sinks::infrastructure::csv_sink::CsvSink;
use crate::sinks::infrastructure::npy_sink::NpySink;
use crate::sinks::infrastructure::safetensors_sink::SafetensorsSink;

/// The supported output formats.
///
/// Serves as the sink registry: adding a variant forces `open_sink` and
/// `extension` to handle it, keeping format dispatch compile-time checked
/// rather than string-keyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Csv,
    Npy,
    Npz,
    Chunks,
    Safetensors,
}

impl SinkKind {
    pub const ALL: &'static [SinkKind] = &[
        SinkKind::Csv,
        SinkKind::Npy,
        SinkKind::Npz,
        SinkKind::Chunks,
        SinkKind::Safetensors,
    ];

    /// Extension (or directory suffix, for the chunked store) the resolver
    /// appends to a job's output stem for this format.
    pub fn extension(self) -> &'static str {
        match self {
            SinkKind::Csv => "csv",
            SinkKind::Npy => "npy",
            SinkKind::Npz => "npz",
            SinkKind::Chunks => "chunks",
            SinkKind::Safetensors => "safetensors",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SinkKind::Csv => "csv",
            SinkKind::Npy => "npy",
            SinkKind::Npz => "npz",
            SinkKind::Chunks => "chunks",
            SinkKind::Safetensors => "safetensors",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SinkKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = SinkKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown sink kind '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// Allocates a sink of the given kind for one job. The returned sink is
/// owned exclusively by that job and must be finalized exactly once.
pub fn open_sink(
    kind: SinkKind,
    metadata: &JobMetadata,
    destination: &Path,
) -> Result<Box<dyn CollectorSink>, SinkError> {
    Ok(match kind {
        SinkKind::Csv => Box::new(CsvSink::open(metadata, destination)?),
        SinkKind::Npy => Box::new(NpySink::open(metadata, destination)?),
        SinkKind::Npz => Box::new(ArchiveSink::open(metadata, destination)?),
        SinkKind::Chunks => Box::new(ChunkedStoreSink::open(metadata, destination)?),
        SinkKind::Safetensors => Box::new(SafetensorsSink::open(metadata, destination)?),
    })
}
