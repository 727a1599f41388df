use std::collections::BTreeMap;

use ndarray::Array2;
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::landmarks::CategorySpec;

/// Estimation failure, split into the recoverable and fatal classes the
/// runner reacts to.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// The engine could not be constructed or loaded. Fatal to the job
    /// before any frame is processed.
    #[error("estimator failed to initialize: {0}")]
    Init(String),
    /// One frame's estimate failed. The runner records the frame as
    /// missing data and continues.
    #[error("estimation failed on frame {index}: {message}")]
    Frame { index: usize, message: String },
    /// The engine is in an unrecoverable state. Fails the whole job.
    #[error("estimator failed fatally: {0}")]
    Fatal(String),
}

/// One frame's estimate: landmark arrays per category, or an explicit
/// no-detection marker.
///
/// The typed result makes the recoverable/fatal distinction a contract:
/// `Missing` and `Err(Frame)` both yield a NaN-filled record, while
/// `Err(Fatal)` aborts the job.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameEstimate {
    Detected(BTreeMap<String, Array2<f64>>),
    Missing,
}

/// Port to the external detection engine.
///
/// Implementations may hold per-sequence state (e.g. a tracked region of
/// interest), hence `&mut self`; the runner guarantees frames of one video
/// arrive strictly in increasing order and never shares an estimator
/// across jobs.
pub trait LandmarkEstimator: Send {
    /// Declared output shape per category. Stable for the lifetime of the
    /// estimator; the runner rejects estimates that deviate from it.
    fn categories(&self) -> &[CategorySpec];

    /// Estimates landmarks for one frame.
    fn estimate(&mut self, frame: &Frame) -> Result<FrameEstimate, EstimatorError>;
}
