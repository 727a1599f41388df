//! Video landmark extraction pipeline.
//!
//! Turns a request ("process this video or this directory of videos, with
//! this estimator, into these output formats, using N workers") into a
//! concurrently executed, failure-isolated set of per-video jobs. Each job
//! decodes frames strictly in order, runs them through a [`estimation`]
//! port, and fans every frame's result out to the job's [`sinks`].

pub mod estimation;
pub mod pipeline;
pub mod shared;
pub mod sinks;
pub mod video;
