//! Segment-to-spec enrichment
//!
//! Turns a pre-segmented specification document into canonical requirement
//! records (`REQ-001.yml`, ...) with Given/When/Then acceptance examples.
//!
//! Segments are read from a [`SegmentSource`], classified either from their
//! text alone or through a completion service, given stable identifiers, and
//! consolidated by the [`Pipeline`]. The resulting records are stored by a
//! [`Materializer`].

pub mod domain;
pub use domain::{Config, Example, ExampleId, ReqId, Segment, SegmentCategory, SourceInfo, Spec};

pub mod enrich;

pub mod extract;

pub mod pipeline;
pub use pipeline::{Mode, Options, Output, Phase, Pipeline, PipelineError, Report};

pub mod source;
pub use source::{KireSource, SegmentSource};

/// Persisting requirement records.
pub mod storage;
pub use storage::{Directory, Materializer, SpecStore};
