//! Domain models for the enrichment pipeline.
//!
//! This module contains the core data types: requirement identifiers,
//! segments and their categories, acceptance examples, requirement records,
//! and configuration.

mod config;
pub use config::{Config, DEFAULT_PATH as DEFAULT_CONFIG_PATH};

/// Requirement identifier type and parsing.
pub mod req_id;
pub use req_id::{Error as ReqIdError, ReqId};

mod segment;
pub use segment::{Segment, SegmentCategory};

mod example;
pub use example::{Example, ExampleId, InvalidExampleId};

mod spec;
pub use spec::{InvalidSpec, SourceInfo, Spec};

/// Dependency graph checks across a set of records.
pub mod graph;
pub use graph::{GraphError, validate_dependencies};
