use std::collections::HashSet;

use non_empty_string::NonEmptyString;

use crate::domain::{Example, ExampleId, ReqId};

/// Where a requirement record came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// Identifier of the segment the record was synthesized from.
    pub segment_id: String,
    /// Heading path of that segment, outermost first.
    pub heading_path: Vec<String>,
    /// The file the segment was read from.
    pub file_path: Option<String>,
}

/// A requirement record.
///
/// A record is synthesized once per identifier per pipeline run. It can
/// accumulate examples and questions from several contributing segments
/// while the run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    /// Unique requirement identifier.
    pub id: ReqId,
    /// Human readable title.
    pub title: NonEmptyString,
    /// Optional longer description.
    pub description: Option<String>,
    /// Provenance of the record.
    pub source: SourceInfo,
    /// Identifiers of requirements this one depends on.
    pub depends: Vec<ReqId>,
    /// Acceptance examples.
    pub examples: Vec<Example>,
    /// Open questions found in the source text.
    pub questions: Vec<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
}

impl Spec {
    /// Create a record with no examples, questions, dependencies or tags.
    #[must_use]
    pub const fn new(id: ReqId, title: NonEmptyString, source: SourceInfo) -> Self {
        Self {
            id,
            title,
            description: None,
            source,
            depends: Vec::new(),
            examples: Vec::new(),
            questions: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Check the record-local invariants.
    ///
    /// The identifier and title are valid by construction; this checks the
    /// examples and the dependency list.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvalidSpec> {
        if let Some(index) = self.examples.iter().position(|ex| !ex.is_valid()) {
            return Err(InvalidSpec::IncompleteExample {
                id: self.id,
                position: index + 1,
            });
        }

        let mut seen = HashSet::with_capacity(self.depends.len());
        for &dependency in &self.depends {
            if dependency == self.id {
                return Err(InvalidSpec::SelfDependency(self.id));
            }
            if !seen.insert(dependency) {
                return Err(InvalidSpec::DuplicateDependency {
                    id: self.id,
                    dependency,
                });
            }
        }

        Ok(())
    }

    /// Give every unnumbered example the next free identifier.
    ///
    /// Existing identifiers are left alone.
    pub fn normalize(&mut self) {
        let mut next = self
            .examples
            .iter()
            .filter_map(Example::id)
            .max()
            .map_or(ExampleId::FIRST, ExampleId::next);

        for example in &mut self.examples {
            if example.id().is_none() {
                *example = example.clone().with_id(next);
                next = next.next();
            }
        }
    }
}

/// A record-level invariant violation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidSpec {
    /// An example has an empty Given, When or Then clause.
    #[error("{id}: example {position} must include given/when/then")]
    IncompleteExample {
        /// The offending record.
        id: ReqId,
        /// 1-based position of the example.
        position: usize,
    },

    /// The record lists itself as a dependency.
    #[error("{0}: depends on itself")]
    SelfDependency(ReqId),

    /// A dependency is listed more than once.
    #[error("{id}: duplicate dependency {dependency}")]
    DuplicateDependency {
        /// The offending record.
        id: ReqId,
        /// The repeated dependency.
        dependency: ReqId,
    },
}
