//! Segment classification and example generation.
//!
//! A [`Classifier`] labels one segment at a time. The
//! [`PatternClassifier`] works from the text alone and never fails; the
//! [`ServiceClassifier`] delegates to a completion service. A
//! [`BatchEnricher`] covers many segments per call and is driven by the
//! recursive split in [`batch`].

use crate::domain::{Example, Segment, SegmentCategory};

pub mod batch;
pub use batch::{BatchEnricher, BatchError, Failure, Outcome, Response, SplitPolicy};

mod delegated;
pub use delegated::{ServiceBatchEnricher, ServiceClassifier};

pub mod gemini;
pub use gemini::GeminiBackend;

mod pattern;
pub use pattern::PatternClassifier;

pub mod prompt;

mod service;
pub use service::{
    CancelFlag, Completion, CompletionBackend, CompletionRequest, FinishReason, Service,
    ServiceError,
};

/// The outcome of classifying a single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// The assigned category.
    pub category: SegmentCategory,

    /// An identifier proposed by the classifier.
    ///
    /// This is unvalidated text; the allocator re-checks it.
    pub candidate_id: Option<String>,

    /// A proposed title.
    pub title: Option<String>,

    /// Proposed acceptance examples, unnumbered.
    pub examples: Vec<Example>,
}

impl ClassificationResult {
    /// A result with the given category and nothing else.
    #[must_use]
    pub const fn new(category: SegmentCategory) -> Self {
        Self {
            category,
            candidate_id: None,
            title: None,
            examples: Vec::new(),
        }
    }
}

/// Assigns a category to a segment and proposes an identifier, title and
/// examples.
pub trait Classifier: Send + Sync {
    /// Classify `segment`.
    ///
    /// `context` holds segments carrying cross-cutting rules (typically the
    /// overview segments seen so far).
    ///
    /// # Errors
    ///
    /// Returns an error if the classification could not be obtained.
    /// Callers fall back to the [`PatternClassifier`].
    fn classify(
        &self,
        segment: &Segment,
        context: &[&Segment],
    ) -> Result<ClassificationResult, ServiceError>;
}

/// A batch classification result for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// The segment the result belongs to.
    pub segment_id: String,
    /// The classification.
    pub result: ClassificationResult,
}

/// Batch-generated examples for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// The segment the examples belong to.
    pub segment_id: String,
    /// The generated examples, unnumbered.
    pub examples: Vec<Example>,
}
