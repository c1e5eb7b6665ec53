use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered chunk of a source document, the unit of classification.
///
/// Segments are produced upstream and are immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    id: String,
    heading_path: Vec<String>,
    content: String,
    context: Option<String>,
    file_path: Option<String>,
}

impl Segment {
    /// Create a segment with no context annotation and no origin file.
    #[must_use]
    pub fn new(id: impl Into<String>, heading_path: Vec<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            heading_path,
            content: content.into(),
            context: None,
            file_path: None,
        }
    }

    /// Attach a free-text context annotation.
    ///
    /// Blank annotations are discarded.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        let context = context.trim();
        self.context = (!context.is_empty()).then(|| context.to_string());
        self
    }

    /// Record the file the segment was read from.
    #[must_use]
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// The stable segment identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Headings enclosing this segment, outermost first.
    #[must_use]
    pub fn heading_path(&self) -> &[String] {
        &self.heading_path
    }

    /// The innermost heading, if any.
    #[must_use]
    pub fn heading(&self) -> Option<&str> {
        self.heading_path
            .last()
            .map(String::as_str)
            .filter(|h| !h.trim().is_empty())
    }

    /// The raw text of the segment.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The context annotation, if the segment carries one.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The file the segment was read from, relative to the segment directory.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }
}

/// The kind of content a segment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentCategory {
    /// Behaviour the system must exhibit.
    FunctionalRequirement,
    /// A quality attribute (performance, security, ...).
    NonFunctionalRequirement,
    /// Background, scope or glossary with no concrete behaviour.
    Overview,
    /// Anything else (appendices, change logs, notes).
    Other,
}

impl SegmentCategory {
    /// All categories, in the order a classifier is asked to choose from.
    pub const ALL: [Self; 4] = [
        Self::FunctionalRequirement,
        Self::NonFunctionalRequirement,
        Self::Overview,
        Self::Other,
    ];

    /// Interpret a label produced by a classifier.
    ///
    /// Unknown labels normalize to [`SegmentCategory::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == label.trim())
            .unwrap_or(Self::Other)
    }

    /// The wire label of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FunctionalRequirement => "functional_requirement",
            Self::NonFunctionalRequirement => "non_functional_requirement",
            Self::Overview => "overview",
            Self::Other => "other",
        }
    }

    /// Whether examples are generated for segments of this category.
    #[must_use]
    pub const fn is_example_target(self) -> bool {
        matches!(
            self,
            Self::FunctionalRequirement | Self::NonFunctionalRequirement
        )
    }
}

impl fmt::Display for SegmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
