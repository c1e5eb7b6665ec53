use crate::{
    domain::{Segment, SegmentCategory},
    enrich::{ClassificationResult, Classifier, ServiceError},
    extract,
};

/// Rule-based classification from the segment text alone.
///
/// Without a service to tell requirements apart from prose, every segment
/// is treated as a functional requirement.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternClassifier;

impl PatternClassifier {
    /// Classify a segment. This cannot fail.
    #[must_use]
    pub fn classify_segment(segment: &Segment) -> ClassificationResult {
        ClassificationResult {
            category: SegmentCategory::FunctionalRequirement,
            candidate_id: extract::explicit_id(segment.content()).map(|id| id.to_string()),
            title: segment.heading().map(str::to_string),
            examples: extract::examples(segment.content()),
        }
    }
}

impl Classifier for PatternClassifier {
    fn classify(
        &self,
        segment: &Segment,
        _context: &[&Segment],
    ) -> Result<ClassificationResult, ServiceError> {
        Ok(Self::classify_segment(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_everything_from_text() {
        let segment = Segment::new(
            "seg-0001",
            vec!["Spec".to_string(), "Login".to_string()],
            "### REQ-004: Login\nGiven: a user\nWhen: they log in\nThen: they see the dashboard",
        );

        let result = PatternClassifier.classify(&segment, &[]).unwrap();

        assert_eq!(result.category, SegmentCategory::FunctionalRequirement);
        assert_eq!(result.candidate_id.as_deref(), Some("REQ-004"));
        assert_eq!(result.title.as_deref(), Some("Login"));
        assert_eq!(result.examples.len(), 1);
    }

    #[test]
    fn plain_prose_is_still_a_requirement() {
        let segment = Segment::new("seg-0002", vec![], "Some background.");
        let result = PatternClassifier::classify_segment(&segment);

        assert_eq!(result.category, SegmentCategory::FunctionalRequirement);
        assert_eq!(result.candidate_id, None);
        assert_eq!(result.title, None);
        assert!(result.examples.is_empty());
    }
}
