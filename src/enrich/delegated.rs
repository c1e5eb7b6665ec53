use std::{collections::HashSet, time::Duration};

use serde::Deserialize;

use crate::{
    domain::{Example, Segment, SegmentCategory},
    enrich::{
        BatchEnricher, ClassificationResult, Classified, Classifier, Completion,
        CompletionRequest, Generated, Response, Service, ServiceError, prompt,
    },
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExample {
    given: String,
    when: String,
    then: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClassification {
    segment_id: String,
    category: String,
    req_id: String,
    title: String,
    examples: Vec<RawExample>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGenerated {
    segment_id: String,
    examples: Vec<RawExample>,
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn examples(raw: Vec<RawExample>) -> Vec<Example> {
    raw.into_iter()
        .filter_map(|ex| Example::parse(&ex.given, &ex.when, &ex.then))
        .collect()
}

impl From<RawClassification> for ClassificationResult {
    fn from(raw: RawClassification) -> Self {
        Self {
            category: SegmentCategory::from_label(&raw.category),
            candidate_id: non_blank(&raw.req_id),
            title: non_blank(&raw.title),
            examples: examples(raw.examples),
        }
    }
}

/// Parse a batch response body.
///
/// A body that cannot be parsed is tolerated only when the service says it
/// ran out of output length; that counts as a truncated response with no
/// results. A response is also truncated when any submitted segment id is
/// missing from it, whatever the number of items.
fn parse_batch<R, T>(
    completion: &Completion,
    submitted: &[&Segment],
    convert: impl Fn(R) -> T,
    segment_id: impl Fn(&T) -> &str,
) -> Result<Response<T>, ServiceError>
where
    R: for<'de> Deserialize<'de>,
{
    let raw: Vec<R> = match serde_json::from_str(&completion.text) {
        Ok(raw) => raw,
        Err(_) if completion.is_length_limited() => return Ok(Response::truncated(Vec::new())),
        Err(e) => {
            return Err(ServiceError::InvalidResponse(format!(
                "failed to parse JSON response: {e}"
            )));
        }
    };

    let items: Vec<T> = raw.into_iter().map(convert).collect();
    let answered: HashSet<&str> = items.iter().map(&segment_id).collect();
    let missing = submitted
        .iter()
        .filter(|segment| !answered.contains(segment.id()))
        .count();
    if missing > 0 {
        tracing::debug!(missing, submitted = submitted.len(), "batch response is missing segments");
    }
    let truncated = missing > 0 || completion.is_length_limited();
    Ok(Response { items, truncated })
}

/// Classifies one segment per call through a completion service.
#[derive(Debug, Clone)]
pub struct ServiceClassifier {
    service: Service,
    model: String,
    timeout: Duration,
}

impl ServiceClassifier {
    /// Per-attempt timeout used unless overridden.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Classify with `model` through `service`.
    #[must_use]
    pub fn new(service: Service, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Classifier for ServiceClassifier {
    #[tracing::instrument(level = "debug", skip_all, fields(segment_id = segment.id()))]
    fn classify(
        &self,
        segment: &Segment,
        context: &[&Segment],
    ) -> Result<ClassificationResult, ServiceError> {
        let prompt = prompt::classify(segment, context);
        let schema = prompt::classify_schema();
        let completion = self.service.call(&CompletionRequest {
            model: &self.model,
            prompt: &prompt,
            schema: &schema,
            timeout: self.timeout,
        })?;

        let raw: RawClassification = serde_json::from_str(&completion.text).map_err(|e| {
            ServiceError::InvalidResponse(format!(
                "failed to parse JSON response for segment {}: {e}",
                segment.id()
            ))
        })?;

        Ok(raw.into())
    }
}

/// Classifies and generates examples for many segments per call.
#[derive(Debug, Clone)]
pub struct ServiceBatchEnricher {
    service: Service,
    classify_model: String,
    example_model: String,
    classify_timeout: Duration,
    example_timeout: Duration,
}

impl ServiceBatchEnricher {
    /// Per-attempt timeout for batch classification unless overridden.
    pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(60);

    /// Per-attempt timeout for batch example generation unless overridden.
    pub const DEFAULT_EXAMPLE_TIMEOUT: Duration = Duration::from_secs(180);

    /// Use `classify_model` for classification and `example_model` for
    /// example generation.
    #[must_use]
    pub fn new(
        service: Service,
        classify_model: impl Into<String>,
        example_model: impl Into<String>,
    ) -> Self {
        Self {
            service,
            classify_model: classify_model.into(),
            example_model: example_model.into(),
            classify_timeout: Self::DEFAULT_CLASSIFY_TIMEOUT,
            example_timeout: Self::DEFAULT_EXAMPLE_TIMEOUT,
        }
    }

    /// Set the per-attempt timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, classify: Duration, examples: Duration) -> Self {
        self.classify_timeout = classify;
        self.example_timeout = examples;
        self
    }
}

impl BatchEnricher for ServiceBatchEnricher {
    #[tracing::instrument(level = "debug", skip_all, fields(segments = segments.len()))]
    fn classify_batch(&self, segments: &[&Segment]) -> Result<Response<Classified>, ServiceError> {
        if segments.is_empty() {
            return Ok(Response::complete(Vec::new()));
        }

        let prompt = prompt::classify_batch(segments);
        let schema = prompt::classify_batch_schema();
        let completion = self.service.call(&CompletionRequest {
            model: &self.classify_model,
            prompt: &prompt,
            schema: &schema,
            timeout: self.classify_timeout,
        })?;

        parse_batch(
            &completion,
            segments,
            |raw: RawClassification| Classified {
                segment_id: raw.segment_id.trim().to_string(),
                result: raw.into(),
            },
            |item| item.segment_id.as_str(),
        )
    }

    #[tracing::instrument(level = "debug", skip_all, fields(segments = segments.len(), context = context.len()))]
    fn generate_examples_batch(
        &self,
        segments: &[&Segment],
        context: &[&Segment],
    ) -> Result<Response<Generated>, ServiceError> {
        if segments.is_empty() {
            return Ok(Response::complete(Vec::new()));
        }

        let prompt = prompt::generate_examples(segments, context);
        let schema = prompt::generate_examples_schema();
        let completion = self.service.call(&CompletionRequest {
            model: &self.example_model,
            prompt: &prompt,
            schema: &schema,
            timeout: self.example_timeout,
        })?;

        parse_batch(
            &completion,
            segments,
            |raw: RawGenerated| Generated {
                segment_id: raw.segment_id.trim().to_string(),
                examples: examples(raw.examples),
            },
            |item| item.segment_id.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::enrich::service::tests::{Scripted, cut, ok, timeout};

    fn segment(id: &str) -> Segment {
        Segment::new(id, vec!["Heading".to_string()], "content")
    }

    fn batch_enricher(backend: &Arc<Scripted>) -> ServiceBatchEnricher {
        ServiceBatchEnricher::new(Service::new(backend.clone()), "classify", "examples")
    }

    #[test]
    fn single_classification_is_normalized() {
        let backend = Arc::new(Scripted::new(vec![ok(
            r#"{"category": "requirement", "req_id": " REQ-007 ", "title": "  Login ",
                "examples": [
                    {"given": " a user ", "when": "they log in", "then": "ok"},
                    {"given": "", "when": "x", "then": "y"}
                ]}"#,
        )]));
        let classifier = ServiceClassifier::new(Service::new(backend.clone()), "model");

        let result = classifier.classify(&segment("seg-0000"), &[]).unwrap();

        assert_eq!(result.category, SegmentCategory::Other);
        assert_eq!(result.candidate_id.as_deref(), Some("REQ-007"));
        assert_eq!(result.title.as_deref(), Some("Login"));
        assert_eq!(result.examples, [Example::new("a user", "they log in", "ok")]);
    }

    #[test]
    fn single_classification_fails_after_retries() {
        let backend = Arc::new(Scripted::new(vec![timeout(), timeout(), timeout()]));
        let classifier = ServiceClassifier::new(Service::new(backend.clone()), "model");

        assert!(matches!(
            classifier.classify(&segment("seg-0000"), &[]),
            Err(ServiceError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn unparseable_single_classification_is_an_error() {
        let backend = Arc::new(Scripted::new(vec![ok("not json")]));
        let classifier = ServiceClassifier::new(Service::new(backend), "model");

        assert!(matches!(
            classifier.classify(&segment("seg-0000"), &[]),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn complete_batch_is_not_truncated() {
        let backend = Arc::new(Scripted::new(vec![ok(
            r#"[{"segment_id": "a", "category": "overview", "title": "Intro"},
                {"segment_id": "b", "category": "functional_requirement", "title": "Login", "req_id": ""}]"#,
        )]));
        let (a, b) = (segment("a"), segment("b"));

        let response = batch_enricher(&backend).classify_batch(&[&a, &b]).unwrap();

        assert!(!response.truncated);
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].result.category, SegmentCategory::Overview);
        assert_eq!(response.items[1].result.candidate_id, None);
    }

    #[test]
    fn short_batch_is_truncated() {
        let backend = Arc::new(Scripted::new(vec![ok(
            r#"[{"segment_id": "a", "category": "overview", "title": "Intro"}]"#,
        )]));
        let (a, b) = (segment("a"), segment("b"));

        let response = batch_enricher(&backend).classify_batch(&[&a, &b]).unwrap();

        assert!(response.truncated);
        assert_eq!(response.items.len(), 1);
    }

    #[test]
    fn repeated_segment_ids_are_truncated() {
        let backend = Arc::new(Scripted::new(vec![ok(
            r#"[{"segment_id": "a", "examples": [{"given": "g", "when": "w", "then": "t"}]},
                {"segment_id": "a", "examples": []}]"#,
        )]));
        let (a, b) = (segment("a"), segment("b"));

        let response = batch_enricher(&backend)
            .generate_examples_batch(&[&a, &b], &[])
            .unwrap();

        assert!(response.truncated);
        assert_eq!(response.items.len(), 2);
    }

    #[test]
    fn length_limited_batch_is_truncated_even_if_parseable() {
        let backend = Arc::new(Scripted::new(vec![cut(
            r#"[{"segment_id": "a", "examples": []}]"#,
        )]));
        let a = segment("a");

        let response = batch_enricher(&backend)
            .generate_examples_batch(&[&a], &[])
            .unwrap();

        assert!(response.truncated);
        assert_eq!(response.items.len(), 1);
    }

    #[test]
    fn cut_off_json_is_truncated_with_no_items() {
        let backend = Arc::new(Scripted::new(vec![cut(r#"[{"segment_id": "a", "exam"#)]));
        let (a, b) = (segment("a"), segment("b"));

        let response = batch_enricher(&backend)
            .generate_examples_batch(&[&a, &b], &[])
            .unwrap();

        assert!(response.truncated);
        assert!(response.items.is_empty());
    }

    #[test]
    fn malformed_complete_response_is_an_error() {
        let backend = Arc::new(Scripted::new(vec![ok("{}")]));
        let a = segment("a");

        assert!(matches!(
            batch_enricher(&backend).generate_examples_batch(&[&a], &[]),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn generated_examples_drop_incomplete_triples() {
        let backend = Arc::new(Scripted::new(vec![ok(
            r#"[{"segment_id": " a ", "examples": [
                {"given": "g", "when": "w", "then": "t"},
                {"given": "g", "when": "w"}
            ]}]"#,
        )]));
        let a = segment("a");

        let response = batch_enricher(&backend)
            .generate_examples_batch(&[&a], &[])
            .unwrap();

        assert_eq!(response.items[0].segment_id, "a");
        assert_eq!(response.items[0].examples, [Example::new("g", "w", "t")]);
    }

    #[test]
    fn empty_batch_makes_no_call() {
        let backend = Arc::new(Scripted::new(vec![]));
        let response = batch_enricher(&backend).classify_batch(&[]).unwrap();
        assert!(response.items.is_empty());
        assert_eq!(backend.calls(), 0);
    }
}
