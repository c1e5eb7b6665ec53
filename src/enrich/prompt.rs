//! Prompts and response schemas for the completion service.
//!
//! Schemas use the Gemini structured-output dialect (upper-case type
//! names).

use std::fmt::Write;

use serde_json::{Value, json};

use crate::domain::{Segment, SegmentCategory};

const CATEGORY_RULES: &str = "\
Classify the segment as exactly one of:

- \"functional_requirement\": behaviour the system must exhibit. Any segment that defines an API \
endpoint (HTTP method and path), CRUD operations, validation rules, input/output behaviour, or \
data normalization or conversion rules is a functional requirement, even if it also contains \
background or data definitions.
- \"non_functional_requirement\": a segment that only defines quality attributes such as \
performance, security or availability.
- \"overview\": background, purpose, scope or glossary with no concrete functional behaviour at \
all.
- \"other\": anything else (appendices, change logs, notes).";

const ID_AND_TITLE_RULES: &str = "\
If the segment contains a \"### REQ-XXX: Title\" heading, return the identifier (for example \
\"REQ-001\") as req_id; otherwise return an empty string.

Return a short title that names the subject of the segment.";

const EXAMPLE_RULES: &str = "\
Write Given/When/Then examples that cover the rules of the requirement exhaustively, both normal \
and error cases. No rule should be left without an example.

- Given: the concrete state the test must set up (what exists and in which state).
- When: the action. For functional requirements name the HTTP method and path; for \
non-functional requirements name the measurement or load condition.
- Then: the expected result, including status codes and response content where relevant.

Cover boundary values for every length, count or range limit, each normalization rule, and every \
state transition or business rule. If the segment already contains Given/When/Then examples, use \
them as written.";

/// The prompt for classifying a single segment and generating its examples.
#[must_use]
pub fn classify(segment: &Segment, context: &[&Segment]) -> String {
    format!(
        "You are an expert analyst of software specifications. Analyse the segment below and \
         return the result as JSON.\n\n## 1. Category\n\n{CATEGORY_RULES}\n\n## 2. Identifier \
         and title\n\n{ID_AND_TITLE_RULES}\n\n## 3. Examples\n\nIf the segment is a \
         functional_requirement, generate examples; otherwise return an empty \
         list.\n\n{EXAMPLE_RULES}\n{}\n## Segment\n\n{}\n",
        context_section(context),
        segment.content()
    )
}

/// The prompt for classifying several segments in one call.
#[must_use]
pub fn classify_batch(segments: &[&Segment]) -> String {
    format!(
        "You are an expert analyst of software specifications. Analyse each of the segments \
         below and return a JSON array with one entry per segment. Always include the \
         segment_id.\n\n## 1. Category\n\n{CATEGORY_RULES}\n\n## 2. Identifier and \
         title\n\n{ID_AND_TITLE_RULES}\n\n## Segments\n\n{}\n",
        segment_list(segments, false)
    )
}

/// The prompt for generating examples for several requirement segments.
#[must_use]
pub fn generate_examples(segments: &[&Segment], context: &[&Segment]) -> String {
    format!(
        "You are an expert analyst of software specifications. Generate Given/When/Then \
         examples for each of the requirement segments below. Return a JSON array with one \
         entry per segment and always include the segment_id.\n{}\n## \
         Rules\n\n{EXAMPLE_RULES}\n\n## Segments\n\n{}\n",
        context_section(context),
        segment_list(segments, true)
    )
}

fn context_section(context: &[&Segment]) -> String {
    if context.is_empty() {
        return String::new();
    }

    let mut section = String::from(
        "\n## Shared rules\n\nThe following segments define rules that apply across every \
         resource. Apply them when writing examples for each segment (error formats, \
         preconditions, normalization), but do not produce results for these segments \
         themselves.\n",
    );
    for segment in context {
        let _ = write!(section, "\n--- context: {} ---\n{}\n", segment.id(), segment.content());
    }
    section
}

fn segment_list(segments: &[&Segment], with_title: bool) -> String {
    segments
        .iter()
        .map(|segment| {
            let mut header = format!("--- segment_id: {}", segment.id());
            if with_title {
                let _ = write!(header, " | title: {}", segment.heading().unwrap_or_default());
            }
            if let Some(context) = segment.context() {
                let _ = write!(header, " | context: {context}");
            }
            format!("{header} ---\n{}", segment.content())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn category_schema() -> Value {
    json!({
        "type": "STRING",
        "enum": SegmentCategory::ALL.map(SegmentCategory::as_str),
        "description": "The category of the segment",
    })
}

fn examples_schema() -> Value {
    json!({
        "type": "ARRAY",
        "description": "Given/When/Then examples",
        "items": {
            "type": "OBJECT",
            "properties": {
                "given": { "type": "STRING", "description": "The precondition" },
                "when": { "type": "STRING", "description": "The action" },
                "then": { "type": "STRING", "description": "The expected result" },
            },
            "required": ["given", "when", "then"],
        },
    })
}

fn req_id_schema() -> Value {
    json!({
        "type": "STRING",
        "description": "The REQ-XXX identifier in the segment, or an empty string",
    })
}

/// Response schema for [`classify`].
#[must_use]
pub fn classify_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "category": category_schema(),
            "req_id": req_id_schema(),
            "title": { "type": "STRING", "description": "The title of the requirement" },
            "examples": examples_schema(),
        },
        "required": ["category", "title"],
    })
}

/// Response schema for [`classify_batch`].
#[must_use]
pub fn classify_batch_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "segment_id": { "type": "STRING", "description": "The segment ID" },
                "category": category_schema(),
                "title": { "type": "STRING", "description": "The title of the requirement" },
                "req_id": req_id_schema(),
            },
            "required": ["segment_id", "category", "title"],
        },
    })
}

/// Response schema for [`generate_examples`].
#[must_use]
pub fn generate_examples_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "segment_id": { "type": "STRING", "description": "The segment ID" },
                "examples": examples_schema(),
            },
            "required": ["segment_id", "examples"],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, heading: &str, content: &str) -> Segment {
        Segment::new(id, vec![heading.to_string()], content)
    }

    #[test]
    fn batch_prompt_lists_every_segment() {
        let a = segment("seg-0000", "Login", "users log in").with_context("auth");
        let b = segment("seg-0001", "Logout", "users log out");

        let prompt = classify_batch(&[&a, &b]);

        assert!(prompt.contains("--- segment_id: seg-0000 | context: auth ---\nusers log in"));
        assert!(prompt.contains("--- segment_id: seg-0001 ---\nusers log out"));
        assert!(!prompt.contains("title: Login"));
    }

    #[test]
    fn example_prompt_includes_titles_and_context() {
        let overview = segment("seg-0000", "Common", "errors use error.code");
        let target = segment("seg-0001", "Create label", "POST /v1/labels");

        let prompt = generate_examples(&[&target], &[&overview]);

        assert!(prompt.contains("--- segment_id: seg-0001 | title: Create label ---"));
        assert!(prompt.contains("--- context: seg-0000 ---\nerrors use error.code"));
    }

    #[test]
    fn context_section_is_omitted_when_empty() {
        let target = segment("seg-0001", "Create label", "POST /v1/labels");
        assert!(!generate_examples(&[&target], &[]).contains("Shared rules"));
    }

    #[test]
    fn category_enum_lists_all_labels() {
        let schema = classify_schema();
        assert_eq!(
            schema["properties"]["category"]["enum"],
            json!([
                "functional_requirement",
                "non_functional_requirement",
                "overview",
                "other"
            ])
        );
        assert_eq!(classify_batch_schema()["type"], "ARRAY");
    }
}
