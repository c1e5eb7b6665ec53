//! Text extraction over raw segment content.
//!
//! These are the rule-based building blocks used by the pattern classifier,
//! the identifier allocator and the example merger. None of them fail: text
//! that does not match simply yields nothing.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Example, ReqId};

static REQ_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bREQ-\d{3,}\b").expect("valid regex"));

static REQ_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"###\s+(REQ-\d{3,}):\s*(.+)").expect("valid regex"));

static GIVEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*]?\s*given:\s*(.+)").expect("valid regex"));
static WHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*]?\s*when:\s*(.+)").expect("valid regex"));
static THEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*]?\s*then:\s*(.+)").expect("valid regex"));

static QUESTIONS_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#{2,3}\s+questions").expect("valid regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s+(.*)$").expect("valid regex"));

static CONTEXT_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*context:\s*(.+?)\s*-->").expect("valid regex"));

/// The first valid requirement identifier written in `text`.
///
/// `REQ-000` and identifiers with fewer than three digits are ignored.
#[must_use]
pub fn explicit_id(text: &str) -> Option<ReqId> {
    REQ_ID
        .find_iter(text)
        .find_map(|m| m.as_str().parse::<ReqId>().ok())
}

/// An identifier and title declared together as `### REQ-XXX: Title`.
#[must_use]
pub fn id_with_title(text: &str) -> Option<(ReqId, String)> {
    REQ_HEADING.captures_iter(text).find_map(|caps| {
        let id = caps[1].parse::<ReqId>().ok()?;
        let title = caps[2].trim();
        (!title.is_empty()).then(|| (id, title.to_string()))
    })
}

/// Given/When/Then triples written on three consecutive lines.
///
/// Keywords are case-insensitive and may be preceded by a `-` or `*`
/// bullet. The returned examples are unnumbered.
#[must_use]
pub fn examples(text: &str) -> Vec<Example> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut found = Vec::new();

    let mut i = 0;
    while i + 2 < lines.len() {
        let triple = capture(&GIVEN, lines[i])
            .zip(capture(&WHEN, lines[i + 1]))
            .zip(capture(&THEN, lines[i + 2]))
            .and_then(|((given, when), then)| Example::parse(given, when, then));

        if let Some(example) = triple {
            found.push(example);
            i += 3;
        } else {
            i += 1;
        }
    }

    found
}

fn capture<'t>(pattern: &Regex, line: &'t str) -> Option<&'t str> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Open questions in the text.
///
/// A question is any non-heading line ending in `?` (ASCII or full-width),
/// or any non-empty line inside a `## Questions` / `### Questions` section,
/// with bullet markers stripped. The section ends at the next heading.
#[must_use]
pub fn questions(text: &str) -> Vec<String> {
    let mut questions = Vec::new();
    let mut in_section = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if QUESTIONS_SECTION.is_match(line) {
            in_section = true;
            continue;
        }

        let is_heading = HEADING.is_match(line);
        if in_section {
            if is_heading {
                in_section = false;
            } else {
                let question = line.trim_start_matches(['-', '*', ' ']).trim();
                if !question.is_empty() {
                    questions.push(question.to_string());
                }
            }
            continue;
        }

        if !is_heading && (line.ends_with('?') || line.ends_with('？')) {
            questions.push(line.to_string());
        }
    }

    questions
}

/// The text of the first markdown heading.
#[must_use]
pub fn first_heading(text: &str) -> Option<&str> {
    text.lines()
        .filter_map(|line| HEADING.captures(line.trim()))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|heading| !heading.is_empty())
}

/// The annotation of the first `<!-- context: ... -->` comment.
#[must_use]
pub fn context_annotation(text: &str) -> Option<&str> {
    CONTEXT_COMMENT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|annotation| !annotation.is_empty())
}
