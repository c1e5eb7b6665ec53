//! Example selection, numbering and deduplication.

use std::collections::HashSet;

use crate::domain::{Example, ExampleId};

/// Choose between the examples already written in a segment and those
/// proposed for it.
///
/// Existing examples take absolute priority: if there are any, the proposed
/// ones are discarded. The result is numbered `E1..En` in order.
#[must_use]
pub fn merge(existing: Vec<Example>, proposed: Vec<Example>) -> Vec<Example> {
    let selected = if existing.is_empty() { proposed } else { existing };
    renumber(selected)
}

/// Number examples `E1..En` in order, replacing any existing identifiers.
#[must_use]
pub fn renumber(examples: Vec<Example>) -> Vec<Example> {
    let mut next = ExampleId::FIRST;
    examples
        .into_iter()
        .map(|example| {
            let example = example.with_id(next);
            next = next.next();
            example
        })
        .collect()
}

const KEY_SEPARATOR: char = '\u{1f}';

fn key(example: &Example) -> String {
    [example.given(), example.when(), example.then()]
        .map(|clause| clause.trim().to_lowercase())
        .join(&KEY_SEPARATOR.to_string())
}

/// Drop examples whose Given/When/Then repeat an earlier one, ignoring case
/// and surrounding whitespace, then renumber.
#[must_use]
pub fn dedup(examples: Vec<Example>) -> Vec<Example> {
    let mut seen = HashSet::with_capacity(examples.len());
    let unique = examples
        .into_iter()
        .filter(|example| seen.insert(key(example)))
        .collect();
    renumber(unique)
}
