//! Consolidation of records that share a requirement identifier.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use crate::{
    domain::{ReqId, Spec},
    pipeline::examples,
};

/// Two segments resolved to the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate requirement ID {id} (segments {first} and {second})")]
pub struct DuplicateReqId {
    /// The shared identifier.
    pub id: ReqId,
    /// The segment of the first record with this identifier.
    pub first: String,
    /// The segment of the second record with this identifier.
    pub second: String,
}

/// Check that no two records share an identifier.
///
/// # Errors
///
/// Returns the first repeated identifier, with the source segments of both
/// records.
pub fn check_unique(specs: &[Spec]) -> Result<(), DuplicateReqId> {
    let mut seen: HashMap<ReqId, &str> = HashMap::with_capacity(specs.len());
    for spec in specs {
        let segment_id = spec.source.segment_id.as_str();
        if let Some(&first) = seen.get(&spec.id) {
            return Err(DuplicateReqId {
                id: spec.id,
                first: first.to_string(),
                second: segment_id.to_string(),
            });
        }
        seen.insert(spec.id, segment_id);
    }
    Ok(())
}

/// Merge records sharing an identifier into one.
///
/// The first record for each identifier keeps its title, description and
/// provenance. Examples from later records are appended and the whole list
/// renumbered; questions are unioned in first-seen order. Records appear in
/// the order their identifier was first seen.
///
/// Returns the merged records and the identifiers that had more than one
/// contributor, in first-seen order.
#[must_use]
pub fn consolidate(specs: Vec<Spec>) -> (Vec<Spec>, Vec<ReqId>) {
    let mut merged: Vec<Spec> = Vec::with_capacity(specs.len());
    let mut position: HashMap<ReqId, usize> = HashMap::with_capacity(specs.len());
    let mut duplicated = Vec::new();

    for spec in specs {
        match position.entry(spec.id) {
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(spec);
            }
            Entry::Occupied(slot) => {
                let target = &mut merged[*slot.get()];
                if !duplicated.contains(&spec.id) {
                    duplicated.push(spec.id);
                }
                tracing::debug!(id = %spec.id, segment_id = %spec.source.segment_id, "merging duplicate");
                absorb(target, spec);
            }
        }
    }

    for spec in &mut merged {
        spec.examples = examples::renumber(std::mem::take(&mut spec.examples));
    }

    (merged, duplicated)
}

fn absorb(target: &mut Spec, other: Spec) {
    target.examples.extend(other.examples);

    let mut known: HashSet<String> = target.questions.iter().cloned().collect();
    for question in other.questions {
        if known.insert(question.clone()) {
            target.questions.push(question);
        }
    }

    for dependency in other.depends {
        if !target.depends.contains(&dependency) {
            target.depends.push(dependency);
        }
    }
    for tag in other.tags {
        if !target.tags.contains(&tag) {
            target.tags.push(tag);
        }
    }
}

/// Remove duplicate examples from every record.
#[must_use]
pub fn dedup_examples(mut specs: Vec<Spec>) -> Vec<Spec> {
    for spec in &mut specs {
        spec.examples = examples::dedup(std::mem::take(&mut spec.examples));
    }
    specs
}
