//! Requirement identifier allocation.
//!
//! Identifiers written in a segment's text win over identifiers proposed by
//! a classifier, which win over auto-assigned ones. Auto-assignment uses a
//! running [`Counter`] seeded with the highest explicit identifier in the
//! whole run, so the result does not depend on the order in which service
//! answers arrive.

use std::num::NonZeroUsize;

use crate::{domain::ReqId, extract};

/// The inputs to allocation for one segment.
#[derive(Debug, Clone, Copy)]
pub struct Claim<'a> {
    /// The raw segment text.
    pub content: &'a str,
    /// Unvalidated identifier text proposed by a classifier.
    pub candidate: Option<&'a str>,
}

/// How an identifier was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Written in the segment text.
    Content,
    /// Proposed by the classifier.
    Candidate,
    /// Assigned from the running counter.
    Auto,
}

/// The explicit identifier of a claim, if any.
#[must_use]
pub fn explicit(claim: Claim<'_>) -> Option<(ReqId, Origin)> {
    extract::explicit_id(claim.content)
        .map(|id| (id, Origin::Content))
        .or_else(|| {
            claim
                .candidate
                .and_then(extract::explicit_id)
                .map(|id| (id, Origin::Candidate))
        })
}

/// A running identifier counter.
///
/// The counter holds the last number handed out (or the seed). It never
/// goes backwards and never repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counter(usize);

impl Counter {
    /// A counter whose first identifier follows the highest of `seen`.
    #[must_use]
    pub fn seeded(seen: impl IntoIterator<Item = ReqId>) -> Self {
        Self(seen.into_iter().map(|id| id.number().get()).max().unwrap_or(0))
    }

    /// Hand out the next identifier.
    pub fn next_id(&mut self) -> ReqId {
        let next = NonZeroUsize::MIN.saturating_add(self.0);
        self.0 = next.get();
        ReqId::new(next)
    }
}

/// Resolve one claim, advancing `counter` only if no explicit identifier
/// exists.
pub fn resolve(claim: Claim<'_>, counter: &mut Counter) -> (ReqId, Origin) {
    explicit(claim).unwrap_or_else(|| (counter.next_id(), Origin::Auto))
}

/// Allocate an identifier for every claim, in order.
///
/// The explicit identifiers of all claims, plus any `reserved` identifiers
/// seen elsewhere in the run, are scanned before any auto-assignment, so the
/// counter is seeded with the run-wide maximum. Later explicit identifiers at
/// or below already auto-assigned values are accepted as they are;
/// duplicates are resolved downstream.
#[must_use]
pub fn allocate(
    claims: &[Claim<'_>],
    reserved: impl IntoIterator<Item = ReqId>,
) -> Vec<(ReqId, Origin)> {
    let found: Vec<_> = claims.iter().map(|claim| explicit(*claim)).collect();
    let mut counter = Counter::seeded(
        found
            .iter()
            .flatten()
            .map(|(id, _)| *id)
            .chain(reserved),
    );

    found
        .into_iter()
        .map(|found| found.unwrap_or_else(|| (counter.next_id(), Origin::Auto)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(content: &str) -> Claim<'_> {
        Claim {
            content,
            candidate: None,
        }
    }

    fn rendered(allocated: &[(ReqId, Origin)]) -> Vec<String> {
        allocated.iter().map(|(id, _)| id.to_string()).collect()
    }

    #[test]
    fn no_explicit_ids_count_from_one() {
        let allocated = allocate(&[claim("login"), claim("perf")], []);
        assert_eq!(rendered(&allocated), ["REQ-001", "REQ-002"]);
        assert!(allocated.iter().all(|(_, origin)| *origin == Origin::Auto));
    }

    #[test]
    fn content_beats_candidate() {
        let claims = [Claim {
            content: "see REQ-005",
            candidate: Some("REQ-999"),
        }];
        let allocated = allocate(&claims, []);
        assert_eq!(rendered(&allocated), ["REQ-005"]);
        assert_eq!(allocated[0].1, Origin::Content);
    }

    #[test]
    fn noisy_candidate_is_revalidated() {
        let claims = [
            Claim {
                content: "no id",
                candidate: Some("The id is REQ-010."),
            },
            Claim {
                content: "no id",
                candidate: Some("REQ-1"),
            },
        ];
        let allocated = allocate(&claims, []);
        assert_eq!(rendered(&allocated), ["REQ-010", "REQ-011"]);
        assert_eq!(allocated[0].1, Origin::Candidate);
        assert_eq!(allocated[1].1, Origin::Auto);
    }

    #[test]
    fn counter_is_seeded_with_later_maximum() {
        let allocated = allocate(&[claim("first"), claim("REQ-007"), claim("third")], []);
        assert_eq!(rendered(&allocated), ["REQ-008", "REQ-007", "REQ-009"]);
    }

    #[test]
    fn low_explicit_ids_are_accepted_as_is() {
        let allocated = allocate(&[claim("REQ-003"), claim("auto"), claim("REQ-002")], []);
        assert_eq!(rendered(&allocated), ["REQ-003", "REQ-004", "REQ-002"]);
    }

    #[test]
    fn allocation_is_deterministic() {
        let claims = [
            claim("a"),
            claim("REQ-020"),
            Claim {
                content: "b",
                candidate: Some("REQ-015"),
            },
            claim("c"),
        ];
        assert_eq!(allocate(&claims, []), allocate(&claims, []));
    }

    #[test]
    fn reserved_ids_raise_the_seed() {
        let reserved = [ReqId::from_number(30).unwrap()];
        let allocated = allocate(&[claim("REQ-004"), claim("auto")], reserved);
        assert_eq!(rendered(&allocated), ["REQ-004", "REQ-031"]);
    }

    #[test]
    fn counter_is_threaded_explicitly() {
        let mut counter = Counter::seeded([ReqId::from_number(41).unwrap()]);
        let (first, _) = resolve(claim("x"), &mut counter);
        let (explicit, origin) = resolve(claim("REQ-100"), &mut counter);
        let (second, _) = resolve(claim("y"), &mut counter);

        assert_eq!(first.to_string(), "REQ-042");
        assert_eq!((explicit.to_string(), origin), ("REQ-100".to_string(), Origin::Content));
        assert_eq!(second.to_string(), "REQ-043");
    }
}
