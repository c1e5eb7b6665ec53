use std::{fmt, num::NonZeroUsize, str::FromStr};

/// The identifier of an example within a requirement (`E1`, `E2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExampleId(NonZeroUsize);

impl ExampleId {
    /// The first example identifier, `E1`.
    pub const FIRST: Self = Self(NonZeroUsize::MIN);

    /// Create an identifier from its 1-based position.
    #[must_use]
    pub const fn new(position: NonZeroUsize) -> Self {
        Self(position)
    }

    /// The 1-based position encoded in the identifier.
    #[must_use]
    pub const fn position(self) -> NonZeroUsize {
        self.0
    }

    /// The identifier that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Error returned when a string is not of the form `E<n>` with `n >= 1`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid example ID '{0}': expected E followed by a positive integer")]
pub struct InvalidExampleId(String);

impl FromStr for ExampleId {
    type Err = InvalidExampleId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('E')
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok())
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or_else(|| InvalidExampleId(s.to_string()))
    }
}

/// A Given/When/Then acceptance example.
///
/// Examples carry an identifier only once they have been finalized into a
/// requirement record; freshly extracted or generated examples are
/// unnumbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    id: Option<ExampleId>,
    given: String,
    when: String,
    then: String,
}

impl Example {
    /// Create an unnumbered example from its three clauses, as given.
    #[must_use]
    pub fn new(given: impl Into<String>, when: impl Into<String>, then: impl Into<String>) -> Self {
        Self {
            id: None,
            given: given.into(),
            when: when.into(),
            then: then.into(),
        }
    }

    /// Create an unnumbered example from untrusted clauses.
    ///
    /// Each clause is trimmed; returns `None` if any clause is empty.
    #[must_use]
    pub fn parse(given: &str, when: &str, then: &str) -> Option<Self> {
        let (given, when, then) = (given.trim(), when.trim(), then.trim());
        if given.is_empty() || when.is_empty() || then.is_empty() {
            return None;
        }
        Some(Self::new(given, when, then))
    }

    /// Returns a copy of this example carrying the given identifier.
    #[must_use]
    pub fn with_id(mut self, id: ExampleId) -> Self {
        self.id = Some(id);
        self
    }

    /// The identifier, if the example has been numbered.
    #[must_use]
    pub const fn id(&self) -> Option<ExampleId> {
        self.id
    }

    /// The precondition clause.
    #[must_use]
    pub fn given(&self) -> &str {
        &self.given
    }

    /// The action clause.
    #[must_use]
    pub fn when(&self) -> &str {
        &self.when
    }

    /// The expected-outcome clause.
    #[must_use]
    pub fn then(&self) -> &str {
        &self.then
    }

    /// Whether every clause is non-empty after trimming.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [&self.given, &self.when, &self.then]
            .iter()
            .all(|clause| !clause.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("E1", 1)]
    #[test_case("E42", 42)]
    fn parses_example_ids(input: &str, expected: usize) {
        let id: ExampleId = input.parse().unwrap();
        assert_eq!(id.position().get(), expected);
        assert_eq!(id.to_string(), input);
    }

    #[test_case(""; "empty")]
    #[test_case("E"; "no digits")]
    #[test_case("E0"; "zero")]
    #[test_case("e1"; "lowercase")]
    #[test_case("E-1"; "negative")]
    #[test_case("Ex1"; "garbage")]
    fn rejects_bad_example_ids(input: &str) {
        assert!(input.parse::<ExampleId>().is_err());
    }

    #[test]
    fn next_increments() {
        assert_eq!(ExampleId::FIRST.next().to_string(), "E2");
    }

    #[test]
    fn parse_trims_and_rejects_blank_clauses() {
        let example = Example::parse("  a user exists ", "they log in", " a token is returned").unwrap();
        assert_eq!(example.given(), "a user exists");
        assert_eq!(example.then(), "a token is returned");
        assert_eq!(example.id(), None);

        assert!(Example::parse("a", "  ", "c").is_none());
        assert!(Example::parse("", "b", "c").is_none());
    }

    #[test]
    fn validity_requires_all_clauses() {
        assert!(Example::new("a", "b", "c").is_valid());
        assert!(!Example::new("a", "b", " ").is_valid());
    }
}
