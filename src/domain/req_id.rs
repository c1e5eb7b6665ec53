use std::{fmt, num::NonZeroUsize, str::FromStr};

/// The minimum width of the numeric part of a requirement identifier.
///
/// Numbers are zero-padded to this width; larger numbers simply grow
/// (`REQ-999` is followed by `REQ-1000`).
pub const MIN_DIGITS: usize = 3;

const PREFIX: &str = "REQ-";

/// A requirement identifier of the form `REQ-<digits>`.
///
/// The identity of a requirement is its number: `REQ-005` and `REQ-0005`
/// parse to the same value and both display as `REQ-005`.
///
/// # Examples
///
/// ```
/// use spec_enrich::ReqId;
///
/// let id: ReqId = "REQ-042".parse().unwrap();
/// assert_eq!(id.number().get(), 42);
/// assert_eq!(id.to_string(), "REQ-042");
/// assert_eq!(ReqId::from_number(1234).unwrap().to_string(), "REQ-1234");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReqId(NonZeroUsize);

impl ReqId {
    /// Create an identifier from a pre-validated number.
    #[must_use]
    pub const fn new(number: NonZeroUsize) -> Self {
        Self(number)
    }

    /// Create an identifier from a raw number, returning `None` for zero.
    #[must_use]
    pub const fn from_number(number: usize) -> Option<Self> {
        match NonZeroUsize::new(number) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Returns the numeric part of the identifier.
    #[must_use]
    pub const fn number(self) -> NonZeroUsize {
        self.0
    }

    /// The file name a record with this identifier is stored under.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{self}.yml")
    }
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{PREFIX}{:0width$}", self.0, width = MIN_DIGITS)
    }
}

/// Errors that can occur when parsing a requirement identifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The string is not of the form `REQ-<digits>`.
    #[error("Invalid requirement ID format: {0}")]
    Syntax(String),

    /// The numeric part is too short, non-numeric, or zero.
    #[error(
        "Invalid number in requirement ID '{0}': expected at least {MIN_DIGITS} digits forming a \
         non-zero integer, got {1}"
    )]
    Number(String, String),
}

impl FromStr for ReqId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| Error::Syntax(s.to_string()))?;

        if digits.len() < MIN_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Number(s.to_string(), digits.to_string()));
        }

        digits
            .parse::<usize>()
            .ok()
            .and_then(Self::from_number)
            .ok_or_else(|| Error::Number(s.to_string(), digits.to_string()))
    }
}

impl TryFrom<&str> for ReqId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1, "REQ-001"; "single digit padded")]
    #[test_case(42, "REQ-042"; "two digits padded")]
    #[test_case(999, "REQ-999"; "at boundary")]
    #[test_case(1000, "REQ-1000"; "expansion")]
    #[test_case(123_456, "REQ-123456"; "large")]
    fn display_pads_to_three_digits(number: usize, expected: &str) {
        let id = ReqId::from_number(number).unwrap();
        assert_eq!(id.to_string(), expected);
    }

    #[test_case("REQ-001", 1)]
    #[test_case("REQ-042", 42)]
    #[test_case("REQ-0005", 5)]
    #[test_case("REQ-1000", 1000)]
    fn parses_valid_identifiers(input: &str, expected: usize) {
        let id = ReqId::try_from(input).unwrap();
        assert_eq!(id.number().get(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("REQ"; "prefix only without dash")]
    #[test_case("req-001"; "lowercase prefix")]
    #[test_case("USR-001"; "other kind")]
    #[test_case(" REQ-001"; "leading whitespace")]
    fn rejects_bad_syntax(input: &str) {
        assert!(matches!(ReqId::try_from(input), Err(Error::Syntax(_))));
    }

    #[test_case("REQ-"; "no digits")]
    #[test_case("REQ-1"; "too short")]
    #[test_case("REQ-12"; "two digits")]
    #[test_case("REQ-000"; "zero")]
    #[test_case("REQ-01a"; "non numeric")]
    #[test_case("REQ-001 "; "trailing whitespace")]
    fn rejects_bad_numbers(input: &str) {
        assert!(matches!(ReqId::try_from(input), Err(Error::Number(_, _))));
    }

    #[test]
    fn identity_is_numeric() {
        let a = ReqId::try_from("REQ-005").unwrap();
        let b = ReqId::try_from("REQ-0005").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.to_string(), "REQ-005");
    }

    #[test]
    fn orders_numerically() {
        let mut ids: Vec<ReqId> = ["REQ-1000", "REQ-002", "REQ-010"]
            .into_iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["REQ-002", "REQ-010", "REQ-1000"]);
    }

    #[test]
    fn file_name_uses_yaml_extension() {
        assert_eq!(ReqId::from_number(7).unwrap().file_name(), "REQ-007.yml");
    }

    #[test]
    fn error_display() {
        let error = Error::Syntax("bad".to_string());
        assert_eq!(error.to_string(), "Invalid requirement ID format: bad");
    }
}
