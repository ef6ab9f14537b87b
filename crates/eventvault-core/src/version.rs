//! Event schema versions.
//!
//! A [`Version`] tags the shape of one stored event body. It has nothing to
//! do with the stream version used for optimistic concurrency, which is a
//! plain event count.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two-part `major.minor` schema version.
///
/// Ordering compares `major` first, then `minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
}

impl Version {
    /// The version assumed for events persisted without an explicit one.
    pub const INITIAL: Self = Self::new(1, 0);

    /// Creates a version from its parts.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns the major component.
    #[must_use]
    pub const fn major(self) -> u32 {
        self.major
    }

    /// Returns the minor component.
    #[must_use]
    pub const fn minor(self) -> u32 {
        self.minor
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Returned when a string is not a valid `major.minor` version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': expected 'major.minor'")]
pub struct ParseVersionError {
    input: String,
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError {
            input: s.to_owned(),
        };
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        let parse_part = |part: &str| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|_| invalid())
        };
        Ok(Self::new(parse_part(major)?, parse_part(minor)?))
    }
}

impl TryFrom<String> for Version {
    type Error = ParseVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let version: Version = "2.13".parse().unwrap();

        assert_eq!(version.major(), 2);
        assert_eq!(version.minor(), 13);
        assert_eq!(version.to_string(), "2.13");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for input in ["", "1", "1.", ".1", "1.0.0", "a.b", "+1.0", "1.-2", " 1.0"] {
            assert!(input.parse::<Version>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_ordering_compares_major_before_minor() {
        assert!(Version::new(1, 10) < Version::new(2, 0));
        assert!(Version::new(2, 1) > Version::new(2, 0));
        assert_eq!("1.0".parse::<Version>().unwrap(), Version::INITIAL);
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&Version::new(3, 1)).unwrap();
        assert_eq!(json, "\"3.1\"");

        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new(3, 1));
        assert!(serde_json::from_str::<Version>("\"3\"").is_err());
    }
}
