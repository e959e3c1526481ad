use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Serialize, Serializer};

/// A validated udev property name.
///
/// Property names are non-empty and contain neither whitespace nor `=`, which
/// is what allows a `KEY=VALUE` line to be split unambiguously on its first
/// `=`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey(NonEmptyString);

impl PropertyKey {
    /// Creates a new `PropertyKey` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyError` if the string is empty or contains whitespace
    /// or `=`.
    pub fn new(s: String) -> Result<Self, InvalidKeyError> {
        if s.chars().any(|c| c.is_whitespace() || c == '=') {
            return Err(InvalidKeyError(s));
        }

        NonEmptyString::new(s).map(Self).map_err(InvalidKeyError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for PropertyKey {
    type Error = InvalidKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PropertyKey {
    type Error = InvalidKeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl FromStr for PropertyKey {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl AsRef<str> for PropertyKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for PropertyKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PropertyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when a string is not a valid property name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid property name '{0}': must be non-empty and contain no whitespace or '='")]
pub struct InvalidKeyError(String);

impl InvalidKeyError {
    /// The rejected text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.0
    }
}
