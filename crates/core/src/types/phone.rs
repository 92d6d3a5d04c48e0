//! Mobile phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than ASCII digits.
    #[error("phone number must contain only digits")]
    NonDigit,
    /// The input is not exactly 11 digits long.
    #[error("phone number must be {expected} digits (got {actual})")]
    InvalidLength {
        /// Required number of digits.
        expected: usize,
        /// Number of characters supplied.
        actual: usize,
    },
    /// The input does not start with a mobile prefix (`13` through `19`).
    #[error("phone number must start with 13-19")]
    InvalidPrefix,
}

/// A mainland mobile phone number.
///
/// Phone numbers are the natural key for profiles: logging in with the same
/// number always resolves to the same identity.
///
/// ## Constraints
///
/// - Exactly 11 ASCII digits
/// - First digit is `1`, second digit is `3`-`9`
///
/// ## Examples
///
/// ```
/// use community_mart_core::Phone;
///
/// assert!(Phone::parse("13800000000").is_ok());
///
/// assert!(Phone::parse("").is_err());            // empty
/// assert!(Phone::parse("1380000000").is_err());  // 10 digits
/// assert!(Phone::parse("12800000000").is_err()); // bad prefix
/// assert!(Phone::parse("1380000000a").is_err()); // non-digit
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Number of digits in a mobile number.
    pub const LENGTH: usize = 11;

    /// Parse a `Phone` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Contains non-digit characters
    /// - Is not exactly 11 digits
    /// - Does not start with `13`-`19`
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::NonDigit);
        }

        if s.len() != Self::LENGTH {
            return Err(PhoneError::InvalidLength {
                expected: Self::LENGTH,
                actual: s.len(),
            });
        }

        match s.as_bytes() {
            [b'1', b'3'..=b'9', ..] => Ok(Self(s.to_owned())),
            _ => Err(PhoneError::InvalidPrefix),
        }
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Phone` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the number with the middle four digits hidden (`138****0000`).
    ///
    /// Used wherever a number ends up in logs.
    #[must_use]
    pub fn masked(&self) -> String {
        let (head, rest) = self.0.split_at(3);
        let tail = rest.get(4..).unwrap_or_default();
        format!("{head}****{tail}")
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
