//! Phone numbers and one-time passcodes used by the OTP login flow.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact details.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Phone number is not exactly ten ASCII digits.
    #[error("phone number must be exactly {} digits", PhoneNumber::DIGITS)]
    InvalidPhone,
    /// OTP is not exactly four ASCII digits.
    #[error("OTP must be exactly {} digits", OtpCode::DIGITS)]
    InvalidOtp,
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// A ten-digit mobile number, without country code.
///
/// ```
/// use bazaar_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse(" 9876543210 ").is_ok());
/// assert!(PhoneNumber::parse("+919876543210").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Number of digits in a phone number.
    pub const DIGITS: usize = 10;

    /// Parse a phone number, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidPhone`] unless the input is exactly ten digits.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if !is_digits(s, Self::DIGITS) {
            return Err(ContactError::InvalidPhone);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// A four-digit one-time passcode.
///
/// `Debug` output is redacted so codes never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OtpCode(String);

impl OtpCode {
    /// Number of digits in a passcode.
    pub const DIGITS: usize = 4;

    /// Parse a passcode. Whitespace is not trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidOtp`] unless the input is exactly four digits.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        if !is_digits(s, Self::DIGITS) {
            return Err(ContactError::InvalidOtp);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode([REDACTED])")
    }
}
