use crate::error::ShortenerError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Every character a short code may contain: `[A-Za-z0-9]`.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A short code identifying a shortened URL.
///
/// Short codes are non-empty and drawn only from [`ALPHABET`]. Length bounds
/// are a deployment setting, so they are enforced by the minter rather than
/// by this type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Creates a new `ShortCode` after validating the input.
    pub fn new(code: impl Into<String>) -> Result<Self, ShortenerError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (e.g. the random generator, or rows read back from the store).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number of characters in the code.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(code: &str) -> Result<(), ShortenerError> {
        if code.is_empty() {
            return Err(ShortenerError::InvalidAlias(
                "short code cannot be empty".to_string(),
            ));
        }

        if !code.bytes().all(is_alphabet_byte) {
            return Err(ShortenerError::InvalidAlias(format!(
                "must contain only letters and digits: '{code}'"
            )));
        }

        Ok(())
    }
}

/// Returns true if `byte` belongs to [`ALPHABET`].
pub fn is_alphabet_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_is_exactly_base62() {
        assert_eq!(ALPHABET.len(), 62);
        assert!(ALPHABET.iter().all(|b| is_alphabet_byte(*b)));

        let mut sorted = ALPHABET.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 62);
    }

    #[test]
    fn valid_codes() {
        assert!(ShortCode::new("a").is_ok());
        assert!(ShortCode::new("Abc123xyz").is_ok());
        assert!(ShortCode::new("promo2024").is_ok());
    }

    #[test]
    fn empty_code_is_rejected() {
        assert!(matches!(
            ShortCode::new(""),
            Err(ShortenerError::InvalidAlias(_))
        ));
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortCode::new("abc def").is_err());
        assert!(ShortCode::new("abc/def").is_err());
        assert!(ShortCode::new("abc-def").is_err());
        assert!(ShortCode::new("abc_def").is_err());
        assert!(ShortCode::new("caf\u{e9}").is_err());
    }

    #[test]
    fn to_url() {
        let code = ShortCode::new("abc123").unwrap();
        assert_eq!(code.to_url("https://tiny.link"), "https://tiny.link/abc123");
        assert_eq!(code.to_url("https://tiny.link/"), "https://tiny.link/abc123");
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = ShortCode::new("abc123").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"abc123\"");
    }
}
