//! SHA256 content hashes.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Errors produced when parsing a [`ContentHash`] from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The hex portion is not exactly 64 characters long.
    #[error("Invalid SHA256 digest: expected 64 hex characters, got {len} in '{input}'")]
    Length {
        /// Length of the rejected hex portion.
        len: usize,
        /// The rejected input.
        input: String,
    },

    /// The input contains characters outside `[0-9a-fA-F]`.
    #[error("Invalid SHA256 digest: contains non-hex characters in '{0}'")]
    NonHex(String),
}

/// A validated SHA256 content digest (64 lowercase hex characters).
///
/// Every checksum in a resolved manifest, every bundle digest, and every hash a
/// publication target reports is a `ContentHash`, so comparisons between them are
/// plain equality on normalized strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a digest, validating the input.
    ///
    /// Accepts strings with or without a `sha256:` prefix, and a trailing
    /// `  filename` as written by `sha256sum`.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the hex portion is not exactly 64 ASCII hex characters.
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let s = s.trim();
        let s = s.split_whitespace().next().unwrap_or(s);
        let hex = s.strip_prefix("sha256:").unwrap_or(s);

        if hex.len() != 64 {
            return Err(HashError::Length {
                len: hex.len(),
                input: s.to_string(),
            });
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::NonHex(s.to_string()));
        }

        Ok(Self(hex.to_lowercase()))
    }

    /// Compute the SHA256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Compute the digest of several buffers as if they were one contiguous buffer.
    pub fn compute_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest in OCI form (`sha256:<hex>`).
    pub fn to_oci(&self) -> String {
        format!("sha256:{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
