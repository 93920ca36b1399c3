//! The `Sha256Digest` newtype pinned by `distribution_sha256_sum`.
//!
//! A digest is stored as 64 lowercase hex characters, which is also how
//! [`compute_sha256`](super::verification::compute_sha256) renders one, so
//! two digests compare equal exactly when their strings do.

use super::error::{ArtefactError, Result};
use std::fmt;
use std::str::FromStr;

const HEX_LEN: usize = 64;

/// A SHA-256 digest in canonical lowercase hex.
///
/// [`FromStr`] accepts what people paste into configuration files: the
/// value is trimmed and case-folded before validation. [`TryFrom<String>`]
/// takes only canonical input.
///
/// # Examples
///
/// ```
/// use antw_installer::artefact::sha256_digest::Sha256Digest;
///
/// let pasted = format!("  {}\n", "AB".repeat(32));
/// let digest: Sha256Digest = pasted.parse()?;
/// assert_eq!(digest.as_str(), "ab".repeat(32));
/// # Ok::<(), antw_installer::artefact::error::ArtefactError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Returns the hex digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the hex digits, consuming the digest.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for Sha256Digest {
    type Err = ArtefactError;

    fn from_str(value: &str) -> Result<Self> {
        Self::try_from(value.trim().to_ascii_lowercase())
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        let invalid = |reason: String| Err(ArtefactError::InvalidSha256Digest { reason });
        if value.len() != HEX_LEN {
            return invalid(format!(
                "expected {HEX_LEN} hex characters, got {}",
                value.len()
            ));
        }
        match value
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            Some(c) if c.is_ascii_uppercase() => invalid("digest must be lowercase".to_owned()),
            Some(c) => invalid(format!("non-hex character '{c}'")),
            None => Ok(Self(value)),
        }
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
