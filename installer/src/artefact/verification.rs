//! Checksum computation and comparison for downloaded archives.
//!
//! Files are streamed through the digest in fixed-size chunks so that large
//! distributions are never held in memory. Comparison is an exact match on
//! lowercase hex strings.

use super::error::{ArtefactError, Result};
use super::sha256_digest::Sha256Digest;
use sha2::digest::Output;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 8192;

/// Digest algorithms the verifier can compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// SHA-256, the algorithm used for configured distribution checksums.
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("SHA-256"),
            Self::Sha512 => f.write_str("SHA-512"),
        }
    }
}

/// Computes the lowercase hex digest of the file at `path`.
///
/// # Errors
///
/// Returns [`ArtefactError::Unreadable`] if the file cannot be opened or read.
///
/// # Examples
///
/// ```
/// use antw_installer::artefact::verification::{ChecksumAlgorithm, checksum};
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("empty.zip");
/// std::fs::write(&path, b"")?;
/// assert_eq!(
///     checksum(&path, ChecksumAlgorithm::Sha256)?,
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn checksum(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => hash_file::<Sha256>(path).map(|out| format!("{out:x}")),
        ChecksumAlgorithm::Sha512 => hash_file::<Sha512>(path).map(|out| format!("{out:x}")),
    }
}

/// Computes the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns [`ArtefactError::Unreadable`] if the file cannot be read.
pub fn compute_sha256(path: &Path) -> Result<Sha256Digest> {
    Sha256Digest::try_from(checksum(path, ChecksumAlgorithm::Sha256)?)
}

/// Reports whether the file at `path` has the `expected` SHA-256 digest.
///
/// # Errors
///
/// Returns [`ArtefactError::Unreadable`] if the file cannot be read.
pub fn verify(path: &Path, expected: &Sha256Digest) -> Result<bool> {
    Ok(compute_sha256(path)? == *expected)
}

fn hash_file<D: Digest>(path: &Path) -> Result<Output<D>> {
    let unreadable = |source| ArtefactError::Unreadable {
        path: path.display().to_string(),
        source,
    };
    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = D::new();
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(unreadable)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(hasher.finalize())
}
