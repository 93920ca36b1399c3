//! Cache location derivation.
//!
//! Every distribution gets its own directory pair keyed by the archive name
//! and a hash of its credential-free address:
//!
//! ```text
//! <archive base>/<archive path>/<stem>/<hash>/<archive name>
//! <extraction base>/<extraction path>/<stem>/<hash>/
//! ```
//!
//! The sidecar files that coordinate installs sit next to the archive.

use crate::distribution::{BaseDirectories, DistributionSpec, DistributionUri};
use md5::{Digest, Md5};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const LOCK_SUFFIX: &str = "lck";
const MARKER_SUFFIX: &str = "ok";
const PARTIAL_SUFFIX: &str = "part";

/// The on-disk locations for one distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    archive_file: PathBuf,
    extraction_dir: PathBuf,
}

impl CachePaths {
    /// Returns where the downloaded archive is kept.
    #[must_use]
    pub fn archive_file(&self) -> &Path {
        &self.archive_file
    }

    /// Returns the directory the archive is extracted into.
    #[must_use]
    pub fn extraction_dir(&self) -> &Path {
        &self.extraction_dir
    }

    /// Returns the zero-byte sentinel marking a verified extraction.
    #[must_use]
    pub fn marker_file(&self) -> PathBuf {
        sibling_with_suffix(&self.archive_file, MARKER_SUFFIX)
    }

    /// Returns the temporary file an in-flight download is written to.
    #[must_use]
    pub fn partial_file(&self) -> PathBuf {
        sibling_with_suffix(&self.archive_file, PARTIAL_SUFFIX)
    }

    /// Returns the sidecar file used to serialise installers.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        lock_file_for(&self.archive_file)
    }
}

/// Returns the lock sidecar for `resource`: the same path with `.lck` appended.
#[must_use]
pub fn lock_file_for(resource: &Path) -> PathBuf {
    sibling_with_suffix(resource, LOCK_SUFFIX)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Computes the cache locations for `spec`.
///
/// The result depends only on the credential-free address and the base
/// directories, so repeated calls and separate processes agree.
///
/// # Examples
///
/// ```
/// use antw_installer::cache_paths::resolve;
/// use antw_installer::distribution::{BaseDirectories, DistributionSpec, DistributionUri};
/// use std::path::Path;
///
/// let uri = DistributionUri::parse("https://example.org/dist/tool-1.2.3.zip")?;
/// let spec = DistributionSpec::new(uri);
/// let bases = BaseDirectories::new("/home/u/.antw", "/work");
///
/// let paths = resolve(&spec, &bases);
/// assert!(paths.archive_file().starts_with("/home/u/.antw/wrapper/dists/tool-1.2.3"));
/// assert!(paths.archive_file().ends_with("tool-1.2.3.zip"));
/// assert_eq!(paths.archive_file().parent(), Some(paths.extraction_dir()));
/// # Ok::<(), antw_installer::error::InstallerError>(())
/// ```
#[must_use]
pub fn resolve(spec: &DistributionSpec, bases: &BaseDirectories) -> CachePaths {
    let uri = spec.uri();
    let root = root_name(uri);

    let archive_store = spec.archive_store();
    let archive_file = bases
        .dir(archive_store.base)
        .join(&archive_store.path)
        .join(&root)
        .join(uri.base_name());

    let extraction_store = spec.extraction_store();
    let extraction_dir = bases
        .dir(extraction_store.base)
        .join(&extraction_store.path)
        .join(&root);

    CachePaths {
        archive_file,
        extraction_dir,
    }
}

/// Returns `<stem>/<hash>` for `uri`.
fn root_name(uri: &DistributionUri) -> PathBuf {
    Path::new(strip_extension(uri.base_name())).join(uri_hash(uri.safe().as_str()))
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) if index > 0 => name.get(..index).unwrap_or(name),
        _ => name,
    }
}

/// Renders the MD5 digest of `value` as an unsigned base-36 number.
fn uri_hash(value: &str) -> String {
    let mut digest = [0_u8; 16];
    digest.copy_from_slice(&Md5::digest(value.as_bytes()));
    to_base36(u128::from_be_bytes(digest))
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = usize::try_from(value % 36).unwrap_or_default();
        digits.push(char::from(DIGITS.get(digit).copied().unwrap_or(b'0')));
        value /= 36;
    }
    digits.iter().rev().collect()
}
