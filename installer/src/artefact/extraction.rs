//! Archive extraction for downloaded distributions.
//!
//! Supports `.zip`, `.tar.gz`/`.tgz`, and `.tar.zst` archives, chosen by
//! file extension. Every entry path is validated before anything is written
//! to guard against zip-slip style path traversal.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Trait for extracting distribution archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use antw_installer::artefact::extraction::DefaultExtractor;
///
/// let extractor = DefaultExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Missing directories, including `dest_dir` itself, are created.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnsupportedFormat`] for an unknown
    /// extension, [`ExtractionError::PathTraversal`] if any entry attempts
    /// to escape the destination, and [`ExtractionError::Io`] or
    /// [`ExtractionError::Zip`] when reading or writing fails.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive extension is not one the extractor understands.
    #[error("unsupported archive format: {}", .path.display())]
    UnsupportedFormat {
        /// The archive that could not be classified.
        path: PathBuf,
    },

    /// The zip container is malformed.
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// Archive container formats, detected from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A zip archive.
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
    /// A zstd-compressed tarball.
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format from the archive's file name, ignoring case.
    ///
    /// # Examples
    ///
    /// ```
    /// use antw_installer::artefact::extraction::ArchiveFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::from_path(Path::new("apache-ant-1.10.14-bin.tar.gz")),
    ///     Some(ArchiveFormat::TarGz)
    /// );
    /// assert_eq!(ArchiveFormat::from_path(Path::new("tool.rar")), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else {
            None
        }
    }
}

/// Default extractor using the `zip`, `tar`, `flate2`, and `zstd` crates.
///
/// Validates each entry path before extraction to guard against
/// path traversal attacks (zip-slip).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

impl ArchiveExtractor for DefaultExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractionError> {
        let format = ArchiveFormat::from_path(archive_path).ok_or_else(|| {
            ExtractionError::UnsupportedFormat {
                path: archive_path.to_path_buf(),
            }
        })?;
        fs::create_dir_all(dest_dir)?;
        let file = BufReader::new(File::open(archive_path)?);

        match format {
            ArchiveFormat::Zip => extract_zip(file, dest_dir),
            ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(file), dest_dir),
            ArchiveFormat::TarZst => extract_tar(zstd::Decoder::new(file)?, dest_dir),
        }
    }
}

fn extract_zip<R: Read + io::Seek>(reader: R, dest_dir: &Path) -> Result<(), ExtractionError> {
    let mut archive = zip::ZipArchive::new(reader)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let entry_path = PathBuf::from(entry.name());
        validate_entry_path(&entry_path)?;
        let dest_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = File::create(&dest_path)?;
        io::copy(&mut entry, &mut output)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<(), ExtractionError> {
    let mut archive = tar::Archive::new(reader);

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;
        validate_link_target(&entry, &entry_path)?;

        // `unpack_in` also refuses to write through links already on disk.
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractionError::PathTraversal {
                path: entry_path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Reject link entries whose target resolves outside the destination.
///
/// Symlink targets are relative to the link's own directory; hard link
/// targets are relative to the archive root.
fn validate_link_target<R: Read>(
    entry: &tar::Entry<'_, R>,
    entry_path: &Path,
) -> Result<(), ExtractionError> {
    let kind = entry.header().entry_type();
    if !kind.is_symlink() && !kind.is_hard_link() {
        return Ok(());
    }
    let Some(target) = entry.link_name()? else {
        return Ok(());
    };
    let base = if kind.is_symlink() {
        entry_path.parent().unwrap_or_else(|| Path::new(""))
    } else {
        Path::new("")
    };
    if escapes_root(&base.join(&target)) {
        return Err(ExtractionError::PathTraversal {
            path: format!("{} -> {}", entry_path.display(), target.display()),
        });
    }
    Ok(())
}

/// Reports whether `path`, read relative to the destination, leaves it.
fn escapes_root(path: &Path) -> bool {
    let mut depth = 0_usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(parent) => depth = parent,
                None => return true,
            },
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

/// Validate that an entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
