//! Distribution install orchestrator.
//!
//! [`Installer::ensure_installed`] makes a distribution available on disk and
//! returns its installation root. Everything after path resolution happens
//! inside one cross-process lock keyed by the archive path:
//!
//! 1. A verified extraction (marker present, layout valid) is returned as-is.
//! 2. Otherwise the archive is downloaded unless it is already cached.
//! 3. Stale extraction directories are removed.
//! 4. The archive checksum is verified when one is configured.
//! 5. The archive is extracted and its layout verified.
//! 6. The entry script is made executable and the marker is written.

use crate::artefact::download::Downloader;
use crate::artefact::extraction::{ArchiveExtractor, DefaultExtractor};
use crate::artefact::sha256_digest::Sha256Digest;
use crate::artefact::verification::compute_sha256;
use crate::cache_paths::{self, CachePaths};
use crate::distribution::{BaseDirectories, DistributionSpec, DistributionUri};
use crate::error::{InstallerError, Result};
use crate::lock::{LockOptions, with_lock};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Default launcher artefact checked inside the installation root.
pub const DEFAULT_LAUNCHER_ARTIFACT: &str = "lib/ant-launcher.jar";

/// Default entry-point script made executable after extraction.
pub const DEFAULT_ENTRY_SCRIPT: &str = "bin/ant";

/// The files a usable distribution must provide, relative to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionLayout {
    /// File whose presence proves the root is a distribution.
    pub launcher_artifact: PathBuf,
    /// Script marked executable on Unix platforms.
    pub entry_script: PathBuf,
}

impl Default for DistributionLayout {
    fn default() -> Self {
        Self {
            launcher_artifact: PathBuf::from(DEFAULT_LAUNCHER_ARTIFACT),
            entry_script: PathBuf::from(DEFAULT_ENTRY_SCRIPT),
        }
    }
}

/// Tunables for [`Installer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Lock acquisition timeout and retry cadence.
    pub lock: LockOptions,
    /// Expected distribution layout.
    pub layout: DistributionLayout,
}

/// How an installation was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallSource {
    /// A previously verified extraction was reused without any work.
    Cached,
    /// The archive was downloaded and extracted.
    Downloaded,
    /// An archive already in the cache was extracted without downloading.
    ReusedArchive,
}

/// A verified distribution on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    root: PathBuf,
    source: InstallSource,
}

impl Installation {
    /// Returns the single top-level directory of the extracted distribution.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns how the installation was obtained.
    #[must_use]
    pub fn source(&self) -> InstallSource {
        self.source
    }

    /// Consumes the installation and returns its root.
    #[must_use]
    pub fn into_root(self) -> PathBuf {
        self.root
    }
}

/// Ensures distributions are downloaded, verified, and extracted.
///
/// # Examples
///
/// ```no_run
/// use antw_installer::artefact::download::{HttpDownloader, NetworkConfig};
/// use antw_installer::distribution::{BaseDirectories, DistributionSpec, DistributionUri};
/// use antw_installer::install::Installer;
///
/// let installer = Installer::new(HttpDownloader::new(NetworkConfig::default())?);
/// let spec = DistributionSpec::new(DistributionUri::parse(
///     "https://archive.apache.org/dist/ant/binaries/apache-ant-1.10.14-bin.zip",
/// )?);
/// let bases = BaseDirectories::new("/home/me/.antw", ".");
/// let installation = installer.ensure_installed(&spec, &bases)?;
/// println!("Ant lives in {}", installation.root().display());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Installer<D, E = DefaultExtractor> {
    downloader: D,
    extractor: E,
    options: InstallOptions,
}

impl<D: Downloader> Installer<D> {
    /// Creates an installer using the default archive extractor.
    pub fn new(downloader: D) -> Self {
        Self::with_extractor(downloader, DefaultExtractor)
    }
}

impl<D: Downloader, E: ArchiveExtractor> Installer<D, E> {
    /// Creates an installer with an explicit extractor.
    pub fn with_extractor(downloader: D, extractor: E) -> Self {
        Self {
            downloader,
            extractor,
            options: InstallOptions::default(),
        }
    }

    /// Replaces the default options.
    #[must_use]
    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the downloader, mainly so tests can inspect doubles.
    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    /// Makes the distribution described by `spec` available and returns
    /// its installation root.
    ///
    /// Concurrent callers, in this or other processes, are serialised on a
    /// lock next to the archive; only the first performs any work.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::LockTimeout`] if another installer holds the
    /// lock for too long, [`InstallerError::Network`] if the download fails,
    /// [`InstallerError::Integrity`] on checksum mismatch,
    /// [`InstallerError::Extraction`] if unpacking fails,
    /// [`InstallerError::Structural`] if the result is not a usable
    /// distribution, and [`InstallerError::Io`] for other filesystem errors.
    pub fn ensure_installed(
        &self,
        spec: &DistributionSpec,
        bases: &BaseDirectories,
    ) -> Result<Installation> {
        let paths = cache_paths::resolve(spec, bases);
        debug!(
            "distribution {} maps to archive {} and extraction dir {}",
            spec.uri(),
            paths.archive_file().display(),
            paths.extraction_dir().display()
        );
        with_lock(paths.archive_file(), self.options.lock, || {
            self.install_locked(spec, &paths)
        })
    }

    fn install_locked(&self, spec: &DistributionSpec, paths: &CachePaths) -> Result<Installation> {
        if let Some(root) = self.check_cache(paths)? {
            return Ok(Installation {
                root,
                source: InstallSource::Cached,
            });
        }

        let source = self.download_if_needed(spec.uri(), paths)?;
        purge_stale_dirs(paths.extraction_dir())?;
        if let Some(expected) = spec.expected_checksum() {
            verify_checksum(paths.archive_file(), expected)?;
        }

        info!(
            "extracting {} into {}",
            paths.archive_file().display(),
            paths.extraction_dir().display()
        );
        self.extractor
            .extract(paths.archive_file(), paths.extraction_dir())?;

        let root = self.verify_structure(paths.extraction_dir())?;
        make_executable(&root.join(&self.options.layout.entry_script));
        mark_complete(&paths.marker_file())?;
        info!("installed {} at {}", spec.uri(), root.display());
        Ok(Installation { root, source })
    }

    /// Returns the installation root when a previous install is intact.
    ///
    /// A marker whose extraction no longer verifies is removed so the
    /// caller falls through to a fresh install.
    fn check_cache(&self, paths: &CachePaths) -> Result<Option<PathBuf>> {
        let marker = paths.marker_file();
        if !marker.exists() {
            return Ok(None);
        }
        if paths.extraction_dir().is_dir() {
            match self.verify_structure(paths.extraction_dir()) {
                Ok(root) => {
                    debug!("reusing verified installation at {}", root.display());
                    return Ok(Some(root));
                }
                Err(err) => warn!("cached distribution is no longer usable, reinstalling: {err}"),
            }
        } else {
            warn!(
                "cached distribution at {} is missing, reinstalling",
                paths.extraction_dir().display()
            );
        }
        remove_if_exists(&marker)?;
        Ok(None)
    }

    fn download_if_needed(&self, uri: &DistributionUri, paths: &CachePaths) -> Result<InstallSource> {
        let archive = paths.archive_file();
        if archive.is_file() {
            debug!("reusing cached archive {}", archive.display());
            return Ok(InstallSource::ReusedArchive);
        }

        let partial = paths.partial_file();
        if let Err(err) = self.downloader.download(uri, &partial) {
            if let Err(cleanup) = remove_if_exists(&partial) {
                warn!("could not remove partial download: {cleanup}");
            }
            return Err(err.into());
        }
        fs::rename(&partial, archive).map_err(|e| {
            InstallerError::io(
                format!(
                    "failed to move {} into place at {}",
                    partial.display(),
                    archive.display()
                ),
                e,
            )
        })?;
        Ok(InstallSource::Downloaded)
    }

    /// Checks that `dir` holds exactly one top-level directory containing
    /// the launcher artefact, and returns that directory.
    fn verify_structure(&self, dir: &Path) -> Result<PathBuf> {
        let structural = |reason: String| InstallerError::Structural {
            dir: dir.to_path_buf(),
            reason,
        };
        if !dir.is_dir() {
            return Err(structural("extraction directory is missing".to_owned()));
        }
        let mut roots = top_level_dirs(dir)?;
        roots.sort();
        let root = match roots.as_slice() {
            [only] => only.clone(),
            [] => return Err(structural("expected one top-level directory, found none".to_owned())),
            many => {
                let names: Vec<String> = many
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                return Err(structural(format!(
                    "expected one top-level directory, found {}: {}",
                    many.len(),
                    names.join(", ")
                )));
            }
        };

        let launcher = &self.options.layout.launcher_artifact;
        if !root.join(launcher).is_file() {
            return Err(structural(format!(
                "expected {} inside {}",
                launcher.display(),
                root.display()
            )));
        }
        Ok(root)
    }
}

fn top_level_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_failed =
        |e| InstallerError::io(format!("failed to list {}", dir.display()), e);
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;
        if entry.file_type().map_err(read_failed)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

/// Remove every subdirectory of `dir`, leaving plain files such as a
/// co-located archive untouched.
fn purge_stale_dirs(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for stale in top_level_dirs(dir)? {
        debug!("removing stale directory {}", stale.display());
        fs::remove_dir_all(&stale).map_err(|e| {
            InstallerError::io(format!("failed to remove {}", stale.display()), e)
        })?;
    }
    Ok(())
}

fn verify_checksum(archive: &Path, expected: &Sha256Digest) -> Result<()> {
    let actual = compute_sha256(archive)?;
    if actual == *expected {
        debug!("checksum of {} verified", archive.display());
        return Ok(());
    }
    remove_if_exists(archive)?;
    Err(InstallerError::Integrity {
        archive: archive.to_path_buf(),
        expected: expected.to_string(),
        actual: actual.into_inner(),
    })
}

#[cfg(unix)]
fn make_executable(script: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(err) = fs::set_permissions(script, fs::Permissions::from_mode(0o755)) {
        warn!("could not make {} executable: {err}", script.display());
    }
}

#[cfg(not(unix))]
fn make_executable(_script: &Path) {}

fn mark_complete(marker: &Path) -> Result<()> {
    File::create(marker)
        .map(drop)
        .map_err(|e| InstallerError::io(format!("failed to create marker {}", marker.display()), e))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallerError::io(
            format!("failed to remove {}", path.display()),
            e,
        )),
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
