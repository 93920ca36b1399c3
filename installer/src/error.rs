//! Error types for the antw installer core.
//!
//! Every failure raised while ensuring a distribution is installed is folded
//! into [`InstallerError`]. Each variant knows which [`InstallPhase`] it
//! belongs to so that front ends can report the failing step without
//! inspecting error strings.

use crate::artefact::download::DownloadError;
use crate::artefact::error::ArtefactError;
use crate::artefact::extraction::ExtractionError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The installation step an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallPhase {
    /// Interpreting the distribution settings.
    Configuration,
    /// Acquiring the cross-process install lock.
    Lock,
    /// Fetching the distribution archive.
    Download,
    /// Comparing the archive digest with the configured checksum.
    ChecksumVerification,
    /// Unpacking the archive.
    Extraction,
    /// Checking the layout of the extracted distribution.
    StructureVerification,
    /// Any other filesystem work inside the critical section.
    Install,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Lock => "lock",
            Self::Download => "download",
            Self::ChecksumVerification => "checksum verification",
            Self::Extraction => "extraction",
            Self::StructureVerification => "structure verification",
            Self::Install => "install",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while ensuring a distribution is installed.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// A distribution setting is missing or malformed.
    #[error("invalid distribution configuration: {reason}")]
    Configuration {
        /// Description of the offending setting.
        reason: String,
    },

    /// Another installer held the lock for longer than the allowed wait.
    #[error(
        "timed out after {}ms waiting for exclusive access to {}",
        .waited.as_millis(),
        .resource.display()
    )]
    LockTimeout {
        /// The resource the lock protects.
        resource: PathBuf,
        /// How long acquisition was attempted.
        waited: Duration,
    },

    /// The distribution archive could not be fetched.
    #[error(transparent)]
    Network(#[from] DownloadError),

    /// The archive digest does not match the configured checksum.
    #[error(
        "checksum mismatch for {}: expected {expected}, got {actual}; the archive has been \
         deleted, check the configured checksum or the distribution source",
        .archive.display()
    )]
    Integrity {
        /// The archive that failed verification.
        archive: PathBuf,
        /// The configured SHA-256 digest.
        expected: String,
        /// The digest computed from the downloaded archive.
        actual: String,
    },

    /// The archive digest could not be computed.
    #[error(transparent)]
    Checksum(#[from] ArtefactError),

    /// The extracted distribution does not have the expected layout.
    #[error("distribution at {} is not usable: {reason}", .dir.display())]
    Structural {
        /// The extraction directory that was inspected.
        dir: PathBuf,
        /// What was expected and what was found.
        reason: String,
    },

    /// The archive could not be unpacked.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A filesystem operation failed.
    #[error("{context}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl InstallerError {
    /// Wraps an I/O error with a description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Builds a configuration error from a reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns the installation step this error was raised from.
    #[must_use]
    pub fn phase(&self) -> InstallPhase {
        match self {
            Self::Configuration { .. } => InstallPhase::Configuration,
            Self::LockTimeout { .. } => InstallPhase::Lock,
            Self::Network(_) => InstallPhase::Download,
            Self::Integrity { .. } | Self::Checksum(_) => InstallPhase::ChecksumVerification,
            Self::Structural { .. } => InstallPhase::StructureVerification,
            Self::Extraction(_) => InstallPhase::Extraction,
            Self::Io { .. } => InstallPhase::Install,
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn lock_timeout_names_the_resource() {
        let err = InstallerError::LockTimeout {
            resource: PathBuf::from("/cache/apache-ant-1.10.14-bin.zip"),
            waited: Duration::from_millis(1500),
        };
        let msg = err.to_string();
        assert!(msg.contains("apache-ant-1.10.14-bin.zip"));
        assert!(msg.contains("1500ms"));
    }

    #[test]
    fn integrity_error_mentions_both_digests() {
        let err = InstallerError::Integrity {
            archive: PathBuf::from("/cache/tool.zip"),
            expected: "a".repeat(64),
            actual: "b".repeat(64),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"a".repeat(64)));
        assert!(msg.contains(&"b".repeat(64)));
        assert!(msg.contains("deleted"));
    }

    #[test]
    fn io_error_preserves_source() {
        let err = InstallerError::io(
            "failed to create marker file",
            std::io::Error::other("disk full"),
        );
        assert_eq!(err.to_string(), "failed to create marker file");
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
    }

    #[rstest]
    #[case::download(InstallerError::Network(DownloadError::Io(std::io::Error::other("disk full"))))]
    #[case::extraction(InstallerError::Extraction(ExtractionError::Io(std::io::Error::other(
        "disk full"
    ))))]
    #[case::checksum(InstallerError::Checksum(ArtefactError::InvalidSha256Digest {
        reason: "disk full".to_owned(),
    }))]
    fn wrapped_errors_report_their_cause_once(#[case] err: InstallerError) {
        let chain: Vec<String> =
            std::iter::successors(Some(&err as &dyn std::error::Error), |e| e.source())
                .map(ToString::to_string)
                .collect();
        let mentions = chain.iter().filter(|msg| msg.contains("disk full")).count();
        assert_eq!(mentions, 1, "cause repeated along {chain:?}");
    }

    #[rstest]
    #[case::configuration(InstallerError::configuration("missing url"), "configuration")]
    #[case::lock(
        InstallerError::LockTimeout { resource: PathBuf::from("x"), waited: Duration::ZERO },
        "lock"
    )]
    #[case::download(
        InstallerError::Network(DownloadError::Interrupted { url: "https://example.test/a.zip".to_owned() }),
        "download"
    )]
    #[case::structure(
        InstallerError::Structural { dir: PathBuf::from("x"), reason: "empty".to_owned() },
        "structure verification"
    )]
    #[case::extraction(
        InstallerError::Extraction(ExtractionError::UnsupportedFormat { path: PathBuf::from("a.rar") }),
        "extraction"
    )]
    fn phase_labels_match_the_failing_step(#[case] err: InstallerError, #[case] label: &str) {
        assert_eq!(err.phase().to_string(), label);
    }
}
