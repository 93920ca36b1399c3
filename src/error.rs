//! Top-level error type for the `antw` binary.

use crate::config::ConfigError;
use crate::launcher::LaunchError;
use antw_installer::error::InstallerError;
use std::fmt;
use thiserror::Error;

/// The stage of a wrapper run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperPhase {
    /// Reading `antw.toml` or resolving directories.
    Configuration,
    /// A step of the distribution install; carries the installer's label.
    Install(antw_installer::error::InstallPhase),
    /// Starting Ant.
    Launch,
}

impl fmt::Display for WrapperPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => f.write_str("configuration"),
            Self::Install(phase) => phase.fmt(f),
            Self::Launch => f.write_str("launch"),
        }
    }
}

/// Any failure that stops the wrapper before Ant exits.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// The wrapper configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The distribution could not be installed.
    #[error(transparent)]
    Install(#[from] InstallerError),

    /// Ant could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl WrapperError {
    /// Returns the stage that failed.
    #[must_use]
    pub fn phase(&self) -> WrapperPhase {
        match self {
            Self::Config(_) => WrapperPhase::Configuration,
            Self::Install(err) => WrapperPhase::Install(err.phase()),
            Self::Launch(_) => WrapperPhase::Launch,
        }
    }
}

/// Result type alias using [`WrapperError`].
pub type Result<T> = std::result::Result<T, WrapperError>;
