//! Directory resolution abstraction for platform-specific paths.
//!
//! The wrapper only needs the user's home directory, but looking it up goes
//! through a trait so tests can substitute a temporary directory.

use std::path::PathBuf;

/// Provides the platform directories the wrapper depends on.
pub trait BaseDirs {
    /// Returns the current user's home directory, if one can be determined.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }
}
