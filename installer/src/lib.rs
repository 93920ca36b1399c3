//! antw installer library.
//!
//! This crate provides the core of the Ant wrapper: given a distribution
//! address it resolves deterministic cache locations, serialises concurrent
//! installers with a file lock, downloads, verifies, and extracts the
//! archive, and returns the root of a verified installation. It is used by
//! the `antw` binary and can be consumed programmatically by other tools.
//!
//! # Modules
//!
//! - [`artefact`] - Downloading, checksumming, and extracting archives
//! - [`cache_paths`] - Archive and extraction locations for a distribution
//! - [`distribution`] - Distribution addresses, credentials, and stores
//! - [`error`] - Error types tagged with the failing install phase
//! - [`install`] - The install state machine
//! - [`lock`] - Cross-process locking over cache resources

pub mod artefact;
pub mod cache_paths;
pub mod distribution;
pub mod error;
pub mod install;
pub mod lock;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
