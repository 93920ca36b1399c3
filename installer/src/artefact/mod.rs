//! Distribution archive handling: fetching, hashing, and unpacking.
//!
//! # Sub-modules
//!
//! - [`download`] - Downloader trait and the HTTP/file implementation.
//! - [`error`] - Errors for digest parsing and hashing.
//! - [`extraction`] - Archive extraction with path traversal protection.
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`verification`] - Streaming checksum computation.

pub mod download;
pub mod error;
pub mod extraction;
pub mod sha256_digest;
pub mod verification;
