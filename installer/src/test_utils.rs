//! Shared test utilities for the installer crate.
//!
//! Available to unit tests and, through the `test-support` feature, to
//! integration tests and downstream crates.

use crate::artefact::download::{DownloadError, Downloader};
use crate::distribution::DistributionUri;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Launcher artefact placed in every fixture distribution root.
pub const FIXTURE_LAUNCHER: &str = "lib/ant-launcher.jar";

/// Entry script placed in every fixture distribution root.
pub const FIXTURE_ENTRY_SCRIPT: &str = "bin/ant";

/// Builds an in-memory zip holding one distribution directory per name in
/// `roots`, each with a launcher jar and an entry script.
///
/// # Errors
///
/// Returns an error if the zip writer fails.
pub fn build_zip_distribution(roots: &[&str]) -> io::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for root in roots {
        writer
            .add_directory(format!("{root}/"), options)
            .map_err(io::Error::other)?;
        writer
            .start_file(format!("{root}/{FIXTURE_LAUNCHER}"), options)
            .map_err(io::Error::other)?;
        writer.write_all(b"PK launcher")?;
        writer
            .start_file(format!("{root}/{FIXTURE_ENTRY_SCRIPT}"), options)
            .map_err(io::Error::other)?;
        writer.write_all(b"#!/bin/sh\nexec java org.apache.tools.ant.Main \"$@\"\n")?;
    }
    Ok(writer.finish().map_err(io::Error::other)?.into_inner())
}

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A [`Downloader`] that writes a fixed payload and counts its calls.
#[derive(Debug)]
pub struct FixtureDownloader {
    payload: Vec<u8>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixtureDownloader {
    /// Creates a downloader that serves `payload` for every address.
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps for `delay` before writing, widening race windows.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns how many downloads have been requested.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for FixtureDownloader {
    fn download(&self, _uri: &DistributionUri, destination: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(destination, &self.payload)?;
        Ok(())
    }
}
