//! Distribution download logic.
//!
//! Provides a trait-based abstraction for fetching distribution archives,
//! enabling dependency injection for testing. The production implementation
//! speaks HTTP(S) through `ureq` and also accepts `file:` addresses so that
//! mirrored distributions on shared drives work without a web server.

use crate::distribution::{Credentials, DistributionUri};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed between sending a request and receiving the response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for receiving the whole response body.
pub const DEFAULT_BODY_TIMEOUT: Duration = Duration::from_secs(600);

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("antw/", env!("CARGO_PKG_VERSION"));

const CHUNK_SIZE: usize = 8 * 1024;

/// Trait for downloading distribution archives.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
///
/// # Examples
///
/// ```no_run
/// use antw_installer::artefact::download::{Downloader, HttpDownloader, NetworkConfig};
/// use antw_installer::distribution::DistributionUri;
/// use std::path::Path;
///
/// let downloader = HttpDownloader::new(NetworkConfig::default())?;
/// let uri = DistributionUri::parse("https://example.org/dist/tool-1.2.3.zip")?;
/// downloader.download(&uri, Path::new("/tmp/tool-1.2.3.zip.part"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Downloader {
    /// Download the archive at `uri` into `destination`.
    ///
    /// Parent directories of `destination` are created. On failure the
    /// destination may hold a partial body; callers own its cleanup.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails, is cancelled, or the file
    /// cannot be written.
    fn download(&self, uri: &DistributionUri, destination: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from distribution download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The credential-free URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested archive was not found (HTTP 404 or missing file).
    #[error("distribution not found: {url}")]
    NotFound {
        /// The URL that could not be found.
        url: String,
    },

    /// The server did not answer in time.
    #[error("timed out downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The download was cancelled part-way through.
    #[error("download of {url} was interrupted")]
    Interrupted {
        /// The URL whose transfer was cancelled.
        url: String,
    },

    /// Credentials would have been sent over an unencrypted connection.
    #[error("refusing to send credentials over insecure connection to {url}; use https")]
    InsecureCredentials {
        /// The credential-free URL.
        url: String,
    },

    /// The configured proxy address is unusable.
    #[error("invalid proxy {url}: {reason}")]
    InvalidProxy {
        /// The proxy address without credentials.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// I/O error writing the downloaded file.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A shared flag that asks an in-flight download to stop.
///
/// Clones observe the same flag, so one can be handed to a signal handler or
/// another thread while the downloader keeps the other.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag that is not yet raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Reports whether the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An HTTP proxy and the credentials it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy address, e.g. `http://proxy.internal:3128`.
    pub url: String,
    /// Credentials answered to proxy authentication challenges.
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    /// Returns the proxy address with any credentials embedded as user-info.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidProxy`] if the address does not parse
    /// or cannot carry credentials.
    pub fn authenticated_uri(&self) -> Result<String, DownloadError> {
        let invalid = |reason: String| DownloadError::InvalidProxy {
            url: self.url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.url).map_err(|e| invalid(e.to_string()))?;
        if let Some(credentials) = &self.credentials {
            url.set_username(credentials.user())
                .map_err(|()| invalid("address cannot carry a user name".to_owned()))?;
            url.set_password(Some(credentials.password()))
                .map_err(|()| invalid("address cannot carry a password".to_owned()))?;
        }
        Ok(url.into())
    }
}

/// Transport settings for [`HttpDownloader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the response head.
    pub read_timeout: Duration,
    /// Upper bound on receiving the body, measured from the response head.
    pub body_timeout: Duration,
    /// Proxy to route requests through.
    pub proxy: Option<ProxyConfig>,
    /// Basic-auth credentials; take precedence over any in the address.
    pub credentials: Option<Credentials>,
    /// Fail instead of warning when credentials would travel over plain HTTP.
    pub require_secure_auth: bool,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            body_timeout: DEFAULT_BODY_TIMEOUT,
            proxy: None,
            credentials: None,
            require_secure_auth: false,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// Downloader using `ureq` for `http`/`https` and the filesystem for `file`.
pub struct HttpDownloader {
    agent: ureq::Agent,
    config: NetworkConfig,
    cancellation: CancellationFlag,
}

impl HttpDownloader {
    /// Builds a downloader with its own HTTP agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidProxy`] if the proxy settings are
    /// unusable.
    pub fn new(config: NetworkConfig) -> Result<Self, DownloadError> {
        let mut builder = ureq::Agent::config_builder()
            .timeout_connect(Some(config.connect_timeout))
            .timeout_recv_response(Some(config.read_timeout))
            .timeout_recv_body(Some(config.body_timeout));
        if let Some(proxy) = &config.proxy {
            let uri = proxy.authenticated_uri()?;
            let proxy = ureq::Proxy::new(&uri).map_err(|e| DownloadError::InvalidProxy {
                url: proxy.url.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(Some(proxy));
        }
        Ok(Self {
            agent: ureq::Agent::new_with_config(builder.build()),
            config,
            cancellation: CancellationFlag::new(),
        })
    }

    /// Replaces the cancellation flag polled between chunks.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns the flag that cancels downloads made by this value.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    fn download_http(&self, uri: &DistributionUri, destination: &Path) -> Result<(), DownloadError> {
        let url = uri.safe().to_string();
        let mut request = self
            .agent
            .get(uri.safe().as_str())
            .header("User-Agent", self.config.user_agent.as_str());

        let credentials = self.config.credentials.clone().or_else(|| uri.credentials());
        if let Some(credentials) = credentials {
            if uri.safe().scheme() != "https" {
                if self.config.require_secure_auth {
                    return Err(DownloadError::InsecureCredentials { url });
                }
                warn!("sending credentials for {url} over an unencrypted connection");
            }
            request = request.header("Authorization", credentials.basic_auth_header());
        }

        let response = request.call().map_err(|e| map_ureq_error(&url, &e))?;
        let mut body = response.into_body();
        let mut file = File::create(destination)?;
        copy_in_chunks(&mut body.as_reader(), &mut file, &self.cancellation, &url)
    }

    fn download_file(&self, uri: &DistributionUri, destination: &Path) -> Result<(), DownloadError> {
        let url = uri.safe().to_string();
        let source = uri.safe().to_file_path().map_err(|()| DownloadError::Http {
            url: url.clone(),
            reason: "address does not name a local file".to_owned(),
        })?;
        let mut reader = File::open(&source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DownloadError::NotFound { url: url.clone() },
            _ => DownloadError::Io(e),
        })?;
        let mut file = File::create(destination)?;
        copy_in_chunks(&mut reader, &mut file, &self.cancellation, &url)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, uri: &DistributionUri, destination: &Path) -> Result<(), DownloadError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        info!("downloading {uri}");
        match uri.safe().scheme() {
            "file" => self.download_file(uri, destination),
            "http" | "https" => self.download_http(uri, destination),
            other => Err(DownloadError::Http {
                url: uri.safe().to_string(),
                reason: format!("unsupported scheme `{other}`"),
            }),
        }
    }
}

/// Copy `reader` into `writer` one chunk at a time, stopping as soon as
/// `cancellation` is raised.
fn copy_in_chunks(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    cancellation: &CancellationFlag,
    url: &str,
) -> Result<(), DownloadError> {
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut total = 0_usize;
    loop {
        if cancellation.is_cancelled() {
            return Err(DownloadError::Interrupted {
                url: url.to_owned(),
            });
        }
        let read = reader.read(&mut buffer).map_err(|e| map_read_error(url, &e))?;
        if read == 0 {
            break;
        }
        writer.write_all(buffer.get(..read).unwrap_or_default())?;
        total += read;
    }
    writer.flush()?;
    debug!("wrote {total} bytes from {url}");
    Ok(())
}

/// Map a body read failure to a [`DownloadError`].
///
/// `ureq` reports an expired body budget as an `io::Error` wrapping its own
/// `Timeout` error rather than as `TimedOut`.
fn map_read_error(url: &str, err: &io::Error) -> DownloadError {
    let wrapped_timeout = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ureq::Error>())
        .is_some_and(|inner| matches!(inner, ureq::Error::Timeout(_)));
    if wrapped_timeout || err.kind() == io::ErrorKind::TimedOut {
        return DownloadError::Timeout {
            url: url.to_owned(),
        };
    }
    DownloadError::Http {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::Timeout(_) => DownloadError::Timeout {
            url: url.to_owned(),
        },
        other => DownloadError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
