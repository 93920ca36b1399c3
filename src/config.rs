//! Wrapper configuration loaded from `ant/wrapper/antw.toml`.
//!
//! Each project pins its Ant distribution in a small TOML file checked in
//! next to the build. [`WrapperConfig`] deserialises that file and converts
//! it into the inputs of the installer core: a [`DistributionSpec`], a
//! [`NetworkConfig`], and [`InstallOptions`].
//!
//! ```toml
//! distribution_url = "https://archive.apache.org/dist/ant/binaries/apache-ant-1.10.14-bin.zip"
//! distribution_sha256_sum = "4e74b382dd8271f9eac9fef69ba94751fb8a8356dbd995c4d642f2dad33de77b"
//!
//! [network]
//! connect_timeout_secs = 20
//! ```

use crate::dirs::BaseDirs;
use antw_installer::artefact::download::{NetworkConfig, ProxyConfig};
use antw_installer::artefact::sha256_digest::Sha256Digest;
use antw_installer::distribution::{
    BaseKind, Credentials, DEFAULT_DISTS_PATH, DistributionSpec, DistributionUri, StoreLocation,
};
use antw_installer::install::InstallOptions;
use antw_installer::lock::LockOptions;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Location of the configuration file relative to the project directory.
pub const CONFIG_FILE: &str = "ant/wrapper/antw.toml";

/// Environment variable overriding the wrapper user home.
pub const USER_HOME_ENV: &str = "ANTW_USER_HOME";

/// Environment variable overriding the basic-auth user.
pub const WRAPPER_USER_ENV: &str = "ANTW_WRAPPER_USER";

/// Environment variable overriding the basic-auth password.
pub const WRAPPER_PASSWORD_ENV: &str = "ANTW_WRAPPER_PASSWORD";

/// Directory under the home directory used when nothing else is configured.
pub const DEFAULT_USER_HOME_DIR: &str = ".antw";

/// Errors raised while locating or interpreting the wrapper configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("no wrapper configuration found at {path}")]
    NotFound {
        /// Where the file was expected.
        path: Utf8PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being read.
        path: Utf8PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The file being parsed.
        path: Utf8PathBuf,
        /// The parser's diagnosis.
        #[source]
        source: toml::de::Error,
    },

    /// A value is present but unusable.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A directory path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// Neither an override nor a home directory is available.
    #[error("cannot determine the user home; set ANTW_USER_HOME or pass --user-home")]
    NoHomeDirectory,
}

/// Result type alias using [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;

/// The contents of `antw.toml`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WrapperConfig {
    /// Address of the distribution archive. Required.
    pub distribution_url: String,
    /// Base kind for the extraction store.
    #[serde(default = "default_base")]
    pub distribution_base: String,
    /// Extraction store path relative to its base.
    #[serde(default = "default_path")]
    pub distribution_path: PathBuf,
    /// Base kind for the archive store.
    #[serde(default = "default_base")]
    pub archive_base: String,
    /// Archive store path relative to its base.
    #[serde(default = "default_path")]
    pub archive_path: PathBuf,
    /// Expected SHA-256 digest of the archive.
    #[serde(default)]
    pub distribution_sha256_sum: Option<String>,
    /// Transport settings.
    #[serde(default)]
    pub network: NetworkSettings,
    /// Basic-auth credentials for the distribution server.
    #[serde(default)]
    pub auth: AuthSettings,
    /// Install lock tuning.
    #[serde(default)]
    pub lock: LockSettings,
}

fn default_base() -> String {
    BaseKind::USER_HOME.to_owned()
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_DISTS_PATH)
}

/// The `[network]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Response timeout in seconds.
    pub read_timeout_secs: u64,
    /// Budget for receiving the whole archive body, in seconds.
    pub body_timeout_secs: u64,
    /// Refuse to send credentials over plain HTTP.
    pub require_secure_auth: bool,
    /// Optional HTTP proxy.
    pub proxy: Option<ProxySettings>,
}

impl NetworkSettings {
    const fn default_timeout_secs() -> u64 {
        10
    }

    const fn default_body_timeout_secs() -> u64 {
        600
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Self::default_timeout_secs(),
            read_timeout_secs: Self::default_timeout_secs(),
            body_timeout_secs: Self::default_body_timeout_secs(),
            require_secure_auth: false,
            proxy: None,
        }
    }
}

/// The `[network.proxy]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    /// Proxy address.
    pub url: String,
    /// Proxy user.
    #[serde(default)]
    pub user: Option<String>,
    /// Proxy password.
    #[serde(default)]
    pub password: Option<String>,
}

/// The `[auth]` table.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSettings {
    /// User name.
    pub user: Option<String>,
    /// Password; empty when omitted.
    pub password: Option<String>,
}

/// The `[lock]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LockSettings {
    /// How long to wait for another installer, in seconds.
    pub timeout_secs: u64,
    /// Pause between lock attempts, in milliseconds.
    pub poll_interval_millis: u64,
}

impl LockSettings {
    const fn default_timeout_secs() -> u64 {
        120
    }

    const fn default_poll_interval_millis() -> u64 {
        200
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            poll_interval_millis: Self::default_poll_interval_millis(),
        }
    }
}

impl WrapperConfig {
    /// Loads `antw.toml` from `project_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing,
    /// [`ConfigError::Read`] if it cannot be read, and
    /// [`ConfigError::Parse`] if it is malformed.
    pub fn load(project_dir: &Utf8Path) -> Result<Self> {
        Self::load_with(project_dir, |path| std::fs::read_to_string(path))
    }

    /// Loads configuration using the supplied reader.
    ///
    /// The reader receives the full path of the configuration file. This
    /// seam lets tests supply file contents without touching the disk.
    ///
    /// # Errors
    ///
    /// As for [`Self::load`].
    ///
    /// # Examples
    ///
    /// ```
    /// use antw::config::WrapperConfig;
    /// use camino::Utf8Path;
    ///
    /// let config = WrapperConfig::load_with(Utf8Path::new("/work"), |path| {
    ///     assert!(path.ends_with("ant/wrapper/antw.toml"));
    ///     Ok("distribution_url = \"https://example.org/dist/tool-1.2.3.zip\"\n".to_owned())
    /// })?;
    /// assert_eq!(config.lock.timeout_secs, 120);
    /// # Ok::<(), antw::config::ConfigError>(())
    /// ```
    pub fn load_with<F>(project_dir: &Utf8Path, reader: F) -> Result<Self>
    where
        F: FnOnce(&Utf8Path) -> io::Result<String>,
    {
        let path = project_dir.join(CONFIG_FILE);
        let source = reader(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound { path: path.clone() },
            _ => ConfigError::Read {
                path: path.clone(),
                source,
            },
        })?;
        toml::from_str(&source).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Replaces the `[auth]` values with those found through `lookup`.
    ///
    /// `lookup` is normally `|key| std::env::var(key).ok()`. Empty values are
    /// ignored.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key| lookup(key).filter(|value: &String| !value.is_empty());
        if let Some(user) = non_empty(WRAPPER_USER_ENV) {
            self.auth.user = Some(user);
        }
        if let Some(password) = non_empty(WRAPPER_PASSWORD_ENV) {
            self.auth.password = Some(password);
        }
        self
    }

    /// Builds the installer request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the address, a base kind, or the
    /// checksum is malformed.
    pub fn distribution_spec(&self) -> Result<DistributionSpec> {
        let uri = DistributionUri::parse(&self.distribution_url).map_err(|e| {
            ConfigError::Invalid {
                key: "distribution_url",
                reason: e.to_string(),
            }
        })?;
        let mut spec = DistributionSpec::new(uri)
            .with_archive_store(StoreLocation {
                base: parse_base("archive_base", &self.archive_base)?,
                path: self.archive_path.clone(),
            })
            .with_extraction_store(StoreLocation {
                base: parse_base("distribution_base", &self.distribution_base)?,
                path: self.distribution_path.clone(),
            });
        if let Some(sum) = &self.distribution_sha256_sum {
            let digest = sum.parse::<Sha256Digest>().map_err(|e| ConfigError::Invalid {
                key: "distribution_sha256_sum",
                reason: e.to_string(),
            })?;
            spec = spec.with_checksum(digest);
        }
        Ok(spec)
    }

    /// Builds the downloader settings.
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let network = &self.network;
        NetworkConfig {
            connect_timeout: Duration::from_secs(network.connect_timeout_secs),
            read_timeout: Duration::from_secs(network.read_timeout_secs),
            body_timeout: Duration::from_secs(network.body_timeout_secs),
            proxy: network.proxy.as_ref().map(|proxy| ProxyConfig {
                url: proxy.url.clone(),
                credentials: credentials(proxy.user.as_ref(), proxy.password.as_ref()),
            }),
            credentials: credentials(self.auth.user.as_ref(), self.auth.password.as_ref()),
            require_secure_auth: network.require_secure_auth,
            ..NetworkConfig::default()
        }
    }

    /// Builds the installer options.
    #[must_use]
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            lock: LockOptions {
                timeout: Duration::from_secs(self.lock.timeout_secs),
                poll_interval: Duration::from_millis(self.lock.poll_interval_millis),
            },
            ..InstallOptions::default()
        }
    }
}

fn parse_base(key: &'static str, value: &str) -> Result<BaseKind> {
    BaseKind::from_str(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn credentials(user: Option<&String>, password: Option<&String>) -> Option<Credentials> {
    user.map(|user| Credentials::new(user.as_str(), password.map_or("", String::as_str)))
}

/// Resolves the wrapper user home.
///
/// Precedence: the `--user-home` flag, then `ANTW_USER_HOME`, then
/// `<home>/.antw`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if nothing is configured and the
/// home directory is unknown.
pub fn resolve_user_home(flag: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.as_std_path().to_path_buf());
    }
    if let Some(path) = std::env::var_os(USER_HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs.home_dir()
        .map(|home| home.join(DEFAULT_USER_HOME_DIR))
        .ok_or(ConfigError::NoHomeDirectory)
}

/// Resolves the project directory: the `--project-dir` flag or the current
/// working directory.
///
/// # Errors
///
/// Returns [`ConfigError::NonUtf8Path`] if the working directory is not
/// UTF-8, or [`ConfigError::Invalid`] if it cannot be determined.
pub fn resolve_project_dir(flag: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Invalid {
        key: "project_dir",
        reason: e.to_string(),
    })?;
    Utf8PathBuf::try_from(cwd).map_err(|e| ConfigError::NonUtf8Path {
        path: e.into_path_buf(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
