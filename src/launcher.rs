//! Starting Ant from an installed distribution.
//!
//! Ant is started the way its own launcher scripts do it: a JVM running
//! `org.apache.tools.ant.Main` with every jar under `<root>/lib` on the
//! classpath and `ant.home` pointing at the installation root.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Ant's command-line entry point.
pub const ANT_MAIN_CLASS: &str = "org.apache.tools.ant.Main";

/// Environment variable naming the JDK to run Ant with.
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";

/// JDK archives that older Ant tasks expect on the boot classpath.
const JDK_EXTRA_JARS: [&str; 2] = ["lib/tools.jar", "lib/classes.jar"];

/// Errors raised while starting Ant.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The installation has no `lib` directory.
    #[error("installation at {} has no lib directory", .root.display())]
    MissingLibDir {
        /// The installation root.
        root: PathBuf,
    },

    /// The `lib` directory could not be listed.
    #[error("failed to read {}: {source}", .path.display())]
    ReadLibDir {
        /// The directory being listed.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A classpath entry contains the platform path separator.
    #[error("cannot build classpath: {reason}")]
    InvalidClasspath {
        /// Why joining failed.
        reason: String,
    },

    /// The JVM could not be started.
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        /// The program that was run.
        program: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Runs a child process to completion.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Runs `program` with `args`, inheriting the standard streams, and
    /// returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning or waiting.
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<i32>;
}

/// Runs commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<i32> {
        let status = Command::new(program).args(args).status()?;
        // Killed by a signal: report a generic failure.
        Ok(status.code().unwrap_or(1))
    }
}

/// Collects the classpath for an Ant installation rooted at `root`.
///
/// Jars are taken from `<root>/lib` in name order, followed by the JDK's
/// `tools.jar` and `classes.jar` when `java_home` provides them.
///
/// # Errors
///
/// Returns [`LaunchError::MissingLibDir`] or [`LaunchError::ReadLibDir`] if
/// the jars cannot be listed.
pub fn bootstrap_classpath(
    root: &Path,
    java_home: Option<&Path>,
) -> Result<Vec<PathBuf>, LaunchError> {
    let lib = root.join("lib");
    if !lib.is_dir() {
        return Err(LaunchError::MissingLibDir {
            root: root.to_path_buf(),
        });
    }
    let read_failed = |source| LaunchError::ReadLibDir {
        path: lib.clone(),
        source,
    };

    let mut jars = Vec::new();
    for entry in std::fs::read_dir(&lib).map_err(read_failed)? {
        let path = entry.map_err(read_failed)?.path();
        let is_jar = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
        if is_jar && path.is_file() {
            jars.push(path);
        }
    }
    jars.sort();

    if let Some(java_home) = java_home {
        jars.extend(
            JDK_EXTRA_JARS
                .iter()
                .map(|jar| java_home.join(jar))
                .filter(|jar| jar.is_file()),
        );
    }
    Ok(jars)
}

/// Returns the JVM to run: `<java_home>/bin/java`, or `java` from `PATH`.
#[must_use]
pub fn java_executable(java_home: Option<&Path>) -> PathBuf {
    let name = if cfg!(windows) { "java.exe" } else { "java" };
    java_home.map_or_else(|| PathBuf::from(name), |home| home.join("bin").join(name))
}

/// Starts Ant from an installation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Launcher {
    java_home: Option<PathBuf>,
}

impl Launcher {
    /// Creates a launcher using `java_home`, or `PATH` when `None`.
    #[must_use]
    pub fn new(java_home: Option<PathBuf>) -> Self {
        Self { java_home }
    }

    /// Creates a launcher from `JAVA_HOME`; empty values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let java_home = std::env::var_os(JAVA_HOME_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::new(java_home)
    }

    /// Builds the JVM arguments for running Ant from `root`.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] if the classpath cannot be assembled.
    pub fn jvm_args<S: AsRef<OsStr>>(
        &self,
        root: &Path,
        ant_args: &[S],
    ) -> Result<Vec<OsString>, LaunchError> {
        let classpath = bootstrap_classpath(root, self.java_home.as_deref())?;
        let joined = std::env::join_paths(&classpath).map_err(|e| {
            LaunchError::InvalidClasspath {
                reason: e.to_string(),
            }
        })?;

        let mut ant_home = OsString::from("-Dant.home=");
        ant_home.push(root.as_os_str());

        let mut args = vec![ant_home, OsString::from("-cp"), joined, ANT_MAIN_CLASS.into()];
        args.extend(ant_args.iter().map(|arg| arg.as_ref().to_os_string()));
        Ok(args)
    }

    /// Runs Ant from `root` with `ant_args` and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] if the classpath cannot be assembled or the
    /// JVM cannot be started.
    pub fn launch<S: AsRef<OsStr>>(
        &self,
        root: &Path,
        ant_args: &[S],
        runner: &dyn CommandRunner,
    ) -> Result<i32, LaunchError> {
        let args = self.jvm_args(root, ant_args)?;
        let program = java_executable(self.java_home.as_deref());
        log::debug!("starting {} with {} argument(s)", program.display(), args.len());
        runner
            .run(&program, &args)
            .map_err(|source| LaunchError::Spawn { program, source })
    }
}
