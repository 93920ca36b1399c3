//! Command-line interface for the `antw` wrapper.
//!
//! The wrapper consumes a handful of its own options and forwards every
//! remaining argument to Ant untouched, so `antw -buildfile b.xml compile`
//! behaves like `ant -buildfile b.xml compile`.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;

/// Bootstrap a pinned Apache Ant distribution and run it.
#[derive(Parser, Debug, Default)]
#[command(name = "antw")]
#[command(version, about)]
#[command(long_about = concat!(
    "Bootstrap a pinned Apache Ant distribution and run it.\n\n",
    "The distribution named in ant/wrapper/antw.toml is downloaded, verified, ",
    "and extracted once into a shared cache, then launched with the remaining ",
    "arguments. Wrapper options must precede the first Ant argument.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Run the default target:\n",
    "    $ antw\n\n",
    "  Pass arguments through to Ant:\n",
    "    $ antw -buildfile build.xml clean dist\n\n",
    "  Keep the cache somewhere else:\n",
    "    $ antw --user-home /var/cache/antw test",
))]
pub struct Cli {
    /// Directory containing `ant/wrapper/antw.toml`; defaults to the
    /// current directory.
    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<Utf8PathBuf>,

    /// Wrapper user home; overrides `ANTW_USER_HOME`.
    #[arg(long, value_name = "DIR")]
    pub user_home: Option<Utf8PathBuf>,

    /// Log install progress.
    #[arg(long = "antw-verbose", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors.
    #[arg(long = "antw-quiet")]
    pub quiet: bool,

    /// Arguments passed to Ant.
    #[arg(
        value_name = "ANT_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 0..
    )]
    pub ant_args: Vec<String>,
}

impl Cli {
    /// Returns the `--project-dir` override, if any.
    #[must_use]
    pub fn project_dir(&self) -> Option<&Utf8Path> {
        self.project_dir.as_deref()
    }

    /// Returns the `--user-home` override, if any.
    #[must_use]
    pub fn user_home(&self) -> Option<&Utf8Path> {
        self.user_home.as_deref()
    }
}
