//! antw CLI entrypoint.
//!
//! Installs the distribution pinned by the project's `antw.toml` if needed,
//! then runs Ant with the remaining arguments and exits with its status.

use antw::cli::Cli;
use antw::config::{WrapperConfig, resolve_project_dir, resolve_user_home};
use antw::dirs::{BaseDirs, SystemBaseDirs};
use antw::error::{Result, WrapperError};
use antw::launcher::{Launcher, SystemCommandRunner};
use antw_installer::artefact::download::HttpDownloader;
use antw_installer::distribution::BaseDirectories;
use antw_installer::error::InstallerError;
use antw_installer::install::{Installation, Installer};
use clap::Parser;
use log::LevelFilter;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(log_level(&cli));
    let mut stderr = std::io::stderr();
    let exit_code = exit_code_for_run_result(run(&cli), &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let installation = install_distribution(cli, &SystemBaseDirs)?;
    let code = Launcher::from_env().launch(
        installation.root(),
        &cli.ant_args,
        &SystemCommandRunner,
    )?;
    Ok(code)
}

fn install_distribution(cli: &Cli, dirs: &dyn BaseDirs) -> Result<Installation> {
    let project_dir = resolve_project_dir(cli.project_dir())?;
    let config =
        WrapperConfig::load(&project_dir)?.with_env_overrides(|key| std::env::var(key).ok());
    let user_home = resolve_user_home(cli.user_home(), dirs)?;
    let bases = BaseDirectories::new(user_home, project_dir.as_std_path());
    let spec = config.distribution_spec()?;

    let downloader = HttpDownloader::new(config.network_config()).map_err(InstallerError::from)?;
    let installer = Installer::new(downloader).with_options(config.install_options());
    let installation = installer.ensure_installed(&spec, &bases)?;
    log::info!(
        "using {} ({:?})",
        installation.root().display(),
        installation.source()
    );
    Ok(installation)
}

fn log_level(cli: &Cli) -> LevelFilter {
    if cli.verbose {
        LevelFilter::Info
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    }
}

fn init_logging(level: LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(level.as_str());
    if env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init()
        .is_err()
    {
        // A logger is already installed.
    }
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, failure_message(&err));
            1
        }
    }
}

fn failure_message(err: &WrapperError) -> String {
    format!("antw: {} failed: {err}", err.phase())
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antw::config::{CONFIG_FILE, ConfigError};
    use antw_installer::install::InstallSource;
    use antw_installer::test_utils::build_zip_distribution;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct NoHome;

    impl BaseDirs for NoHome {
        fn home_dir(&self) -> Option<PathBuf> {
            None
        }
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    fn cli_for(project: &TempDir, home: &TempDir) -> Cli {
        Cli {
            project_dir: Some(utf8(project)),
            user_home: Some(utf8(home)),
            ..Cli::default()
        }
    }

    #[rstest]
    #[case::ant_succeeded(0)]
    #[case::ant_failed(3)]
    fn exit_code_for_run_result_forwards_ant_status(#[case] code: i32) {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(code), &mut stderr);
        assert_eq!(exit_code, code);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = WrapperError::from(ConfigError::NoHomeDirectory);

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.starts_with("antw: configuration failed: cannot determine"));
        assert_eq!(stderr_text.lines().count(), 1);
    }

    #[rstest]
    #[case::default(false, false, LevelFilter::Warn)]
    #[case::verbose(true, false, LevelFilter::Info)]
    #[case::quiet(false, true, LevelFilter::Error)]
    fn log_level_follows_flags(
        #[case] verbose: bool,
        #[case] quiet: bool,
        #[case] expected: LevelFilter,
    ) {
        let cli = Cli {
            verbose,
            quiet,
            ..Cli::default()
        };
        assert_eq!(log_level(&cli), expected);
    }

    #[test]
    fn missing_configuration_stops_before_installing() {
        let project = tempfile::tempdir().expect("temp dir");
        let home = tempfile::tempdir().expect("temp dir");

        let err = install_distribution(&cli_for(&project, &home), &NoHome)
            .expect_err("expected missing configuration");
        assert!(matches!(
            err,
            WrapperError::Config(ConfigError::NotFound { .. })
        ));
        assert!(failure_message(&err).starts_with("antw: configuration failed"));
    }

    #[cfg(unix)]
    #[test]
    fn installs_from_a_local_distribution() {
        let project = tempfile::tempdir().expect("temp dir");
        let home = tempfile::tempdir().expect("temp dir");
        let archive = project.path().join("apache-ant-1.10.14-bin.zip");
        let payload = build_zip_distribution(&["apache-ant-1.10.14"]).expect("fixture zip");
        fs::write(&archive, payload).expect("write archive");
        let config = project.path().join(CONFIG_FILE);
        fs::create_dir_all(config.parent().expect("parent")).expect("mkdir");
        fs::write(
            &config,
            format!("distribution_url = \"file://{}\"\n", archive.display()),
        )
        .expect("write config");
        let cli = cli_for(&project, &home);

        let first = install_distribution(&cli, &NoHome).expect("first install");
        let second = install_distribution(&cli, &NoHome).expect("second install");

        assert_eq!(first.source(), InstallSource::Downloaded);
        assert_eq!(second.source(), InstallSource::Cached);
        assert!(first.root().starts_with(home.path()));
        assert!(first.root().ends_with("apache-ant-1.10.14"));
    }
}
