use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::builder::{build, BuildOptions};
use crate::cli::{Cli, Command};
use crate::color::set_color_mode;
use crate::config::RootCommandConfig;
use crate::docker::{run_docker_inspect, Engine};
use crate::errors::AppsodyError;
use crate::extract::extract;
use crate::logging::LoggingConfig;
use crate::reference::validate_reference;
use crate::util::exec::ExecRequest;

/// Printed after every successful `--dryrun` invocation.
pub const DRYRUN_COMPLETE: &str = "Dryrun complete";

/// Parse `args` (including the program name) and run the command, logging through `log`.
///
/// `project_dir` overrides the working project (defaults to the current directory), so callers
/// can run several invocations in one process without changing the process cwd.
pub fn run_cli<I, T>(
    args: I,
    log: &LoggingConfig,
    project_dir: Option<PathBuf>,
) -> Result<(), AppsodyError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let rendered = e.render().to_string();
            return match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    log.info(rendered.trim_end());
                    Ok(())
                }
                _ => Err(AppsodyError::Usage(rendered.trim_end().to_string())),
            };
        }
    };
    execute(cli, log, project_dir)
}

pub fn execute(
    cli: Cli,
    log: &LoggingConfig,
    project_dir: Option<PathBuf>,
) -> Result<(), AppsodyError> {
    if let Some(mode) = cli.color {
        set_color_mode(mode);
    }
    let mut log = log.clone();
    log.refresh_color();
    log.set_verbose(cli.verbose);

    if cli.command == Command::Version {
        run_version(&log);
        return Ok(());
    }

    let project_dir = match project_dir {
        Some(p) => p,
        None => env::current_dir()?,
    };
    let config = RootCommandConfig::load(
        project_dir,
        cli.config.as_deref(),
        cli.dryrun,
        cli.verbose,
    )?;
    log.debug(&format!("Using config file {}", config.config_file.display()));
    log.debug(&format!("Project directory {}", config.project_dir.display()));

    match cli.command {
        Command::Build {
            tag,
            buildah,
            buildah_options,
            docker_options,
            push,
        } => {
            let opts = BuildOptions {
                tag,
                buildah,
                buildah_options,
                docker_options,
                push,
            };
            let config = RootCommandConfig {
                buildah,
                ..config.clone()
            };
            build(&config, &log, &opts)?;
        }
        Command::Extract {
            target_dir,
            buildah,
        } => {
            let engine = if buildah {
                Engine::Buildah
            } else {
                Engine::Docker
            };
            let config = RootCommandConfig {
                buildah,
                ..config.clone()
            };
            extract(&config, &log, engine, target_dir.as_deref())?;
        }
        Command::Inspect { image } => run_inspect(&config, &log, &image)?,
        Command::Version => {}
    }

    if config.dryrun {
        log.info(DRYRUN_COMPLETE);
    }
    Ok(())
}

fn run_inspect(
    config: &RootCommandConfig,
    log: &LoggingConfig,
    image: &str,
) -> Result<(), AppsodyError> {
    if config.dryrun {
        validate_reference(image).map_err(|e| AppsodyError::Message(e.to_string()))?;
        let preview = ExecRequest::new("docker")
            .args(["image", "inspect", image])
            .preview();
        log.dry_run(&preview);
        return Ok(());
    }
    // run_docker_inspect already logged the details
    let out = run_docker_inspect(log, image).map_err(|e| match e.into_error() {
        AppsodyError::NotFound(_) => AppsodyError::NotFound(format!("Could not inspect image {image}")),
        AppsodyError::Message(_) => AppsodyError::Message(format!("Could not inspect image {image}")),
        other => other,
    })?;
    log.info(out.trim_end());
    Ok(())
}

fn run_version(log: &LoggingConfig) {
    log.info(&format!("appsody {}", env!("CARGO_PKG_VERSION")));
    log.info(&format!(
        "  target: {}  profile: {}",
        env!("APPSODY_BUILD_TARGET"),
        env!("APPSODY_BUILD_PROFILE")
    ));
    log.info(&format!("  built:  {}", env!("APPSODY_BUILD_DATE")));
    log.info(&format!(
        "  host:   {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::SharedBuffer;

    fn logger() -> (SharedBuffer, LoggingConfig) {
        let buf = SharedBuffer::new();
        let log = LoggingConfig::with_writers(buf.clone(), buf.clone());
        (buf, log)
    }

    #[test]
    fn test_version_needs_no_config() {
        let (buf, log) = logger();
        run_cli(["appsody", "version"], &log, None).unwrap();
        assert!(buf
            .contents()
            .starts_with(&format!("appsody {}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn test_usage_error_maps_to_exit_code_2() {
        let (_buf, log) = logger();
        let err = run_cli(["appsody", "frobnicate"], &log, None).unwrap_err();
        assert!(matches!(err, AppsodyError::Usage(_)), "{err:?}");
        assert_eq!(crate::errors::exit_code_for_error(&err), 2);
    }

    #[test]
    fn test_help_is_logged_not_an_error() {
        let (buf, log) = logger();
        run_cli(["appsody", "--help"], &log, None).unwrap();
        assert!(buf.contents().contains("Usage:"));
    }

    #[test]
    fn test_inspect_dryrun_prints_command() {
        let td = tempfile::tempdir().unwrap();
        let cfg = td.path().join("cfg/.appsody.yaml");
        let (buf, log) = logger();
        run_cli(
            [
                "appsody".into(),
                OsString::from("--config"),
                cfg.clone().into_os_string(),
                "--dryrun".into(),
                "inspect".into(),
                "imagename".into(),
            ],
            &log,
            Some(td.path().to_path_buf()),
        )
        .unwrap();
        let out = buf.contents();
        assert!(out.contains("Dry Run - Skipping command: docker image inspect imagename"));
        assert!(out.ends_with("Dryrun complete\n"), "{out}");
        assert!(!cfg.exists());
    }

    #[test]
    fn test_inspect_dryrun_still_validates_reference() {
        let td = tempfile::tempdir().unwrap();
        let cfg = td.path().join("cfg/.appsody.yaml");
        let (buf, log) = logger();
        let err = run_cli(
            [
                "appsody".into(),
                OsString::from("--config"),
                cfg.into_os_string(),
                "--dryrun".into(),
                "inspect".into(),
                "imageName".into(),
            ],
            &log,
            Some(td.path().to_path_buf()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid reference format: repository name must be lowercase"
        );
        let out = buf.contents();
        assert!(!out.contains("Dry Run - Skipping command"), "{out}");
        assert!(!out.contains("Dryrun complete"), "{out}");
    }
}
