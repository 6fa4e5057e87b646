//! `appsody build`: extract the project, then build an image with Docker or Buildah.

use crate::config::RootCommandConfig;
use crate::docker::{Engine, EngineRunner};
use crate::errors::AppsodyError;
use crate::extract::extract;
use crate::logging::LoggingConfig;
use crate::project::Project;
use crate::reference::validate_reference;
use crate::util::split_options;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub tag: Option<String>,
    pub buildah: bool,
    pub buildah_options: Option<String>,
    pub docker_options: Option<String>,
    pub push: bool,
}

impl BuildOptions {
    pub fn engine(&self) -> Engine {
        if self.buildah {
            Engine::Buildah
        } else {
            Engine::Docker
        }
    }

    /// Check flag combinations and split the pass-through options string.
    pub fn engine_options(&self) -> Result<Vec<String>, AppsodyError> {
        if self.buildah && self.docker_options.is_some() {
            return Err(AppsodyError::Config(
                "Cannot specify --docker-options flag with --buildah".to_string(),
            ));
        }
        if !self.buildah && self.buildah_options.is_some() {
            return Err(AppsodyError::Config(
                "Cannot specify --buildah-options flag without --buildah".to_string(),
            ));
        }
        let (flag, raw) = if self.buildah {
            ("--buildah-options", self.buildah_options.as_deref())
        } else {
            ("--docker-options", self.docker_options.as_deref())
        };
        let opts = raw.map(split_options).unwrap_or_default();
        for o in &opts {
            if o == "-t" || o == "--tag" || o.starts_with("--tag=") || o.starts_with("-t=") {
                return Err(AppsodyError::Config(format!(
                    "Cannot specify a tag in {flag}; use --tag instead"
                )));
            }
            if o == "-f" || o == "--file" || o.starts_with("--file=") {
                return Err(AppsodyError::Config(format!(
                    "Cannot specify a Dockerfile in {flag}; the stack provides it"
                )));
            }
        }
        Ok(opts)
    }
}

/// Build the project image and return its tag.
pub fn build(
    config: &RootCommandConfig,
    log: &LoggingConfig,
    opts: &BuildOptions,
) -> Result<String, AppsodyError> {
    let engine = opts.engine();
    let engine_opts = opts.engine_options()?;

    // reject a bad tag before any container or file is touched
    let project = Project::load(&config.project_dir)?;
    let tag = match opts.tag.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => project.default_tag(),
    };
    validate_reference(&tag)
        .map_err(|e| AppsodyError::Config(format!("Invalid tag \"{tag}\": {e}")))?;

    let extracted = extract(config, log, engine, None)?;

    let dockerfile = extracted.dir.join("Dockerfile");
    if !config.dryrun && !dockerfile.is_file() {
        return Err(AppsodyError::NotFound(format!(
            "The stack image {} did not provide a Dockerfile at {}",
            extracted.project.stack,
            dockerfile.display()
        )));
    }

    let mut args = vec![
        match engine {
            Engine::Docker => "build",
            Engine::Buildah => "bud",
        }
        .to_string(),
        "-t".to_string(),
        tag.clone(),
    ];
    args.extend(engine_opts);
    args.push("-f".to_string());
    args.push(dockerfile.display().to_string());
    args.push(extracted.dir.display().to_string());

    let runner = EngineRunner::new(log, config.dryrun);
    log.info(&format!("Building image {tag} with {}", engine.label()));
    runner.run_streamed(engine, &args)?;

    if opts.push {
        runner.run_streamed(engine, &["push".to_string(), tag.clone()])?;
    }

    if !config.dryrun {
        log.info(&format!("Built docker image {tag}"));
    }
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_options_split_and_validate() {
        let opts = BuildOptions {
            buildah: true,
            buildah_options: Some("--format=docker --layers".to_string()),
            ..BuildOptions::default()
        };
        assert_eq!(opts.engine(), Engine::Buildah);
        assert_eq!(
            opts.engine_options().unwrap(),
            vec!["--format=docker", "--layers"]
        );
    }

    #[test]
    fn test_engine_options_reject_mismatched_flags() {
        let opts = BuildOptions {
            buildah: false,
            buildah_options: Some("--format=docker".to_string()),
            ..BuildOptions::default()
        };
        let err = opts.engine_options().unwrap_err();
        assert!(err.to_string().contains("without --buildah"), "{err}");

        let opts = BuildOptions {
            buildah: true,
            docker_options: Some("--pull".to_string()),
            ..BuildOptions::default()
        };
        assert!(opts.engine_options().is_err());
    }

    #[test]
    fn test_engine_options_reject_tag_and_file() {
        for bad in ["-t x", "--tag=x", "--file Dockerfile", "-f x"] {
            let opts = BuildOptions {
                docker_options: Some(bad.to_string()),
                ..BuildOptions::default()
            };
            assert!(opts.engine_options().is_err(), "{bad} should be rejected");
        }
    }
}
