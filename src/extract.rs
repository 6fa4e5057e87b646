//! Merge a stack's project template with the user's sources into an extract directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RootCommandConfig;
use crate::docker::{inspect_env, stack_project_dir, Engine, EngineRunner};
use crate::errors::AppsodyError;
use crate::lock::acquire_extract_lock;
use crate::logging::LoggingConfig;
use crate::project::Project;
use crate::reference::validate_reference;
use crate::util::fs::{copy_dir_contents, remove_dir_if_exists};
use crate::util::id::create_short_id;

/// Sub-directory of the extract dir holding the user's sources.
pub const USER_APP_DIR: &str = "user-app";

#[derive(Debug, Clone)]
pub struct Extracted {
    pub project: Project,
    pub dir: PathBuf,
}

/// Extract the stack template and user sources. With `target_dir` unset the result lands in
/// `<home>/extract/<project-name>`, replacing any previous extraction; an explicit target
/// must not exist yet.
pub fn extract(
    config: &RootCommandConfig,
    log: &LoggingConfig,
    engine: Engine,
    target_dir: Option<&Path>,
) -> Result<Extracted, AppsodyError> {
    let project = Project::load(&config.project_dir)?;
    validate_reference(&project.stack).map_err(|e| {
        AppsodyError::Config(format!("Invalid stack image \"{}\": {e}", project.stack))
    })?;

    let extract_root = config.extract_root();
    let target = match target_dir {
        Some(t) if t.is_absolute() => t.to_path_buf(),
        Some(t) => config.project_dir.join(t),
        None => extract_root.join(&project.name),
    };
    if target_dir.is_some() && target.exists() {
        return Err(AppsodyError::Config(format!(
            "Cannot extract to an existing target-dir: {}",
            target.display()
        )));
    }

    let _lock = if config.dryrun {
        None
    } else {
        Some(acquire_extract_lock(&extract_root, &project.name)?)
    };

    log.debug(&format!(
        "Extracting project {} (stack {}) to {}",
        project.name,
        project.stack,
        target.display()
    ));

    let runner = EngineRunner::new(log, config.dryrun);
    if !config.dryrun {
        remove_dir_if_exists(&target)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
    }

    let env = match inspect_env(&runner, engine, &project.stack) {
        Ok(env) => env,
        Err(AppsodyError::Command { .. }) => {
            log.info(&format!("Pulling stack image {}", project.stack));
            runner.run_streamed(engine, &["pull".to_string(), project.stack.clone()])?;
            inspect_env(&runner, engine, &project.stack)?
        }
        Err(e) => return Err(e),
    };
    let image_project_dir = stack_project_dir(&env);
    let container = format!("{}-extract-{}", project.name, create_short_id());

    match engine {
        Engine::Docker => extract_with_docker(
            &runner,
            &project.stack,
            &container,
            &image_project_dir,
            &target,
        )?,
        Engine::Buildah => extract_with_buildah(
            &runner,
            &project.stack,
            &container,
            &image_project_dir,
            &target,
        )?,
    }

    let user_app = target.join(USER_APP_DIR);
    if config.dryrun {
        log.dry_run(&format!(
            "copy {} {}",
            project.dir.display(),
            user_app.display()
        ));
    } else {
        let mut skip = vec![".git".to_string()];
        // keep a target inside the project from copying itself
        if let Ok(rel) = target.strip_prefix(&project.dir) {
            if let Some(first) = rel.components().next() {
                skip.push(first.as_os_str().to_string_lossy().into_owned());
            }
        }
        let skip: Vec<&str> = skip.iter().map(String::as_str).collect();
        let n = copy_dir_contents(&project.dir, &user_app, &skip)?;
        log.debug(&format!("Copied {n} project files to {}", user_app.display()));
        log.info(&format!("Project extracted to {}", target.display()));
    }

    Ok(Extracted {
        project,
        dir: target,
    })
}

fn extract_with_docker(
    runner: &EngineRunner<'_>,
    stack: &str,
    container: &str,
    image_project_dir: &str,
    target: &Path,
) -> Result<(), AppsodyError> {
    runner.run_captured(
        Engine::Docker,
        &[
            "create".to_string(),
            "--name".to_string(),
            container.to_string(),
            stack.to_string(),
        ],
    )?;
    let copied = runner.run_captured(
        Engine::Docker,
        &[
            "cp".to_string(),
            format!("{container}:{}/.", image_project_dir.trim_end_matches('/')),
            target.display().to_string(),
        ],
    );
    let removed = runner.run_captured(
        Engine::Docker,
        &["rm".to_string(), "-f".to_string(), container.to_string()],
    );
    copied?;
    if let Err(e) = removed {
        runner
            .log()
            .warning(&format!("Could not remove extract container {container}: {e}"));
    }
    Ok(())
}

fn extract_with_buildah(
    runner: &EngineRunner<'_>,
    stack: &str,
    container: &str,
    image_project_dir: &str,
    target: &Path,
) -> Result<(), AppsodyError> {
    runner.run_captured(
        Engine::Buildah,
        &[
            "from".to_string(),
            "--name".to_string(),
            container.to_string(),
            stack.to_string(),
        ],
    )?;
    let copied = copy_from_buildah_mount(runner, container, image_project_dir, target);
    let removed = runner.run_captured(Engine::Buildah, &["rm".to_string(), container.to_string()]);
    copied?;
    if let Err(e) = removed {
        runner
            .log()
            .warning(&format!("Could not remove extract container {container}: {e}"));
    }
    Ok(())
}

fn copy_from_buildah_mount(
    runner: &EngineRunner<'_>,
    container: &str,
    image_project_dir: &str,
    target: &Path,
) -> Result<(), AppsodyError> {
    let out = runner.run_captured(
        Engine::Buildah,
        &["mount".to_string(), container.to_string()],
    )?;
    let result = if runner.dryrun() {
        runner.log().dry_run(&format!(
            "copy <mount>{image_project_dir} {}",
            target.display()
        ));
        Ok(())
    } else {
        copy_mounted_project(&out, container, image_project_dir, target)
    };
    let unmounted = runner.run_captured(
        Engine::Buildah,
        &["umount".to_string(), container.to_string()],
    );
    result?;
    unmounted.map(|_| ())
}

fn copy_mounted_project(
    mount_output: &str,
    container: &str,
    image_project_dir: &str,
    target: &Path,
) -> Result<(), AppsodyError> {
    let mount_point = mount_output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            AppsodyError::Message(format!(
                "buildah mount {container} did not report a mount point"
            ))
        })?;
    let src = mount_point.join(image_project_dir.trim_start_matches('/'));
    if !src.is_dir() {
        return Err(AppsodyError::NotFound(format!(
            "Stack image does not contain the project directory {image_project_dir}"
        )));
    }
    copy_dir_contents(&src, target, &[])?;
    Ok(())
}
