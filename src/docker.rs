#![allow(clippy::module_name_repetitions)]
//! Container engine invocation: Docker and Buildah CLIs as subprocesses.

use std::path::PathBuf;

use serde_json::Value;

use crate::config::{buildah_path, container_runtime_path};
use crate::errors::{AppsodyError, CmdError};
use crate::logging::LoggingConfig;
use crate::reference::validate_reference;
use crate::util::exec::{ExecRequest, ExecService};

/// Default location of the project template inside a stack image.
pub const DEFAULT_PROJECT_DIR: &str = "/project";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Engine {
    Docker,
    Buildah,
}

impl Engine {
    /// Log prefix for lines produced by this engine.
    pub fn label(self) -> &'static str {
        match self {
            Engine::Docker => "Docker",
            Engine::Buildah => "Buildah",
        }
    }

    pub fn binary(self) -> &'static str {
        match self {
            Engine::Docker => "docker",
            Engine::Buildah => "buildah",
        }
    }

    pub fn path(self) -> Result<PathBuf, AppsodyError> {
        match self {
            Engine::Docker => container_runtime_path(),
            Engine::Buildah => buildah_path(),
        }
    }
}

/// Runs engine commands for one CLI invocation, honoring dry-run.
#[derive(Debug, Clone)]
pub struct EngineRunner<'a> {
    log: &'a LoggingConfig,
    dryrun: bool,
    exec: ExecService,
}

impl<'a> EngineRunner<'a> {
    pub fn new(log: &'a LoggingConfig, dryrun: bool) -> Self {
        Self {
            log,
            dryrun,
            exec: ExecService::default(),
        }
    }

    pub fn dryrun(&self) -> bool {
        self.dryrun
    }

    pub fn log(&self) -> &'a LoggingConfig {
        self.log
    }

    fn request(&self, engine: Engine, args: &[String]) -> Result<ExecRequest, AppsodyError> {
        // Dry runs only print the command, so a missing tool is not an error there.
        let program = if self.dryrun {
            PathBuf::from(engine.binary())
        } else {
            engine.path()?
        };
        Ok(ExecRequest::new(program).args(args.iter().cloned()))
    }

    /// Run and stream every output line through the log, tagged with the engine label.
    /// Returns the merged output. In dry-run the command is only printed.
    pub fn run_streamed(&self, engine: Engine, args: &[String]) -> Result<String, AppsodyError> {
        self.run_inner(engine, args, true)
    }

    /// Run and capture the merged output without echoing it.
    pub fn run_captured(&self, engine: Engine, args: &[String]) -> Result<String, AppsodyError> {
        self.run_inner(engine, args, false)
    }

    fn run_inner(
        &self,
        engine: Engine,
        args: &[String],
        stream: bool,
    ) -> Result<String, AppsodyError> {
        let req = self.request(engine, args)?;
        let preview = req.preview();
        if self.dryrun {
            self.log.dry_run(&preview);
            return Ok(String::new());
        }
        self.log.debug(&format!("Running command: {preview}"));
        let log = self.log;
        let out = self.exec.run_streaming(req, |_, line| {
            if stream {
                log.container(engine.label(), line);
            }
        })?;
        if out.status.success() {
            Ok(out.combined)
        } else {
            Err(AppsodyError::Command {
                program: engine.binary().to_string(),
                code: out.status.code(),
                output: out.combined,
            })
        }
    }
}

/// Run `docker image inspect <image>` and return its merged output.
///
/// The reference is validated first, so malformed names fail with Docker's own message without
/// contacting the daemon. On failure the error carries the captured output.
pub fn run_docker_inspect(log: &LoggingConfig, image: &str) -> Result<String, CmdError> {
    if let Err(e) = validate_reference(image) {
        let msg = e.to_string();
        log.error(&msg);
        return Err(CmdError::new(
            format!("{msg}\n"),
            AppsodyError::Message(msg),
        ));
    }
    let runner = EngineRunner::new(log, false);
    let args = vec!["image".to_string(), "inspect".to_string(), image.to_string()];
    match runner.run_captured(Engine::Docker, &args) {
        Ok(out) => Ok(out),
        Err(e) => {
            let output = match &e {
                AppsodyError::Command { output, .. } => output.clone(),
                other => format!("{other}\n"),
            };
            for line in output.lines() {
                log.error(line);
            }
            Err(CmdError::new(output, e))
        }
    }
}

/// Environment of a stack image as `KEY=VALUE` pairs.
pub fn inspect_env(runner: &EngineRunner<'_>, engine: Engine, image: &str) -> Result<Vec<(String, String)>, AppsodyError> {
    let args: Vec<String> = match engine {
        Engine::Docker => vec!["image".into(), "inspect".into(), image.into()],
        Engine::Buildah => vec![
            "inspect".into(),
            "--type".into(),
            "image".into(),
            image.into(),
        ],
    };
    let text = runner.run_captured(engine, &args)?;
    if runner.dryrun() {
        return Ok(Vec::new());
    }
    parse_inspect_env(&text)
}

/// Accepts `docker image inspect` output (array of objects with `Config.Env`) and
/// `buildah inspect` output (object with `OCIv1.config.Env`).
pub fn parse_inspect_env(text: &str) -> Result<Vec<(String, String)>, AppsodyError> {
    let v: Value = serde_json::from_str(text.trim())?;
    let root = match &v {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    let env = root
        .pointer("/Config/Env")
        .or_else(|| root.pointer("/OCIv1/config/Env"))
        .or_else(|| root.pointer("/config/Env"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(env
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect())
}

/// Look up `APPSODY_PROJECT_DIR`, falling back to `/project`.
pub fn stack_project_dir(env: &[(String, String)]) -> String {
    env.iter()
        .find(|(k, _)| k == "APPSODY_PROJECT_DIR")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_DIR.to_string())
}
