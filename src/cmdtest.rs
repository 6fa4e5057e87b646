/*!
Test harness for driving the CLI end to end.

- `Sandbox`: a private temporary project directory, optionally seeded from a template under
  `tests/testdata`, with its own appsody config file. Removed on drop, including when the test
  panics.
- `run_appsody`: run the CLI in-process against a sandbox; all output (stdout and stderr
  channels) is merged into one returned string.
- `run_binary`: run the compiled binary as a subprocess with the sandbox project as cwd.
- `check_outcome`/`assert_contains`: substring assertions over captured output.

Every invocation returns `Result<String, CmdError>`; the error always carries the captured
output so failure paths can be asserted on as well.
*/

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::TempDir;

use crate::commands::run_cli;
use crate::config::{GlobalConfig, CONFIG_FILE_NAME};
use crate::errors::{AppsodyError, CmdError};
use crate::logging::{LoggingConfig, SharedBuffer};
use crate::util::exec::{ExecRequest, ExecService};
use crate::util::fs::copy_dir_contents;

/// Directory holding sandbox templates: `APPSODY_TESTDATA`, else `<crate>/tests/testdata`.
pub fn testdata_dir() -> PathBuf {
    match std::env::var("APPSODY_TESTDATA") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
        _ => Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("testdata"),
    }
}

#[derive(Debug)]
pub struct Sandbox {
    root: Option<TempDir>,
    /// Root of the temporary directory.
    pub test_data_path: PathBuf,
    /// Working project for invocations; the root, or `<root>/<template>` when seeded.
    pub project_dir: PathBuf,
    /// Private config file, so each sandbox has its own appsody home.
    pub config_file: PathBuf,
}

impl Sandbox {
    /// Empty sandbox.
    pub fn new() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("appsody-sandbox-")
            .tempdir()
            .context("failed to create sandbox directory")?;
        let path = root.path().to_path_buf();
        let config_dir = path.join("config");
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed to create {}", config_dir.display()))?;
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        let cfg = GlobalConfig {
            home: config_dir.display().to_string(),
            ..GlobalConfig::default()
        };
        let text = serde_yaml::to_string(&cfg).context("failed to render sandbox config")?;
        std::fs::write(&config_file, text)
            .with_context(|| format!("failed to write {}", config_file.display()))?;
        Ok(Self {
            root: Some(root),
            test_data_path: path.clone(),
            project_dir: path,
            config_file,
        })
    }

    /// Sandbox seeded with a recursive copy of `<testdata>/<template>`, landing at
    /// `<root>/<template>`, which becomes the project directory.
    pub fn with_template(template: &str) -> Result<Self> {
        let src = testdata_dir().join(template);
        if !src.is_dir() {
            bail!("sandbox template not found: {}", src.display());
        }
        let mut sandbox = Self::new()?;
        let dst = sandbox.test_data_path.join(template);
        copy_dir_contents(&src, &dst, &[])
            .with_context(|| format!("failed to copy template {} into sandbox", src.display()))?;
        sandbox.project_dir = dst;
        Ok(sandbox)
    }

    pub fn path(&self) -> &Path {
        &self.test_data_path
    }

    /// Remove the sandbox now, reporting failures. Dropping does the same, best effort.
    pub fn cleanup(mut self) -> Result<()> {
        match self.root.take() {
            Some(root) => root
                .close()
                .with_context(|| format!("failed to remove sandbox {}", self.test_data_path.display())),
            None => Ok(()),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            if let Err(e) = root.close() {
                tracing::warn!(path = %self.test_data_path.display(), error = %e, "sandbox cleanup failed");
            }
        }
    }
}

/// `create(seedTemplate?)`: empty sandbox or one seeded from a template.
pub fn setup_sandbox(template: Option<&str>) -> Result<Sandbox> {
    match template {
        Some(t) => Sandbox::with_template(t),
        None => Sandbox::new(),
    }
}

/// Writes every byte to two writers.
struct Tee<A, B>(A, B);

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.write_all(data)?;
        self.1.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

fn sandbox_args(sandbox: &Sandbox, args: &[&str]) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec![
        OsString::from("--config"),
        sandbox.config_file.clone().into_os_string(),
    ];
    argv.extend(args.iter().map(OsString::from));
    argv
}

/// Run the CLI in-process against the sandbox and return its merged output.
pub fn run_appsody(sandbox: &Sandbox, args: &[&str]) -> Result<String, CmdError> {
    run_appsody_with_sink(sandbox, args, io::sink())
}

/// Like `run_appsody`, additionally streaming every log line into `sink` (both channels).
pub fn run_appsody_with_sink<W>(sandbox: &Sandbox, args: &[&str], sink: W) -> Result<String, CmdError>
where
    W: Write + Send + 'static,
{
    let buf = SharedBuffer::new();
    let shared_sink = std::sync::Arc::new(std::sync::Mutex::new(sink));
    let log = LoggingConfig::with_writers(
        Tee(buf.clone(), SinkHandle(shared_sink.clone())),
        Tee(buf.clone(), SinkHandle(shared_sink)),
    );
    let mut argv = vec![OsString::from("appsody")];
    argv.extend(sandbox_args(sandbox, args));
    let result = run_cli(argv, &log, Some(sandbox.project_dir.clone()));
    let output = buf.contents();
    match result {
        Ok(()) => Ok(output),
        Err(e) => {
            // main() reports errors the same way
            log.error(&e.to_string());
            Err(CmdError::new(buf.contents(), e))
        }
    }
}

struct SinkHandle<W>(std::sync::Arc<std::sync::Mutex<W>>);

impl<W: Write> Write for SinkHandle<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut w = self.0.lock().unwrap_or_else(|p| p.into_inner());
        w.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut w = self.0.lock().unwrap_or_else(|p| p.into_inner());
        w.flush()
    }
}

/// Run the compiled binary against the sandbox as a subprocess (cwd = project dir), merging
/// stdout and stderr. `envs` are added to the inherited environment.
pub fn run_binary(
    bin: &Path,
    sandbox: &Sandbox,
    args: &[&str],
    envs: &[(&str, &str)],
) -> Result<String, CmdError> {
    let mut req = ExecRequest::new(bin)
        .args(sandbox_args(sandbox, args))
        .cwd(&sandbox.project_dir)
        .env("NO_COLOR", "1");
    for (k, v) in envs {
        req = req.env(*k, *v);
    }
    let out = ExecService::default()
        .run(req)
        .map_err(|e| CmdError::new(String::new(), AppsodyError::from(e)))?;
    if out.status.success() {
        Ok(out.combined)
    } else {
        Err(CmdError::new(
            out.combined.clone(),
            AppsodyError::Command {
                program: bin.display().to_string(),
                code: out.status.code(),
                output: out.combined,
            },
        ))
    }
}

/// Judge one invocation: an expected error must have happened, an unexpected one must not,
/// and the captured text must contain `expected`. Returns a description of the failure.
pub fn check_outcome(
    result: &Result<String, CmdError>,
    expect_error: bool,
    expected: &str,
) -> std::result::Result<(), String> {
    match (result, expect_error) {
        (Ok(_), true) => Err(format!(
            "expected an error but the command succeeded (wanted output containing '{expected}')"
        )),
        (Err(e), false) => Err(format!(
            "command failed unexpectedly: {e}\noutput:\n{}",
            e.output()
        )),
        (Ok(out), false) => contains_or_describe(out, expected),
        (Err(e), true) => contains_or_describe(e.output(), expected),
    }
}

fn contains_or_describe(out: &str, expected: &str) -> std::result::Result<(), String> {
    if out.contains(expected) {
        Ok(())
    } else {
        Err(format!(
            "expected the output to contain '{expected}'. It actually contains:\n{out}"
        ))
    }
}

#[track_caller]
pub fn assert_contains(output: &str, expected: &str) {
    assert!(
        output.contains(expected),
        "expected the output to contain '{}'. It actually contains:\n{}",
        expected,
        output
    );
}
