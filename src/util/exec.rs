use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

/// Structured command execution with an optional timeout; output is always captured.
#[derive(Debug, Clone)]
pub struct ExecService {
    default_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl ExecService {
    /// A zero timeout waits for the child indefinitely.
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput> {
        self.run_streaming(request, |_, _| {})
    }

    /// Run with stdout and stderr piped; every line is handed to `on_line` as it arrives and
    /// collected into `combined` in arrival order. Both pipes are drained on their own threads.
    pub fn run_streaming<F>(&self, request: ExecRequest, mut on_line: F) -> Result<ExecOutput>
    where
        F: FnMut(Stream, &str),
    {
        let mut cmd = request.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(program = ?request.program, args = ?request.args, cwd = ?request.cwd, "spawn");
        let started = Instant::now();
        let mut child = cmd.spawn().with_context(|| spawn_context(&request))?;

        let (tx, rx) = mpsc::channel::<(Stream, String)>();
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, Stream::Stdout, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let timeout = self.default_timeout;
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut combined = String::new();
        loop {
            let next = if timeout.is_zero() {
                rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected)
            } else {
                rx.recv_timeout(Duration::from_millis(200))
            };
            match next {
                Ok((stream, line)) => {
                    on_line(stream, &line);
                    let target = match stream {
                        Stream::Stdout => &mut stdout,
                        Stream::Stderr => &mut stderr,
                    };
                    target.push_str(&line);
                    target.push('\n');
                    combined.push_str(&line);
                    combined.push('\n');
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
            if !timeout.is_zero() && started.elapsed() > timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(
                    "command {:?} timed out after {:?}",
                    request.program,
                    timeout
                ));
            }
        }
        for r in readers {
            let _ = r.join();
        }

        let remaining = if timeout.is_zero() {
            Duration::ZERO
        } else {
            timeout.saturating_sub(started.elapsed()).max(Duration::from_millis(1))
        };
        let status = wait_child(&mut child, remaining, &request.program)?;

        Ok(ExecOutput {
            status,
            stdout,
            stderr,
            combined,
        })
    }
}

impl Default for ExecService {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

fn spawn_context(request: &ExecRequest) -> String {
    format!(
        "failed to spawn {:?} with args {:?}",
        request.program, request.args
    )
}

fn wait_child(
    child: &mut std::process::Child,
    timeout: Duration,
    program: &OsString,
) -> Result<ExitStatus> {
    if timeout.is_zero() {
        return child.wait().context("failed to wait for process");
    }
    match child
        .wait_timeout(timeout)
        .context("failed to wait with timeout")?
    {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(anyhow!("command {:?} timed out after {:?}", program, timeout))
        }
    }
}

fn spawn_reader<R>(
    stream: R,
    kind: Stream,
    tx: mpsc::Sender<(Stream, String)>,
) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || forward_lines(BufReader::new(stream), kind, &tx))
}

/// Send every line of `reader` to `tx` until EOF, a read error, or the receiver goes away.
fn forward_lines<R: BufRead>(mut reader: R, kind: Stream, tx: &mpsc::Sender<(Stream, String)>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send((kind, line)).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(stream = ?kind, error = %e, "reading child output failed; output may be truncated");
                break;
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Added on top of the inherited environment.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-escaped command line for dry-run and debug output.
    pub fn preview(&self) -> String {
        let mut words = vec![self.program.to_string_lossy().into_owned()];
        words.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        super::shell_join(&words)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// stdout and stderr lines interleaved in arrival order.
    pub combined: String,
}
