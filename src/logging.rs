//! Logging sinks for CLI output.
//!
//! Every user-facing line goes through a `LoggingConfig`, which owns two writers: one for
//! regular output and one for errors. The binary wires them to stdout/stderr; the test
//! harness injects an in-memory `SharedBuffer` (usually the same one twice) so output can be
//! asserted on without touching process-wide streams.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::color::{self, paint};

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

fn lock_sink(sink: &Sink) -> MutexGuard<'_, Box<dyn Write + Send>> {
    sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Prefix used for dry-run command echoes.
pub const DRY_RUN_PREFIX: &str = "Dry Run - Skipping command: ";

#[derive(Clone)]
pub struct LoggingConfig {
    out: Sink,
    err: Sink,
    verbose: bool,
    stdio: bool,
    color_out: bool,
    color_err: bool,
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("verbose", &self.verbose)
            .field("color_out", &self.color_out)
            .field("color_err", &self.color_err)
            .finish_non_exhaustive()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::stdio()
    }
}

impl LoggingConfig {
    /// Log to the process stdout/stderr, colored according to the color policy.
    pub fn stdio() -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(io::stdout()))),
            err: Arc::new(Mutex::new(Box::new(io::stderr()))),
            verbose: false,
            stdio: true,
            color_out: color::color_enabled_stdout(),
            color_err: color::color_enabled_stderr(),
        }
    }

    /// Build a config that logs to the given writers (never colored).
    pub fn with_writers<O, E>(out: O, err: E) -> Self
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        let mut cfg = Self::stdio();
        cfg.init_logging(out, err);
        cfg
    }

    /// Route standard and error output to the given writers. Verbosity is kept.
    pub fn init_logging<O, E>(&mut self, out: O, err: E)
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        self.out = Arc::new(Mutex::new(Box::new(out)));
        self.err = Arc::new(Mutex::new(Box::new(err)));
        self.stdio = false;
        self.color_out = false;
        self.color_err = false;
    }

    /// Re-evaluate the color policy (after `--color` was applied). No-op for injected writers.
    pub fn refresh_color(&mut self) {
        if self.stdio {
            self.color_out = color::color_enabled_stdout();
            self.color_err = color::color_enabled_stderr();
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn write_out(&self, line: &str) {
        let mut w = lock_sink(&self.out);
        let _ = writeln!(w, "{line}");
        let _ = w.flush();
    }

    fn write_err(&self, line: &str) {
        let mut w = lock_sink(&self.err);
        let _ = writeln!(w, "{line}");
        let _ = w.flush();
    }

    pub fn info(&self, msg: &str) {
        self.write_out(msg);
    }

    pub fn warning(&self, msg: &str) {
        self.write_out(&paint(self.color_out, color::WARN, &format!("[Warning] {msg}")));
    }

    pub fn error(&self, msg: &str) {
        self.write_err(&paint(self.color_err, color::ERROR, &format!("[Error] {msg}")));
    }

    /// Only emitted with `--verbose`.
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            self.write_out(&paint(self.color_out, color::DEBUG, &format!("[Debug] {msg}")));
        }
    }

    /// A line produced by a container engine, tagged with the engine name (`[Buildah] ...`).
    /// Never colored: the tagged text is matched verbatim by scripts.
    pub fn container(&self, engine: &str, line: &str) {
        self.write_out(&format!("[{engine}] {line}"));
    }

    pub fn dry_run(&self, command_line: &str) {
        self.write_out(&paint(
            self.color_out,
            color::INFO,
            &format!("{DRY_RUN_PREFIX}{command_line}"),
        ));
    }
}

/// Cloneable in-memory writer; all clones share one buffer.
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install the `tracing` fmt subscriber on stderr, filtered by `APPSODY_LOG` (default: off).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("APPSODY_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
