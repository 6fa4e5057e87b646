//! Error mapping guide:
//! - Map NotFound (missing tool, missing file) to exit code 127; usage errors to 2; command
//!   failures keep their own exit code when it fits in 1..=255; everything else exits with 1.
//! - User-visible strings come from Display; keep them stable (tests match on them).
use std::fmt;
use std::io;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum AppsodyError {
    Io(io::Error),
    /// A required tool or file is missing.
    NotFound(String),
    /// Invalid or missing configuration (global config or project config).
    Config(String),
    /// An external command ran and exited non-zero.
    Command {
        program: String,
        code: Option<i32>,
        output: String,
    },
    /// Bad command line (rendered clap error).
    Usage(String),
    Message(String),
}

impl fmt::Display for AppsodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppsodyError::Io(e) => write!(f, "{e}"),
            AppsodyError::NotFound(s)
            | AppsodyError::Config(s)
            | AppsodyError::Usage(s)
            | AppsodyError::Message(s) => f.write_str(s),
            AppsodyError::Command { program, code, .. } => match code {
                Some(c) => write!(f, "{program} command failed with exit code {c}"),
                None => write!(f, "{program} command was terminated by a signal"),
            },
        }
    }
}

impl std::error::Error for AppsodyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppsodyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for AppsodyError {
    fn from(e: io::Error) -> Self {
        AppsodyError::Io(e)
    }
}

impl From<serde_yaml::Error> for AppsodyError {
    fn from(e: serde_yaml::Error) -> Self {
        AppsodyError::Config(format!("could not parse configuration: {e}"))
    }
}

impl From<serde_json::Error> for AppsodyError {
    fn from(e: serde_json::Error) -> Self {
        AppsodyError::Message(format!("could not parse inspect output: {e}"))
    }
}

impl From<anyhow::Error> for AppsodyError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<AppsodyError>() {
            Ok(inner) => inner,
            Err(e) => {
                let not_found = e.chain().any(|c| {
                    c.downcast_ref::<io::Error>()
                        .map(|ioe| ioe.kind() == io::ErrorKind::NotFound)
                        .unwrap_or(false)
                });
                if not_found {
                    AppsodyError::NotFound(format!("{e:#}"))
                } else {
                    AppsodyError::Message(format!("{e:#}"))
                }
            }
        }
    }
}

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Convert AppsodyError to a process exit code (parity with io::Error mapping).
pub fn exit_code_for_error(e: &AppsodyError) -> u8 {
    match e {
        AppsodyError::Io(ioe) => exit_code_for_io_error(ioe),
        AppsodyError::NotFound(_) => 127,
        AppsodyError::Usage(_) => 2,
        AppsodyError::Command { code: Some(c), .. } if (1..=255).contains(c) => *c as u8,
        _ => 1,
    }
}

/// Failure of a harness invocation: the error plus everything the command printed.
#[derive(Debug)]
pub struct CmdError {
    output: String,
    source: AppsodyError,
}

impl CmdError {
    pub fn new(output: impl Into<String>, source: AppsodyError) -> Self {
        Self {
            output: output.into(),
            source,
        }
    }

    /// Merged stdout/stderr captured up to the failure.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error(&self) -> &AppsodyError {
        &self.source
    }

    pub fn exit_code(&self) -> u8 {
        exit_code_for_error(&self.source)
    }

    pub fn into_error(self) -> AppsodyError {
        self.source
    }
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CmdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
