//! External command execution.
//!
//! A builder for running tool binaries with captured output. Stdin, when
//! given, is written from a separate thread so a tool that fills its stdout
//! pipe before draining stdin cannot deadlock the build.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::from_slice(&["sass", "--stdin"])
//!     .cwd(root)
//!     .stdin(scss.as_bytes())
//!     .output()?;
//! ```

use regex::Regex;
use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    sync::LazyLock,
    thread,
};

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    stdin_data: Option<Vec<u8>>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["sass"]` or `["npx", "babel"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        Self::new(program).args(iter)
    }

    /// Add a single argument. An empty argument is passed through as `""`.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter().fold(self, Cmd::arg)
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set stdin data to pipe to the process.
    pub fn stdin<D: Into<Vec<u8>>>(mut self, data: D) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    /// The program name for messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Resolve the program against `PATH` (or the working directory for
    /// relative paths containing a separator).
    pub fn resolve_program(&self) -> io::Result<PathBuf> {
        let program = Path::new(&self.program);
        let found = match &self.cwd {
            Some(dir) => which::which_in(program, std::env::var_os("PATH"), dir),
            None => which::which(program),
        };
        found.map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))
    }

    /// Run to completion and capture stdout and stderr.
    ///
    /// A non-zero exit is not an error here; callers inspect `status`.
    pub fn output(self) -> io::Result<Output> {
        let program = self.resolve_program()?;
        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;

        let writer = match (child.stdin.take(), self.stdin_data) {
            (Some(mut stdin), Some(data)) => Some(thread::spawn(move || {
                // A tool may exit without reading all of stdin.
                match stdin.write_all(&data) {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })),
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            handle
                .join()
                .map_err(|_| io::Error::other("stdin writer thread panicked"))??;
        }
        Ok(output)
    }
}

// ============================================================================
// Helpers
// ============================================================================

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("static regex is valid")
});

/// Strip ANSI escape codes from string.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    ANSI_RE.replace_all(s, "")
}

/// Format error message for a failed command.
///
/// Stdout is appended when it carries text; tools often report errors there.
pub fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = strip_ansi(stderr.trim());
    let stdout = strip_ansi(stdout.trim());

    let mut msg = format!("`{name}` failed with {}", output.status);
    if !stderr.is_empty() {
        msg.push('\n');
        msg.push_str(&stderr);
    }
    if !stdout.is_empty() && !stdout.starts_with('{') {
        msg.push_str("\nStdout:\n");
        msg.push_str(&stdout);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================
