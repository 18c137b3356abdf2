#![deny(missing_docs)]

//! Utility for running a shell command and checking how it exited.
//!
//! [`run`] passes a command string to the host shell and:
//!
//! - Captures stdout and stderr together, in the order the child wrote
//!   them
//! - Echoes the captured output, always, never, or only when the
//!   command fails
//! - Returns an error if the exit status differs from the expected one
//!
//! Output is fully buffered. Nothing is echoed until the child has
//! exited and closed its end of the pipe.

use std::io::{self, Read, Write};
use std::{fmt, process};

#[cfg(feature = "logging")]
use log::{debug, info, warn};

#[cfg(not(feature = "logging"))]
macro_rules! info {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(not(feature = "logging"))]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(not(feature = "logging"))]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Type of error.
#[derive(Debug)]
pub enum ErrorKind {
    /// The command string was empty. Nothing was run.
    EmptyCommand,

    /// `puts_output` and `puts_output_only_on_exception` were both
    /// set to true. Nothing was run.
    ConflictingOptions,

    /// The shell failed to launch.
    Launch(io::Error),

    /// Reading the child's output or waiting for it to exit failed.
    Capture(io::Error),

    /// Writing the captured output to the echo target failed. Only
    /// returned when the exit status was the expected one; otherwise
    /// the `Exit` error takes precedence.
    Echo(io::Error),

    /// The command exited with a status other than the expected one,
    /// or was killed by a signal.
    Exit {
        /// Process ID of the shell.
        pid: u32,

        /// How the shell exited.
        status: process::ExitStatus,

        /// The exit code that would have counted as success.
        expected: i32,

        /// Combined stdout and stderr of the command.
        output: String,
    },
}

/// Error returned by [`run`] and [`run_with_echo`].
#[derive(Debug)]
pub struct Error {
    /// The command that caused the error.
    pub command: String,

    /// The type of error.
    pub kind: ErrorKind,
}

impl Error {
    fn new(command: &str, kind: ErrorKind) -> Error {
        Error {
            command: command.to_string(),
            kind,
        }
    }

    /// Check if the error kind is `EmptyCommand`.
    pub fn is_empty_command_error(&self) -> bool {
        matches!(self.kind, ErrorKind::EmptyCommand)
    }

    /// Check if the error kind is `ConflictingOptions`.
    pub fn is_conflicting_options_error(&self) -> bool {
        matches!(self.kind, ErrorKind::ConflictingOptions)
    }

    /// Check if the error kind is `Launch`.
    pub fn is_launch_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Launch(_))
    }

    /// Check if the error kind is `Capture`.
    pub fn is_capture_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Capture(_))
    }

    /// Check if the error kind is `Echo`.
    pub fn is_echo_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Echo(_))
    }

    /// Check if the error kind is `Exit`.
    pub fn is_exit_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Exit { .. })
    }

    /// Captured output of a command that exited with the wrong
    /// status. `None` for every other kind of error.
    pub fn output(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Exit { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match &self.kind {
            ErrorKind::EmptyCommand => write!(f, "command must not be empty"),
            ErrorKind::ConflictingOptions => write!(
                f,
                "'puts_output' and 'puts_output_only_on_exception' \
                 options cannot both be true"
            ),
            ErrorKind::Launch(err) => {
                write!(f, "failed to launch `{}`: {}", self.command, err)
            }
            ErrorKind::Capture(err) => write!(
                f,
                "failed to capture output of `{}`: {}",
                self.command, err
            ),
            ErrorKind::Echo(err) => write!(
                f,
                "failed to echo output of `{}`: {}",
                self.command, err
            ),
            ErrorKind::Exit {
                pid,
                status,
                expected,
                ..
            } => {
                if *expected == 0 {
                    write!(f, "Command failed, pid {} {}", pid, status)?;
                } else {
                    write!(
                        f,
                        "Command succeeded but was expected to fail, \
                         pid {} {} (expected {})",
                        pid, status, expected
                    )?;
                }
                write!(f, ". Command: `{}`.", self.command)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Launch(err)
            | ErrorKind::Capture(err)
            | ErrorKind::Echo(err) => Some(err),
            _ => None,
        }
    }
}

/// Options controlling how a command is run and checked.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// Exit code that counts as success. The default is zero.
    pub expected_exit_status: i32,

    /// Whether to echo the captured output.
    ///
    /// `None` (the default) and `Some(true)` echo after the command
    /// exits. `Some(false)` suppresses the echo, unless
    /// `puts_output_only_on_exception` is also set and the command
    /// exits with the wrong status.
    pub puts_output: Option<bool>,

    /// If true, echo the output only when the exit status check
    /// fails. Only has an effect when `puts_output` is
    /// `Some(false)`; combining it with `Some(true)` is an error. The
    /// default is false.
    pub puts_output_only_on_exception: bool,

    /// If true, log the command before running it. The default is
    /// false.
    pub log_command: bool,
}

impl Options {
    /// Make a new `Options` with all fields set to the defaults.
    pub fn new() -> Options {
        Options::default()
    }

    /// Set the exit code that counts as success.
    pub fn expect_exit_status(&mut self, status: i32) -> &mut Self {
        self.expected_exit_status = status;
        self
    }

    /// Set `puts_output`.
    pub fn set_puts_output(&mut self, puts_output: bool) -> &mut Self {
        self.puts_output = Some(puts_output);
        self
    }

    /// Never echo the captured output.
    pub fn suppress_output(&mut self) -> &mut Self {
        self.set_puts_output(false)
    }

    /// Echo the captured output only if the exit status check fails.
    ///
    /// This also sets `puts_output` to `Some(false)`.
    pub fn puts_output_only_on_exception(&mut self) -> &mut Self {
        self.puts_output_only_on_exception = true;
        self.suppress_output()
    }

    /// Set `log_command` to true.
    pub fn enable_log_command(&mut self) -> &mut Self {
        self.log_command = true;
        self
    }

    fn validate(&self) -> Result<(), ErrorKind> {
        if self.puts_output == Some(true) && self.puts_output_only_on_exception
        {
            return Err(ErrorKind::ConflictingOptions);
        }
        Ok(())
    }

    fn should_echo(&self, failed: bool) -> bool {
        match self.puts_output {
            None | Some(true) => true,
            Some(false) => self.puts_output_only_on_exception && failed,
        }
    }
}

/// Output and exit status of a finished shell.
struct Outcome {
    pid: u32,
    status: process::ExitStatus,
    output: String,
}

impl Outcome {
    fn matches(&self, expected: i32) -> bool {
        self.status.code() == Some(expected)
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> process::Command {
    let mut cmd = process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> process::Command {
    use std::os::windows::process::CommandExt;

    // cmd.exe does its own parsing, so skip the argv quoting
    let mut cmd = process::Command::new("cmd");
    cmd.arg("/C").raw_arg(command);
    cmd
}

/// Spawn the shell with stdout and stderr sharing one pipe.
fn spawn_merged(
    command: &str,
) -> io::Result<(process::Child, os_pipe::PipeReader)> {
    let (reader, writer) = os_pipe::pipe()?;
    let writer_clone = writer.try_clone()?;

    let mut cmd = shell_command(command);
    cmd.stdin(process::Stdio::null())
        .stdout(writer)
        .stderr(writer_clone);
    let child = cmd.spawn()?;

    // The reader only sees EOF once every write end is closed,
    // including the ones held by `cmd`.
    drop(cmd);
    Ok((child, reader))
}

fn capture(command: &str) -> Result<Outcome, ErrorKind> {
    let (mut child, mut reader) =
        spawn_merged(command).map_err(ErrorKind::Launch)?;
    let pid = child.id();
    debug!("spawned `{}` with pid {}", command, pid);

    let mut buf = Vec::new();
    if let Err(err) = reader.read_to_end(&mut buf) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(ErrorKind::Capture(err));
    }
    drop(reader);

    let status = child.wait().map_err(ErrorKind::Capture)?;
    debug!("pid {} exited: {}", pid, status);

    Ok(Outcome {
        pid,
        status,
        output: String::from_utf8_lossy(&buf).into_owned(),
    })
}

fn echo<W: Write>(out: &mut W, output: &str) -> io::Result<()> {
    if output.is_empty() {
        return Ok(());
    }
    out.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Run `command` through the host shell and return its combined
/// stdout and stderr.
///
/// The command is passed unmodified to `sh -c` (`cmd /C` on
/// Windows). Both output streams of the shell go to the same pipe,
/// so the returned string interleaves them in the order they were
/// written. Captured output is echoed to this process's stdout
/// according to `options`.
///
/// The output is decoded as UTF-8. Invalid sequences are replaced
/// with U+FFFD rather than causing an error.
///
/// An error is returned if the command is empty, if the options
/// conflict, if the shell cannot be launched, or if the exit status
/// is not `options.expected_exit_status`. The first two are checked
/// before anything is spawned.
///
/// This blocks until the shell exits and every process holding the
/// output pipe has closed it. There is no timeout.
pub fn run(command: &str, options: &Options) -> Result<String, Error> {
    run_with_echo(command, options, &mut io::stdout())
}

/// Same as [`run`], but echoed output is written to `echo_to` instead
/// of stdout.
pub fn run_with_echo<W: Write>(
    command: &str,
    options: &Options,
    echo_to: &mut W,
) -> Result<String, Error> {
    if command.is_empty() {
        return Err(Error::new(command, ErrorKind::EmptyCommand));
    }
    options.validate().map_err(|kind| Error::new(command, kind))?;

    if options.log_command {
        info!("{}", command);
    }

    let outcome = capture(command).map_err(|kind| Error::new(command, kind))?;
    let failed = !outcome.matches(options.expected_exit_status);

    let echoed = if options.should_echo(failed) {
        echo(echo_to, &outcome.output)
    } else {
        Ok(())
    };

    if failed {
        if let Err(err) = &echoed {
            warn!("failed to echo output of `{}`: {}", command, err);
        }
        return Err(Error::new(
            command,
            ErrorKind::Exit {
                pid: outcome.pid,
                status: outcome.status,
                expected: options.expected_exit_status,
                output: outcome.output,
            },
        ));
    }
    echoed.map_err(|err| Error::new(command, ErrorKind::Echo(err)))?;
    Ok(outcome.output)
}
