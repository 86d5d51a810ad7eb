use std::{
    ffi::OsStr,
    fmt,
    io::{self, Write},
    num::NonZeroI32,
    path::Path,
    process,
};

use log::debug;

pub struct Command(process::Command);

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self(process::Command::new(program))
    }

    pub fn args<'a, I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        self.0.args(args);
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    pub fn program(&self) -> &OsStr {
        self.0.get_program()
    }

    fn error(self, kind: impl Into<ErrorKind>) -> Error {
        Error {
            command: self,
            kind: kind.into(),
        }
    }

    pub fn try_status(mut self) -> Result<ExitStatus, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("running `{command:?}`...", command = &self.0);
        }

        match self.0.status() {
            Ok(status) => Ok(ExitStatus {
                command: self,
                status,
            }),
            Err(error) => Err(self.error(error)),
        }
    }

    /// Runs the command with inherited stdio and requires it to succeed.
    pub fn status(self) -> Result<(), Error> {
        self.try_status().and_then(ExitStatus::require_success)
    }

    pub fn try_output(mut self) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        match self.0.output() {
            Ok(output) => Ok(Output {
                command: self,
                output,
            }),
            Err(error) => Err(self.error(error)),
        }
    }

    /// Runs the command while capturing stdout and stderr and requires it to succeed.
    pub fn output(self) -> Result<Output, Error> {
        self.try_output().and_then(Output::require_success)
    }

    /// Runs the command with `input` written to its stdin while stdout and stderr are inherited,
    /// and requires it to succeed.
    pub fn status_with_input(mut self, input: Vec<u8>) -> Result<(), Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("running `{command:?}` with piped stdin...", command = &self.0);
        }

        self.0.stdin(process::Stdio::piped());
        let mut child = match self.0.spawn() {
            Ok(child) => child,
            Err(error) => return Err(self.error(error)),
        };

        // Dropping stdin after the write closes the pipe so the child sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&input),
            None => Ok(()),
        };

        let status = match child.wait() {
            Ok(status) => status,
            Err(error) => return Err(self.error(error)),
        };
        if let Err(error) = written {
            // A child that exits before reading its input is judged by its exit status alone.
            if error.kind() != io::ErrorKind::BrokenPipe {
                return Err(self.error(error));
            }
        }

        ExitStatus {
            command: self,
            status,
        }
        .require_success()
    }
}

/// Runs `source` to completion and feeds everything it wrote to stdout into `sink`, like
/// `source | sink` in a shell. The stdout of `source` is held in memory, which is fine for the
/// short outputs (tokens, passwords) this is used for.
pub fn pipe(source: Command, sink: Command) -> Result<(), Error> {
    let output = source.output()?;
    sink.status_with_input(output.output.stdout)
}

#[derive(Debug)]
pub struct ExitStatus {
    command: Command,
    status: process::ExitStatus,
}

impl ExitStatus {
    pub fn require_success(self) -> Result<(), Error> {
        let ExitStatus { command, status } = self;
        if status.success() {
            Ok(())
        } else {
            Err(command.error(ErrorKind::NonZeroExitStatus(
                status.code().and_then(NonZeroI32::new),
            )))
        }
    }
}

#[derive(Debug)]
pub struct Output {
    pub command: Command,
    pub output: process::Output,
}

impl Output {
    pub fn require_success(self) -> Result<Output, Error> {
        let Output { command, output } = self;
        if output.status.success() {
            Ok(Output { command, output })
        } else {
            Err(command.error(ErrorKind::NonZeroExitStatus(
                output.status.code().and_then(NonZeroI32::new),
            )))
        }
    }

    /// Returns stdout with surrounding whitespace removed. Invalid UTF-8 is replaced.
    pub fn stdout_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).trim().to_owned()
    }
}

impl std::ops::Deref for Output {
    type Target = process::Output;

    fn deref(&self) -> &Self::Target {
        &self.output
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Io(io::Error),
    NonZeroExitStatus(Option<NonZeroI32>),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to run `{command:?}`: ",
            command = &self.command.0
        )?;
        match &self.kind {
            ErrorKind::NotFound => {
                let program = self.command.program().to_string_lossy();
                write!(f, "the `{program}` command is required but not available on your system, please install it")
            }
            ErrorKind::PermissionDenied => {
                let program = self.command.program().to_string_lossy();
                write!(f, "the `{program}` command is available but does not have the right permissions, please make sure the binary is executable")
            }
            ErrorKind::Io(error) => write!(f, "{error}"),
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")
                } else {
                    write!(f, "did not run successfully")
                }
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// Creates a new [`Command`] and supplies the provided arguments, if any, while calling
/// [`std::convert::AsRef::as_ref`] on each.
macro_rules! command {
    ($program:expr $(,)?) => {
        $crate::process::Command::new($program)
    };
    ($program:expr, $($arg:expr),* $(,)?) => {
        $crate::process::args!($crate::process::Command::new($program), $($arg,)*)
    };
}

/// Calls [`Command::args`] on the provided [`Command`] while calling [`std::convert::AsRef::as_ref`]
/// on each argument.
macro_rules! args {
    ($program:expr, $($arg:expr),+ $(,)?) => {
        $program.args([
            $(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$arg),)*
        ])
    }
}

pub(crate) use args;
pub(crate) use command;
