//! Child process creation.
//!
//! The launcher spawns through [`ProcessFactory`] so tests can observe the
//! argument list without starting a JVM.

use std::io;
use std::process::{Child, Command, Stdio};

/// Where the child's standard streams go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Share the parent's stdin, stdout and stderr.
    Inherit,
    /// Discard the child's output.
    #[default]
    Discard,
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, absent when the child was killed by a signal.
    pub code: Option<i32>,
}

/// A spawned child the launcher keeps a reference to.
pub trait ChildProcess {
    /// Operating system process identifier.
    fn id(&self) -> u32;

    /// Returns the exit state without blocking, or `None` while running.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the status cannot be queried.
    fn try_wait(&mut self) -> io::Result<Option<ChildExit>>;
}

/// Creates child processes from an argument list whose first element is the
/// executable.
pub trait ProcessFactory {
    /// Spawns the process.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the process cannot be created.
    fn spawn(&self, arguments: &[String], output: OutputMode) -> io::Result<Box<dyn ChildProcess>>;
}

/// Spawns real processes with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessFactory;

impl ProcessFactory for SystemProcessFactory {
    fn spawn(&self, arguments: &[String], output: OutputMode) -> io::Result<Box<dyn ChildProcess>> {
        let Some((program, rest)) = arguments.split_first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "launch arguments are empty",
            ));
        };
        let mut command = Command::new(program);
        command.args(rest);
        match output {
            OutputMode::Inherit => {
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Discard => {
                command
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
        }
        let child = command.spawn()?;
        Ok(Box::new(SystemChild(child)))
    }
}

struct SystemChild(Child);

impl ChildProcess for SystemChild {
    fn id(&self) -> u32 {
        self.0.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self
            .0
            .try_wait()?
            .map(|status| ChildExit { code: status.code() }))
    }
}
