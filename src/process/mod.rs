//! Boundary with the operating system: spawning exiftool, talking to it over pipes.

mod child;
pub mod handler;

pub use child::ChildProcess;
pub(crate) use child::read_lines;

use crate::command::{Command, CommandResult};
use crate::error::ExifToolError;
use handler::{OutputHandler, ResultHandler};
use log::{debug, warn};
use std::io::{self, BufReader, Read};
use std::process::Stdio;
use std::thread;

/// Handle on a running child process, used by the stay-open protocol.
///
/// A handle starts `running`; it becomes `closed` after [`CommandProcess::close`],
/// after its output stream ended, or after any pipe failure. A closed handle is never
/// reopened.
pub trait CommandProcess: Send {
    /// Writes raw text to the process standard input.
    fn write(&mut self, input: &str) -> io::Result<()>;

    /// Writes each input in order, as one batch.
    fn write_lines(&mut self, inputs: &[String]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Reads output lines into `handler` until it returns `false` or the stream ends.
    ///
    /// Returns `true` when the stream ended; the handle is then closed.
    fn read(&mut self, handler: &mut dyn OutputHandler) -> io::Result<bool>;

    /// Closes the pipes and reaps the process. Closing twice is a no-op.
    fn close(&mut self) -> io::Result<()>;

    fn is_closed(&self) -> bool;

    fn is_running(&mut self) -> bool;
}

/// Launches operating system processes.
pub trait CommandExecutor: Send + Sync {
    /// Spawns `command` and keeps it alive, returning a handle on its pipes.
    fn start(&self, command: &Command) -> Result<Box<dyn CommandProcess>, ExifToolError>;

    /// Runs `command` to completion, streaming its output into `handler`.
    /// Returns the exit status.
    fn execute_with(
        &self,
        command: &Command,
        handler: &mut dyn OutputHandler,
    ) -> Result<i32, ExifToolError>;

    /// Runs `command` to completion and collects its output.
    fn execute(&self, command: &Command) -> Result<CommandResult, ExifToolError> {
        let mut handler = ResultHandler::default();
        let exit_status = self.execute_with(command, &mut handler)?;
        Ok(CommandResult::new(exit_status, handler.output()))
    }
}

/// [`CommandExecutor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCommandExecutor;

impl DefaultCommandExecutor {
    pub fn new() -> Self {
        Self
    }

    fn spawn(&self, command: &Command) -> Result<std::process::Child, ExifToolError> {
        debug!("Starting process: {}", command);
        std::process::Command::new(command.executable())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExifToolError::ProcessStart {
                command: command.to_string(),
                source,
            })
    }
}

impl CommandExecutor for DefaultCommandExecutor {
    fn start(&self, command: &Command) -> Result<Box<dyn CommandProcess>, ExifToolError> {
        let child = self.spawn(command)?;
        let process = ChildProcess::new(child).map_err(|source| ExifToolError::ProcessStart {
            command: command.to_string(),
            source,
        })?;
        Ok(Box::new(process))
    }

    fn execute_with(
        &self,
        command: &Command,
        handler: &mut dyn OutputHandler,
    ) -> Result<i32, ExifToolError> {
        let mut child = self.spawn(command)?;
        // One-shot commands get no input at all.
        drop(child.stdin.take());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;
        // Collected concurrently: a child filling the stderr pipe would never close stdout.
        let stderr = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut output = String::new();
                stderr.read_to_string(&mut output).ok();
                output
            })
        });

        let mut reader = BufReader::new(stdout);
        let read = read_lines(&mut reader, handler);
        // A child still writing after the handler stopped gets EPIPE instead of blocking.
        drop(reader);

        let status = child.wait()?;
        let stderr_output = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        read?;

        for line in stderr_output.lines() {
            warn!("{}: {}", command.executable(), line);
        }

        let exit_status = status.code().unwrap_or(-1);
        debug!("Command '{}' exited with {}", command, exit_status);
        Ok(exit_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuilder;
    use assert_matches::assert_matches;

    #[test]
    fn test_start_missing_executable() -> Result<(), ExifToolError> {
        let cmd = CommandBuilder::new("nonexistent_exiftool_command")?
            .arg("-ver")?
            .build();
        let result = DefaultCommandExecutor::new().start(&cmd).map(|_| ());
        assert_matches!(
            result,
            Err(ExifToolError::ProcessStart { command, .. }) if command == "nonexistent_exiftool_command -ver"
        );
        Ok(())
    }

    #[test]
    fn test_execute_missing_executable() -> Result<(), ExifToolError> {
        let cmd = CommandBuilder::new("nonexistent_exiftool_command")?.build();
        let result = DefaultCommandExecutor::new().execute(&cmd);
        assert_matches!(result, Err(ExifToolError::ProcessStart { .. }));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_collects_output() -> Result<(), ExifToolError> {
        let cmd = CommandBuilder::new("sh")?
            .args(["-c", "echo first; echo last; exit 3"])?
            .build();
        let result = DefaultCommandExecutor::new().execute(&cmd)?;
        assert_eq!(result.exit_status(), 3);
        assert_eq!(result.output(), "first\nlast");
        assert!(result.is_failure());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_with_large_stderr() -> Result<(), ExifToolError> {
        // Well over a pipe buffer of stderr before anything reaches stdout.
        let cmd = CommandBuilder::new("sh")?
            .args(["-c", "head -c 200000 /dev/zero | tr '\\0' x >&2; echo done"])?
            .build();
        let result = DefaultCommandExecutor::new().execute(&cmd)?;
        assert!(result.is_success());
        assert_eq!(result.output(), "done");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_started_process_round_trip() -> Result<(), ExifToolError> {
        let cmd = CommandBuilder::new("cat")?.build();
        let mut process = DefaultCommandExecutor::new().start(&cmd)?;
        assert!(process.is_running());
        assert!(!process.is_closed());

        process.write_lines(&["hello\n".to_string(), "{ready}\n".to_string()])?;
        process.flush()?;

        let mut handler = handler::CollectHandler::new();
        assert!(!process.read(&mut handler)?);
        assert_eq!(handler.lines(), ["hello"]);

        process.close()?;
        assert!(process.is_closed());
        assert!(!process.is_running());
        // Closing twice is fine.
        process.close()?;
        assert_matches!(process.write("late\n"), Err(e) if e.kind() == io::ErrorKind::BrokenPipe);
        Ok(())
    }
}
