use crate::error::ExifToolError;
use std::fmt;

/// A command line: the executable followed by its arguments.
///
/// Commands are immutable once built, use [`CommandBuilder`] to create one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    cmd: Vec<String>,
}

impl Command {
    /// Executable followed by all arguments.
    pub fn arguments(&self) -> &[String] {
        &self.cmd
    }

    pub fn executable(&self) -> &str {
        // A command always contains at least its executable.
        &self.cmd[0]
    }

    pub fn args(&self) -> &[String] {
        &self.cmd[1..]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cmd.join(" "))
    }
}

#[derive(Debug)]
pub struct CommandBuilder {
    executable: String,
    arguments: Vec<String>,
}

impl CommandBuilder {
    /// Starts a new command line. Fails if `executable` is blank.
    pub fn new(executable: impl Into<String>) -> Result<Self, ExifToolError> {
        Self::with_capacity(executable, 10)
    }

    pub fn with_capacity(
        executable: impl Into<String>,
        nb_args: usize,
    ) -> Result<Self, ExifToolError> {
        let executable = executable.into();
        if executable.trim().is_empty() {
            return Err(ExifToolError::Validation(
                "Command line executable should be defined".to_string(),
            ));
        }

        Ok(Self {
            executable,
            arguments: Vec::with_capacity(nb_args),
        })
    }

    /// Appends one argument. Blank arguments are rejected.
    pub fn arg(mut self, arg: impl Into<String>) -> Result<Self, ExifToolError> {
        let arg = arg.into();
        if arg.trim().is_empty() {
            return Err(ExifToolError::Validation(
                "Command line argument should be defined if set".to_string(),
            ));
        }
        self.arguments.push(arg);
        Ok(self)
    }

    /// Appends every argument of `args`, which must not be empty.
    pub fn args<I, S>(self, args: I) -> Result<Self, ExifToolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().peekable();
        if args.peek().is_none() {
            return Err(ExifToolError::Validation(
                "Arguments should not be empty".to_string(),
            ));
        }
        args.try_fold(self, |builder, arg| builder.arg(arg))
    }

    pub fn build(self) -> Command {
        let mut cmd = Vec::with_capacity(self.arguments.len() + 1);
        cmd.push(self.executable);
        cmd.extend(self.arguments);
        Command { cmd }
    }
}

/// Outcome of a one-shot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    exit_status: i32,
    output: String,
}

impl CommandResult {
    pub fn new(exit_status: i32, output: impl Into<String>) -> Self {
        Self {
            exit_status,
            output: output.into(),
        }
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.exit_status, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_build_command() -> Result<(), ExifToolError> {
        let cmd = CommandBuilder::new("exiftool")?
            .arg("-ver")?
            .args(["-S", "-n"])?
            .build();

        assert_eq!(cmd.arguments(), ["exiftool", "-ver", "-S", "-n"]);
        assert_eq!(cmd.executable(), "exiftool");
        assert_eq!(cmd.args(), ["-ver", "-S", "-n"]);
        assert_eq!(cmd.to_string(), "exiftool -ver -S -n");
        Ok(())
    }

    #[test]
    fn test_command_without_arguments() -> Result<(), ExifToolError> {
        let cmd = CommandBuilder::new("exiftool")?.build();
        assert_eq!(cmd.arguments(), ["exiftool"]);
        assert!(cmd.args().is_empty());
        Ok(())
    }

    #[test]
    fn test_equality() -> Result<(), ExifToolError> {
        let a = CommandBuilder::new("exiftool")?.arg("-ver")?.build();
        let b = CommandBuilder::new("exiftool")?.arg("-ver")?.build();
        let c = CommandBuilder::new("exiftool")?.arg("-S")?.build();
        assert_eq!(a, b);
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn test_reject_blank_values() -> Result<(), ExifToolError> {
        assert_matches!(CommandBuilder::new(""), Err(ExifToolError::Validation(_)));
        assert_matches!(CommandBuilder::new("  "), Err(ExifToolError::Validation(_)));
        assert_matches!(
            CommandBuilder::new("exiftool")?.arg(" "),
            Err(ExifToolError::Validation(_))
        );
        assert_matches!(
            CommandBuilder::new("exiftool")?.args(Vec::<String>::new()),
            Err(ExifToolError::Validation(_))
        );
        assert_matches!(
            CommandBuilder::new("exiftool")?.args(["-S", ""]),
            Err(ExifToolError::Validation(_))
        );
        Ok(())
    }

    #[test]
    fn test_command_result() {
        let ok = CommandResult::new(0, "12.40");
        assert!(ok.is_success());
        assert!(!ok.is_failure());
        assert_eq!(ok.output(), "12.40");
        assert_eq!(ok.to_string(), "[0] 12.40");

        let ko = CommandResult::new(1, "boom");
        assert!(ko.is_failure());
        assert_eq!(ko.exit_status(), 1);
    }
}
