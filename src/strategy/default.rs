use crate::command::CommandBuilder;
use crate::error::ExifToolError;
use crate::process::handler::OutputHandler;
use crate::process::CommandExecutor;
use crate::strategy::validate;
use crate::version::Version;
use log::debug;

/// Starts a new exiftool process for every command and waits for it to exit.
///
/// Nothing outlives a command, so the lifecycle operations have nothing to do.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStrategy;

impl DefaultStrategy {
    pub fn execute(
        &self,
        executor: &dyn CommandExecutor,
        exiftool: &str,
        args: &[String],
        handler: &mut dyn OutputHandler,
    ) -> Result<(), ExifToolError> {
        validate(exiftool, args)?;
        let cmd = CommandBuilder::with_capacity(exiftool, args.len())?
            .args(args.iter().cloned())?
            .build();

        let exit_status = executor.execute_with(&cmd, handler)?;
        if exit_status != 0 {
            debug!("Command '{}' exited with status {}", cmd, exit_status);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        false
    }

    pub fn is_supported(&self, _version: &Version) -> bool {
        true
    }

    pub fn close(&self) -> Result<(), ExifToolError> {
        Ok(())
    }

    pub fn shutdown(&self) -> Result<(), ExifToolError> {
        Ok(())
    }
}
