//! How exiftool is run: once per command, as one persistent process, or as a pool of
//! persistent processes.

mod default;
mod pool;
mod stay_open;

pub use default::DefaultStrategy;
pub use pool::PoolStrategy;
pub use stay_open::{StayOpenStrategy, MIN_VERSION, SEPARATOR};

use crate::error::ExifToolError;
use crate::process::handler::OutputHandler;
use crate::process::CommandExecutor;
use crate::version::Version;

/// The execution strategies, behind one set of operations.
#[derive(Debug)]
pub enum Strategy {
    /// Spawn, run and exit for every command.
    Default(DefaultStrategy),
    /// One long-lived process in `-stay_open` mode.
    StayOpen(StayOpenStrategy),
    /// Several stay-open processes used concurrently.
    Pool(PoolStrategy),
}

impl Strategy {
    /// Runs one exiftool command.
    ///
    /// `args` are passed unchanged: with a persistent strategy they must already end
    /// with the `-execute` terminator. Output lines are handed to `handler`.
    pub fn execute(
        &self,
        executor: &dyn CommandExecutor,
        exiftool: &str,
        args: &[String],
        handler: &mut dyn OutputHandler,
    ) -> Result<(), ExifToolError> {
        match self {
            Strategy::Default(s) => s.execute(executor, exiftool, args, handler),
            Strategy::StayOpen(s) => s.execute(executor, exiftool, args, handler),
            Strategy::Pool(s) => s.execute(executor, exiftool, args, handler),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            Strategy::Default(s) => s.is_running(),
            Strategy::StayOpen(s) => s.is_running(),
            Strategy::Pool(s) => s.is_running(),
        }
    }

    pub fn is_supported(&self, version: &Version) -> bool {
        match self {
            Strategy::Default(s) => s.is_supported(version),
            Strategy::StayOpen(s) => s.is_supported(version),
            Strategy::Pool(s) => s.is_supported(version),
        }
    }

    pub fn close(&self) -> Result<(), ExifToolError> {
        match self {
            Strategy::Default(s) => s.close(),
            Strategy::StayOpen(s) => s.close(),
            Strategy::Pool(s) => s.close(),
        }
    }

    pub fn shutdown(&self) -> Result<(), ExifToolError> {
        match self {
            Strategy::Default(s) => s.shutdown(),
            Strategy::StayOpen(s) => s.shutdown(),
            Strategy::Pool(s) => s.shutdown(),
        }
    }

    /// True for strategies speaking the stay-open protocol, whose commands need the
    /// `-execute` terminator.
    pub fn is_stay_open(&self) -> bool {
        !matches!(self, Strategy::Default(_))
    }

    pub(crate) fn feature(&self) -> &'static str {
        match self {
            Strategy::Default(_) => "one-shot execution",
            Strategy::StayOpen(_) => "-stay_open",
            Strategy::Pool(_) => "-stay_open (pool)",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Default(DefaultStrategy)
    }
}

impl From<DefaultStrategy> for Strategy {
    fn from(strategy: DefaultStrategy) -> Self {
        Strategy::Default(strategy)
    }
}

impl From<StayOpenStrategy> for Strategy {
    fn from(strategy: StayOpenStrategy) -> Self {
        Strategy::StayOpen(strategy)
    }
}

impl From<PoolStrategy> for Strategy {
    fn from(strategy: PoolStrategy) -> Self {
        Strategy::Pool(strategy)
    }
}

/// Checks the inputs shared by every strategy before anything reaches a process.
fn validate(exiftool: &str, args: &[String]) -> Result<(), ExifToolError> {
    if exiftool.trim().is_empty() {
        return Err(ExifToolError::Validation(
            "Path to exiftool should be defined".to_string(),
        ));
    }
    if args.is_empty() {
        return Err(ExifToolError::Validation(
            "Arguments should not be empty".to_string(),
        ));
    }
    if args.iter().any(|arg| arg.trim().is_empty()) {
        return Err(ExifToolError::Validation(
            "Arguments should not be blank".to_string(),
        ));
    }
    Ok(())
}
