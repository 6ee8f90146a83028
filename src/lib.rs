//! # ExifTool execution
//!
//! Runs Phil Harvey's ExifTool command-line application from Rust, either as one
//! process per command or as long-running processes in `-stay_open` mode.
//!
//! Three strategies are available:
//!
//! - [`DefaultStrategy`]: spawns `exiftool` for every command.
//! - [`StayOpenStrategy`]: keeps one process alive and feeds it commands through
//!   stdin, closing it after an idle delay.
//! - [`PoolStrategy`]: spreads concurrent commands over several stay-open processes.
//!
//! The installed exiftool version is probed once per executable path and cached
//! process-wide in a [`VersionCache`]. Stay-open requires exiftool 8.36 or newer.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use exiftool_exec::{ExifTool, ExifToolError};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), ExifToolError> {
//!     let exiftool = ExifTool::builder()
//!         .enable_stay_open()
//!         .with_cleanup_delay(Duration::from_secs(60))
//!         .build()?;
//!     println!("Using exiftool {}", exiftool.version());
//!
//!     let lines = exiftool.execute_lines(&["-S", "-ImageWidth", "-ImageHeight", "image.jpg"])?;
//!     for line in lines {
//!         println!("{}", line);
//!     }
//!
//!     // The background process is stopped when `exiftool` goes out of scope (Drop).
//!     Ok(())
//! }
//! ```
//!
//! Settings can also be loaded from the environment or from JSON:
//!
//! ```no_run
//! use exiftool_exec::{ExifToolBuilder, ExifToolConfig, ExifToolError};
//!
//! fn main() -> Result<(), ExifToolError> {
//!     let config = ExifToolConfig::from_json(r#"{"path": "/usr/bin/exiftool", "pool_size": 4}"#)?;
//!     let exiftool = ExifToolBuilder::from_config(config).build()?;
//!     exiftool.execute_lines(&["-ver"])?;
//!     Ok(())
//! }
//! ```

// Public API
mod cache;
mod command;
mod error;
mod exiftool;
pub mod process;
pub mod scheduler;
pub mod strategy;
mod version;

pub use cache::{probe_version, VersionCache};
pub use command::{Command, CommandBuilder, CommandResult};
pub use error::ExifToolError;
pub use exiftool::{ExifTool, ExifToolBuilder, ExifToolConfig, DEFAULT_CLEANUP_DELAY, DEFAULT_PATH};
pub use process::handler::{CollectHandler, OutputHandler};
pub use process::{ChildProcess, CommandExecutor, CommandProcess, DefaultCommandExecutor};
pub use scheduler::{NoOpScheduler, Scheduler, TimerScheduler};
pub use strategy::{DefaultStrategy, PoolStrategy, StayOpenStrategy, Strategy};
pub use version::Version;

#[cfg(test)]
mod test_helpers;
