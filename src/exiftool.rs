use crate::cache::{probe_version, VersionCache};
use crate::error::ExifToolError;
use crate::process::handler::{CollectHandler, OutputHandler};
use crate::process::{CommandExecutor, DefaultCommandExecutor};
use crate::scheduler::{self, Scheduler};
use crate::strategy::{DefaultStrategy, PoolStrategy, StayOpenStrategy, Strategy};
use crate::version::Version;
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Executable used when no path is configured.
pub const DEFAULT_PATH: &str = "exiftool";

/// Idle time after which a stay-open process is closed, unless configured otherwise.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(600);

const PATH_VAR: &str = "EXIFTOOL_PATH";
const CLEANUP_DELAY_VAR: &str = "EXIFTOOL_CLEANUP_DELAY";

/// Entry point: an exiftool executable together with the strategy used to run it.
///
/// `ExifTool` is `Send + Sync`; share it between threads (e.g. in an `Arc`) to run
/// commands concurrently. With a pool strategy, concurrent commands run on distinct
/// processes.
///
/// Any persistent process is shut down when the `ExifTool` is dropped.
pub struct ExifTool {
    path: String,
    executor: Box<dyn CommandExecutor>,
    strategy: Strategy,
    version: Version,
}

impl std::fmt::Debug for ExifTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExifTool")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl ExifTool {
    /// Runs `exiftool` from the `PATH`, one process per command.
    ///
    /// Returns an error if the `exiftool` command cannot be found or started.
    pub fn new() -> Result<Self, ExifToolError> {
        Self::builder().build()
    }

    pub fn builder() -> ExifToolBuilder {
        ExifToolBuilder::new()
    }

    fn create(
        path: String,
        executor: Box<dyn CommandExecutor>,
        strategy: Strategy,
        cache: &VersionCache,
    ) -> Result<Self, ExifToolError> {
        let version = cache.resolve(&path, || probe_version(executor.as_ref(), &path))?;

        if !strategy.is_supported(&version) {
            return Err(ExifToolError::UnsupportedFeature {
                path,
                version: version.to_string(),
                feature: strategy.feature().to_string(),
            });
        }

        debug!("Created exiftool instance (path: {}, version: {})", path, version);
        Ok(Self {
            path,
            executor,
            strategy,
            version,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// True when a persistent exiftool process is alive.
    pub fn is_running(&self) -> bool {
        self.strategy.is_running()
    }

    /// Runs `exiftool {args...}`, streaming each output line into `handler`.
    ///
    /// The `-execute` terminator is appended when a stay-open strategy is used, and
    /// `handler` then sees the `{ready}` marker ending the answer.
    pub fn execute_with<S: AsRef<str>>(
        &self,
        args: &[S],
        handler: &mut dyn OutputHandler,
    ) -> Result<(), ExifToolError> {
        let mut cmd_args: Vec<String> = Vec::with_capacity(args.len() + 1);
        cmd_args.extend(args.iter().map(|a| a.as_ref().to_string()));
        if self.strategy.is_stay_open() {
            cmd_args.push("-execute".to_string());
        }
        self.strategy
            .execute(self.executor.as_ref(), &self.path, &cmd_args, handler)
    }

    /// Runs `exiftool {args...}` and returns the output lines.
    ///
    /// # Example
    /// ```no_run
    /// # use exiftool_exec::{ExifTool, ExifToolError};
    /// # fn main() -> Result<(), ExifToolError> {
    /// let exiftool = ExifTool::builder().enable_stay_open().build()?;
    /// let lines = exiftool.execute_lines(&["-S", "-DateTimeOriginal", "data/image.jpg"])?;
    /// for line in lines {
    ///     println!("{}", line);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute_lines<S: AsRef<str>>(&self, args: &[S]) -> Result<Vec<String>, ExifToolError> {
        let mut handler = CollectHandler::new();
        self.execute_with(args, &mut handler)?;
        Ok(handler.into_lines())
    }

    /// Closes persistent processes. They are started again on the next command.
    pub fn close(&self) -> Result<(), ExifToolError> {
        self.strategy.close()
    }

    /// Closes persistent processes and stops their cleanup timers for good.
    pub fn shutdown(&self) -> Result<(), ExifToolError> {
        self.strategy.shutdown()
    }
}

impl Drop for ExifTool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to shut down exiftool (path: {}): {}", self.path, e);
        }
    }
}

/// Plain settings of an [`ExifTool`], loadable from JSON or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExifToolConfig {
    /// Path of the executable. Default: `exiftool`.
    pub path: String,
    /// Keep one process alive between commands. Default: `false`.
    pub stay_open: bool,
    /// Idle time in milliseconds before a persistent process is closed, `0` keeps it
    /// alive until closed explicitly. Default: 10 minutes.
    pub cleanup_delay_ms: u64,
    /// Number of persistent processes; `0` disables pooling. Default: `0`.
    pub pool_size: usize,
}

impl Default for ExifToolConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            stay_open: false,
            cleanup_delay_ms: DEFAULT_CLEANUP_DELAY.as_millis() as u64,
            pool_size: 0,
        }
    }
}

impl ExifToolConfig {
    /// Defaults overridden by `EXIFTOOL_PATH` and `EXIFTOOL_CLEANUP_DELAY` (milliseconds,
    /// zero or negative disables cleanup).
    pub fn from_env() -> Result<Self, ExifToolError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ExifToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup(PATH_VAR).filter(|p| !p.trim().is_empty()) {
            config.path = path;
        }
        if let Some(delay) = lookup(CLEANUP_DELAY_VAR) {
            let millis: i64 = delay.trim().parse().map_err(|_| {
                ExifToolError::Validation(format!(
                    "{} should be a number of milliseconds, got '{}'",
                    CLEANUP_DELAY_VAR, delay
                ))
            })?;
            // Zero or less disables cleanup.
            config.cleanup_delay_ms = u64::try_from(millis).unwrap_or(0);
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ExifToolError> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        let config: Self = serde_path_to_error::deserialize(deserializer)?;
        Ok(config)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

/// Assembles an [`ExifTool`].
///
/// Strategy precedence: an explicit [`ExifToolBuilder::with_strategy`] wins, then a
/// pool size, then stay-open, and one process per command otherwise.
#[derive(Default)]
pub struct ExifToolBuilder {
    path: Option<String>,
    executor: Option<Box<dyn CommandExecutor>>,
    stay_open: Option<bool>,
    cleanup_delay: Option<Duration>,
    strategy: Option<Strategy>,
    scheduler: Option<Box<dyn Scheduler>>,
    pool_size: usize,
    cache: Option<Arc<VersionCache>>,
}

impl ExifToolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ExifToolConfig) -> Self {
        let delay = config.cleanup_delay();
        let mut builder = Self::new().with_path(config.path).with_cleanup_delay(delay);
        if config.stay_open {
            builder = builder.enable_stay_open();
        }
        if config.pool_size > 0 {
            builder = builder.with_pool_size(config.pool_size);
        }
        builder
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        debug!("Set path: {}", path);
        self.path = Some(path);
        self
    }

    pub fn with_executor(mut self, executor: impl CommandExecutor + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Keeps one exiftool process alive between commands.
    pub fn enable_stay_open(mut self) -> Self {
        debug!("Enable 'stay_open' feature");
        if self.strategy.is_some() {
            warn!("A custom strategy is defined, enabling 'stay_open' feature will be ignored");
        }
        self.stay_open = Some(true);
        self
    }

    /// Closes persistent processes after `delay` without commands; zero disables cleanup.
    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        if self.scheduler.is_some() {
            warn!("A custom scheduler is already defined, cleanup delay will be ignored");
        }
        self.cleanup_delay = Some(delay);
        self
    }

    /// Enables stay-open with a custom cleanup scheduler.
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        if self.cleanup_delay.is_some() {
            warn!("A custom scheduler is defined, cleanup delay will be ignored");
        }
        self.scheduler = Some(Box::new(scheduler));
        self.enable_stay_open()
    }

    pub fn with_strategy(mut self, strategy: impl Into<Strategy>) -> Self {
        debug!("Overriding default strategy");
        if self.stay_open.is_some() || self.pool_size > 0 {
            warn!("A custom strategy is defined, 'stay_open' and pool settings will be ignored");
        }
        self.strategy = Some(strategy.into());
        self
    }

    /// Runs commands on a pool of `size` persistent processes. Zero is ignored.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        if size == 0 {
            warn!("Pool size should be greater than zero, ignoring it");
        } else {
            self.pool_size = size;
        }
        self
    }

    /// Uses `cache` instead of the process-wide [`VersionCache::global`].
    pub fn with_version_cache(mut self, cache: Arc<VersionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<ExifTool, ExifToolError> {
        let path = self.path.clone().unwrap_or_else(|| DEFAULT_PATH.to_string());
        let cache = self.cache.clone();
        let (strategy, executor) = self.into_parts()?;
        let executor = executor.unwrap_or_else(|| Box::new(DefaultCommandExecutor::new()));

        debug!("Create ExifTool instance:");
        debug!(" - Path: {}", path);
        debug!(" - Strategy: {:?}", strategy);

        match cache {
            Some(cache) => ExifTool::create(path, executor, strategy, &cache),
            None => ExifTool::create(path, executor, strategy, VersionCache::global()),
        }
    }

    fn into_parts(self) -> Result<(Strategy, Option<Box<dyn CommandExecutor>>), ExifToolError> {
        let delay = self.cleanup_delay.unwrap_or(DEFAULT_CLEANUP_DELAY);

        let strategy = if let Some(strategy) = self.strategy {
            strategy
        } else if self.pool_size > 0 {
            if self.scheduler.is_some() {
                warn!("A custom scheduler cannot be shared by pool members, it will be ignored");
            }
            // A pool without explicit delay keeps its processes until closed.
            let delay = self.cleanup_delay.unwrap_or(Duration::ZERO);
            Strategy::Pool(PoolStrategy::with_size(self.pool_size, delay)?)
        } else if self.stay_open == Some(true) {
            let scheduler = self
                .scheduler
                .unwrap_or_else(|| scheduler::for_delay(delay));
            Strategy::StayOpen(StayOpenStrategy::new(scheduler))
        } else {
            Strategy::Default(DefaultStrategy)
        };

        Ok((strategy, self.executor))
    }
}
