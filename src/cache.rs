use crate::command::CommandBuilder;
use crate::error::ExifToolError;
use crate::process::CommandExecutor;
use crate::version::Version;
use dashmap::DashMap;
use log::debug;
use std::sync::OnceLock;

/// Versions of the exiftool executables seen so far, keyed by executable path.
///
/// Probing a version spawns a process, so it is done once per path. Entries never
/// expire. Two threads resolving the same unknown path may both probe it; the first
/// result stored wins and later callers see that one.
#[derive(Debug, Default)]
pub struct VersionCache {
    cache: DashMap<String, Version>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every [`crate::ExifTool`] of the process.
    pub fn global() -> &'static VersionCache {
        static CACHE: OnceLock<VersionCache> = OnceLock::new();
        CACHE.get_or_init(VersionCache::new)
    }

    /// Returns the cached version of `path`, probing it with `probe` on a miss.
    ///
    /// Probe failures are returned as-is and nothing is cached, so the next call
    /// probes again.
    pub fn resolve<F>(&self, path: &str, probe: F) -> Result<Version, ExifToolError>
    where
        F: FnOnce() -> Result<Version, ExifToolError>,
    {
        if let Some(version) = self.cache.get(path) {
            return Ok(*version);
        }

        let version = probe()?;
        let stored = *self.cache.entry(path.to_string()).or_insert(version);
        debug!("Resolved exiftool version (path: {}): {}", path, stored);
        Ok(stored)
    }

    pub fn get(&self, path: &str) -> Option<Version> {
        self.cache.get(path).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Runs `<path> -ver` and parses its output.
///
/// This command works on every exiftool release, so any failure means `path` is not a
/// usable exiftool and is reported as [`ExifToolError::ExifToolNotFound`].
pub fn probe_version(executor: &dyn CommandExecutor, path: &str) -> Result<Version, ExifToolError> {
    debug!("Checking exiftool (path: {}) version", path);

    let cmd = CommandBuilder::with_capacity(path, 1)?.arg("-ver")?.build();
    let result = executor
        .execute(&cmd)
        .map_err(|e| ExifToolError::ExifToolNotFound {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    if result.is_failure() {
        return Err(ExifToolError::ExifToolNotFound {
            path: path.to_string(),
            reason: result.to_string(),
        });
    }

    result.output().parse()
}
