use crate::error::ExifToolError;
use crate::process::handler::OutputHandler;
use crate::process::CommandExecutor;
use crate::strategy::{validate, StayOpenStrategy};
use crate::version::Version;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Spreads commands over a fixed set of [`StayOpenStrategy`] members.
///
/// Each request checks out the member idle for the longest time, blocking while every
/// member is busy, and hands it back once answered. Members are used in turn under
/// sequential load and run concurrently under parallel load.
#[derive(Debug)]
pub struct PoolStrategy {
    members: Vec<StayOpenStrategy>,
    idle: Mutex<VecDeque<usize>>,
    available: Condvar,
}

impl PoolStrategy {
    pub fn new(members: Vec<StayOpenStrategy>) -> Result<Self, ExifToolError> {
        if members.is_empty() {
            return Err(ExifToolError::Validation(
                "Pool should contain at least one strategy".to_string(),
            ));
        }

        let idle = (0..members.len()).collect();
        Ok(Self {
            members,
            idle: Mutex::new(idle),
            available: Condvar::new(),
        })
    }

    /// Pool of `size` members, each closing its process after `cleanup_delay` of
    /// inactivity (zero disables cleanup).
    pub fn with_size(size: usize, cleanup_delay: Duration) -> Result<Self, ExifToolError> {
        if size == 0 {
            return Err(ExifToolError::Validation(
                "Pool size should be greater than zero".to_string(),
            ));
        }
        let members = (0..size)
            .map(|_| StayOpenStrategy::with_cleanup_delay(cleanup_delay))
            .collect();
        Self::new(members)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn execute(
        &self,
        executor: &dyn CommandExecutor,
        exiftool: &str,
        args: &[String],
        handler: &mut dyn OutputHandler,
    ) -> Result<(), ExifToolError> {
        validate(exiftool, args)?;

        let member = self.checkout();
        debug!("Executing on pool member #{}", member.index);
        self.members[member.index].execute(executor, exiftool, args, handler)
    }

    fn checkout(&self) -> Checkout<'_> {
        let mut idle = self.idle.lock();
        loop {
            if let Some(index) = idle.pop_front() {
                return Checkout { pool: self, index };
            }
            self.available.wait(&mut idle);
        }
    }

    /// True when at least one member has a running process.
    pub fn is_running(&self) -> bool {
        self.members.iter().any(StayOpenStrategy::is_running)
    }

    pub fn is_supported(&self, version: &Version) -> bool {
        self.members.iter().all(|member| member.is_supported(version))
    }

    /// Closes every member, even when some of them fail. The first failure is returned.
    pub fn close(&self) -> Result<(), ExifToolError> {
        self.for_each_member("close", StayOpenStrategy::close)
    }

    /// Shuts every member down, even when some of them fail. The first failure is returned.
    pub fn shutdown(&self) -> Result<(), ExifToolError> {
        self.for_each_member("shut down", StayOpenStrategy::shutdown)
    }

    fn for_each_member<F>(&self, action: &str, f: F) -> Result<(), ExifToolError>
    where
        F: Fn(&StayOpenStrategy) -> Result<(), ExifToolError>,
    {
        let mut first_error = None;
        for (index, member) in self.members.iter().enumerate() {
            if let Err(e) = f(member) {
                warn!("Failed to {} pool member #{}: {}", action, index, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A member taken out of the idle queue, handed back on drop.
struct Checkout<'a> {
    pool: &'a PoolStrategy,
    index: usize,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.pool.idle.lock().push_back(self.index);
        self.pool.available.notify_one();
    }
}
