//! Idle-based reclamation of stay-open processes.
//!
//! A [`Scheduler`] runs a cleanup task once the configured delay has elapsed without
//! the task being re-armed or cancelled. Every use of a stay-open process re-arms the
//! task, so the process is only closed after a full idle window.

mod noop;
mod timer;

pub use noop::NoOpScheduler;
pub use timer::TimerScheduler;

use crate::error::ExifToolError;
use std::time::Duration;

/// Cleanup work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() -> Result<(), ExifToolError> + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Arms `task` to run once after the scheduler delay, replacing any pending task.
    fn start(&self, task: Task);

    /// Cancels the pending task, if any.
    fn stop(&self);

    /// Releases the timer for good. Pending tasks never run and later `start` calls
    /// are ignored.
    fn shutdown(&self);
}

/// Builds the scheduler matching `delay`: disabled for a zero delay, timer based otherwise.
pub fn for_delay(delay: Duration) -> Box<dyn Scheduler> {
    if delay.is_zero() {
        Box::new(NoOpScheduler)
    } else {
        Box::new(TimerScheduler::new(delay))
    }
}
