use crate::scheduler::{Scheduler, Task};

/// Scheduler used when automatic cleanup is disabled: tasks are dropped unrun.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpScheduler;

impl Scheduler for NoOpScheduler {
    fn start(&self, _task: Task) {}

    fn stop(&self) {}

    fn shutdown(&self) {}
}
