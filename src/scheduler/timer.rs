use crate::scheduler::{Scheduler, Task};
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Scheduler backed by one dedicated background thread.
///
/// The thread is spawned on the first [`Scheduler::start`] and lives until
/// [`Scheduler::shutdown`] (or drop). Tasks run on that thread, outside of the
/// scheduler lock, so a task may itself wait on locks held by callers of `stop`.
#[derive(Debug)]
pub struct TimerScheduler {
    delay: Duration,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

#[derive(Default)]
struct State {
    pending: Option<Pending>,
    shutdown: bool,
}

struct Pending {
    deadline: Instant,
    task: Task,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("deadline", &self.pending.as_ref().map(|p| p.deadline))
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

impl TimerScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True while a task is waiting for its deadline.
    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    fn ensure_worker(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return true;
        }

        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name("exiftool-cleanup".to_string())
            .spawn(move || run(shared))
        {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(e) => {
                error!("Unable to spawn cleanup thread: {}", e);
                false
            }
        }
    }
}

impl Scheduler for TimerScheduler {
    fn start(&self, task: Task) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                warn!("Scheduler has been shut down, cleanup task ignored");
                return;
            }
            state.pending = Some(Pending {
                deadline: Instant::now() + self.delay,
                task,
            });
        }

        if self.ensure_worker() {
            self.shared.wakeup.notify_all();
        } else {
            self.shared.state.lock().pending = None;
        }
    }

    fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.pending.take().is_some() {
            self.shared.wakeup.notify_all();
        }
    }

    fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.pending = None;
        }
        self.shared.wakeup.notify_all();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        // A task shutting down its own scheduler cannot wait for itself.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            error!("Cleanup thread panicked");
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: Arc<Shared>) {
    debug!("Cleanup thread started");
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        let deadline = match &state.pending {
            Some(pending) => pending.deadline,
            None => {
                shared.wakeup.wait(&mut state);
                continue;
            }
        };

        if Instant::now() < deadline {
            shared.wakeup.wait_until(&mut state, deadline);
            continue;
        }

        if let Some(pending) = state.pending.take() {
            MutexGuard::unlocked(&mut state, || run_task(pending.task));
        }
    }
    debug!("Cleanup thread stopped");
}

fn run_task(task: Task) {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => debug!("Cleanup task done"),
        Ok(Err(e)) => error!("Cleanup task failed: {}", e),
        Err(_) => error!("Cleanup task panicked"),
    }
}
