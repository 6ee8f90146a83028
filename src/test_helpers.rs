//! Test doubles recording every interaction in a shared, ordered event log.

use crate::command::{Command, CommandResult};
use crate::error::ExifToolError;
use crate::process::handler::OutputHandler;
use crate::process::{CommandExecutor, CommandProcess};
use crate::scheduler::{Scheduler, Task};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(Vec<String>),
    Write(String),
    WriteLines(Vec<String>),
    Flush,
    Read,
    Close,
    SchedulerStart,
    SchedulerStop,
    SchedulerShutdown,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.0.lock().iter().filter(|e| *e == event).count()
    }

    pub fn count_starts(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::Start(_)))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Shared view on a [`MockProcess`] once it has been handed over to a strategy.
#[derive(Debug, Clone, Default)]
pub struct ProcessControl {
    closed: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ProcessControl {
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockProcess {
    log: EventLog,
    control: ProcessControl,
    output: Vec<String>,
    read_delay: Duration,
    fail_write: bool,
    fail_read: bool,
}

impl MockProcess {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            control: ProcessControl::default(),
            output: vec!["{ready}".to_string()],
            read_delay: Duration::ZERO,
            fail_write: false,
            fail_read: false,
        }
    }

    pub fn control(&self) -> ProcessControl {
        self.control.clone()
    }

    pub fn with_output(mut self, lines: &[&str]) -> Self {
        self.output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Makes raw writes (the shutdown frame) fail.
    pub fn failing_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    pub fn failing_read(mut self) -> Self {
        self.fail_read = true;
        self
    }
}

impl CommandProcess for MockProcess {
    fn write(&mut self, input: &str) -> io::Result<()> {
        self.log.push(Event::Write(input.to_string()));
        if self.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        Ok(())
    }

    fn write_lines(&mut self, inputs: &[String]) -> io::Result<()> {
        self.log.push(Event::WriteLines(inputs.to_vec()));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.push(Event::Flush);
        Ok(())
    }

    fn read(&mut self, handler: &mut dyn OutputHandler) -> io::Result<bool> {
        self.log.push(Event::Read);
        let in_flight = self.control.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.control
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        self.control.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_read {
            self.control.set_closed(true);
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read failed"));
        }
        for line in &self.output {
            if !handler.read_line(Some(line)) {
                return Ok(false);
            }
        }
        handler.read_line(None);
        self.control.set_closed(true);
        Ok(true)
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.push(Event::Close);
        self.control.set_closed(true);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    fn is_running(&mut self) -> bool {
        !self.control.is_closed()
    }
}

#[derive(Debug)]
pub struct MockExecutor {
    log: EventLog,
    processes: Mutex<VecDeque<MockProcess>>,
    executed: Mutex<Vec<Vec<String>>>,
    result: CommandResult,
    read_delay: Duration,
    fail_start: bool,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::with_log(EventLog::new())
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            processes: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
            result: CommandResult::new(0, ""),
            read_delay: Duration::ZERO,
            fail_start: false,
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// Result returned by one-shot executions.
    pub fn with_result(mut self, exit_status: i32, output: &str) -> Self {
        self.result = CommandResult::new(exit_status, output);
        self
    }

    /// Read delay of the processes created on demand.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Queues `process` to be returned by the next `start`.
    pub fn push_process(&self, process: MockProcess) {
        self.processes.lock().push_back(process);
    }

    pub fn executed(&self) -> Vec<Vec<String>> {
        self.executed.lock().clone()
    }

    fn start_failure(command: &Command) -> ExifToolError {
        ExifToolError::ProcessStart {
            command: command.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        }
    }
}

impl CommandExecutor for MockExecutor {
    fn start(&self, command: &Command) -> Result<Box<dyn CommandProcess>, ExifToolError> {
        if self.fail_start {
            return Err(Self::start_failure(command));
        }
        self.log.push(Event::Start(command.arguments().to_vec()));
        let process = self.processes.lock().pop_front().unwrap_or_else(|| {
            MockProcess::new(self.log.clone()).with_read_delay(self.read_delay)
        });
        Ok(Box::new(process))
    }

    fn execute_with(
        &self,
        command: &Command,
        handler: &mut dyn OutputHandler,
    ) -> Result<i32, ExifToolError> {
        if self.fail_start {
            return Err(Self::start_failure(command));
        }
        self.executed.lock().push(command.arguments().to_vec());
        for line in self.result.output().lines() {
            if !handler.read_line(Some(line)) {
                return Ok(self.result.exit_status());
            }
        }
        handler.read_line(None);
        Ok(self.result.exit_status())
    }
}

/// Scheduler keeping the last armed task until [`MockScheduler::fire`] runs it.
#[derive(Default)]
pub struct MockScheduler {
    log: EventLog,
    pending: Arc<Mutex<Option<Task>>>,
}

impl MockScheduler {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            pending: Arc::default(),
        }
    }

    /// Handle to trigger the pending task after the scheduler was moved into a strategy.
    pub fn trigger(&self) -> Trigger {
        Trigger(Arc::clone(&self.pending))
    }
}

pub struct Trigger(Arc<Mutex<Option<Task>>>);

impl Trigger {
    pub fn is_armed(&self) -> bool {
        self.0.lock().is_some()
    }

    /// Disarms and returns the pending task, as a timer that already fired would.
    pub fn take(&self) -> Option<Task> {
        self.0.lock().take()
    }

    /// Runs the pending task as the timer thread would, returning `None` if nothing is armed.
    pub fn fire(&self) -> Option<Result<(), ExifToolError>> {
        self.take().map(|task| task())
    }
}

impl Scheduler for MockScheduler {
    fn start(&self, task: Task) {
        self.log.push(Event::SchedulerStart);
        *self.pending.lock() = Some(task);
    }

    fn stop(&self) {
        self.log.push(Event::SchedulerStop);
        *self.pending.lock() = None;
    }

    fn shutdown(&self) {
        self.log.push(Event::SchedulerShutdown);
        *self.pending.lock() = None;
    }
}
