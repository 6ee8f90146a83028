use crate::command::CommandBuilder;
use crate::error::ExifToolError;
use crate::process::handler::OutputHandler;
use crate::process::{CommandExecutor, CommandProcess};
use crate::scheduler::{self, Scheduler, Task};
use crate::strategy::validate;
use crate::version::Version;
use log::{debug, warn};
use parking_lot::Mutex;
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Value given to `-sep`, chosen so that it never shows up in real tag values.
pub const SEPARATOR: &str = "|>☃";

/// First exiftool release supporting `-stay_open`.
pub const MIN_VERSION: Version = Version::new(8, 36, 0);

const SHUTDOWN_FRAME: &str = "-stay_open\nFalse\n";

/// Runs every command through one long-lived exiftool process.
///
/// The process is started lazily with `-stay_open True -@ -` and reads its arguments
/// from stdin, one per line. Requests are serialized: the protocol has no request
/// identifiers, so only one command may be in flight at a time. If the process dies,
/// the next request starts a new one.
///
/// Every request re-arms the scheduler; once it fires, the idle process is closed.
/// Closing waits for the request in flight, if any.
pub struct StayOpenStrategy {
    state: Arc<Mutex<State>>,
    scheduler: Box<dyn Scheduler>,
}

#[derive(Default)]
struct State {
    process: Option<Box<dyn CommandProcess>>,
    path: String,
    // Bumped on every request, lets an outdated cleanup task know it lost the race.
    activity: u64,
}

impl StayOpenStrategy {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            scheduler,
        }
    }

    /// Closes the process after `delay` without requests. A zero delay disables cleanup.
    pub fn with_cleanup_delay(delay: Duration) -> Self {
        Self::new(scheduler::for_delay(delay))
    }

    pub fn execute(
        &self,
        executor: &dyn CommandExecutor,
        exiftool: &str,
        args: &[String],
        handler: &mut dyn OutputHandler,
    ) -> Result<(), ExifToolError> {
        validate(exiftool, args)?;
        let mut state = self.state.lock();

        let mut process = match state.process.take() {
            Some(process) if !process.is_closed() => process,
            previous => {
                if previous.is_some() {
                    debug!("exiftool process is closed, starting a new one");
                }
                drop(previous);
                let process = start_process(executor, exiftool)?;
                state.path = exiftool.to_string();
                process
            }
        };

        state.activity = state.activity.wrapping_add(1);
        self.scheduler.stop();
        self.scheduler.start(self.cleanup_task(state.activity));

        let result = send(process.as_mut(), args, handler).map_err(|source| {
            ExifToolError::Protocol {
                path: state.path.clone(),
                source,
            }
        });

        if result.is_err() {
            // The answer is lost, the next request has to start over.
            if let Err(e) = process.close() {
                warn!("Failed to close broken exiftool process: {}", e);
            }
        }
        state.process = Some(process);
        result
    }

    fn cleanup_task(&self, activity: u64) -> Task {
        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        Box::new(move || {
            let Some(state) = state.upgrade() else {
                return Ok(());
            };
            let mut state = state.lock();
            if state.activity != activity {
                debug!("exiftool process used since cleanup was scheduled, keeping it");
                return Ok(());
            }
            debug!("exiftool process idle, closing it");
            close_process(&mut state)
        })
    }

    /// True when a process has been started and is still alive.
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .process
            .as_mut()
            .is_some_and(|process| process.is_running())
    }

    pub fn is_supported(&self, version: &Version) -> bool {
        *version >= MIN_VERSION
    }

    /// Asks the process to exit and closes it, then cancels the idle cleanup.
    ///
    /// Waits for the request in flight. Does nothing but cancel the cleanup if no
    /// process was started. The strategy remains usable: the next request starts a
    /// new process.
    pub fn close(&self) -> Result<(), ExifToolError> {
        let mut state = self.state.lock();
        let result = close_process(&mut state);
        self.scheduler.stop();
        result
    }

    /// Closes the process and releases the scheduler for good.
    pub fn shutdown(&self) -> Result<(), ExifToolError> {
        let result = self.close();
        // Outside of the lock: the cleanup thread may be waiting for it.
        self.scheduler.shutdown();
        result
    }
}

impl std::fmt::Debug for StayOpenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StayOpenStrategy")
            .field("started", &self.state.lock().process.is_some())
            .finish()
    }
}

impl Drop for StayOpenStrategy {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to shut down exiftool process: {}", e);
        }
    }
}

fn start_process(
    executor: &dyn CommandExecutor,
    exiftool: &str,
) -> Result<Box<dyn CommandProcess>, ExifToolError> {
    let cmd = CommandBuilder::with_capacity(exiftool, 6)?
        .args(["-stay_open", "True", "-sep", SEPARATOR, "-@", "-"])?
        .build();
    debug!("Starting exiftool process: {}", cmd);
    executor.start(&cmd)
}

/// One request: every argument on its own line, flushed as a batch, then the answer.
///
/// The answer must end with `{ready}`: a process closing its output first has died
/// mid-request and the lines read so far are incomplete.
fn send(
    process: &mut dyn CommandProcess,
    args: &[String],
    handler: &mut dyn OutputHandler,
) -> io::Result<()> {
    let lines: Vec<String> = args.iter().map(|arg| format!("{}\n", arg)).collect();
    process.write_lines(&lines)?;
    process.flush()?;
    if process.read(handler)? {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "exiftool closed its output before {ready}",
        ));
    }
    Ok(())
}

fn close_process(state: &mut State) -> Result<(), ExifToolError> {
    let Some(mut process) = state.process.take() else {
        return Ok(());
    };

    debug!("Closing exiftool process (path: {})", state.path);
    let goodbye = if process.is_closed() {
        Ok(())
    } else {
        process
            .write(SHUTDOWN_FRAME)
            .and_then(|()| process.flush())
    };
    let closed = process.close();

    goodbye
        .and(closed)
        .map_err(|source| ExifToolError::Protocol {
            path: state.path.clone(),
            source,
        })
}
