use crate::process::handler::OutputHandler;
use crate::process::CommandProcess;
use log::{debug, trace, warn};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout};
use std::thread;
use std::time::{Duration, Instant};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);
const EXIT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// A child process spawned by [`crate::DefaultCommandExecutor`], with its stdin and
/// stdout piped to us and its stderr drained to the log.
#[derive(Debug)]
pub struct ChildProcess {
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: Option<BufReader<ChildStdout>>,
    child: Child,
    closed: bool,
}

impl ChildProcess {
    pub(crate) fn new(mut child: Child) -> io::Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            drain_stderr(stderr, child.id());
        }

        Ok(Self {
            stdin: Some(BufWriter::new(stdin)),
            stdout: Some(BufReader::new(stdout)),
            child,
            closed: false,
        })
    }

    fn stdin(&mut self) -> io::Result<&mut BufWriter<ChildStdin>> {
        self.stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Process is closed"))
    }

    fn fail(&mut self, err: io::Error) -> io::Error {
        // Any pipe failure leaves the protocol in an unknown state.
        self.closed = true;
        err
    }

    /// Gives the child a moment to exit after stdin was closed, then kills it.
    fn reap(&mut self) -> io::Result<()> {
        let start = Instant::now();
        while start.elapsed() < EXIT_GRACE_PERIOD {
            if let Some(status) = self.child.try_wait()? {
                debug!("Process {} exited with {}", self.child.id(), status);
                return Ok(());
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }

        warn!(
            "Process {} still running after {:?}, killing it",
            self.child.id(),
            EXIT_GRACE_PERIOD
        );
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl CommandProcess for ChildProcess {
    fn write(&mut self, input: &str) -> io::Result<()> {
        trace!("Write: {:?}", input);
        let result = self.stdin()?.write_all(input.as_bytes());
        result.map_err(|e| self.fail(e))
    }

    fn write_lines(&mut self, inputs: &[String]) -> io::Result<()> {
        for input in inputs {
            self.write(input)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.stdin()?.flush();
        result.map_err(|e| self.fail(e))
    }

    fn read(&mut self, handler: &mut dyn OutputHandler) -> io::Result<bool> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Process is closed",
            ));
        };

        match read_lines(stdout, handler) {
            Ok(true) => {
                // End of stream: the child will not answer anymore.
                debug!("Process {} closed its output", self.child.id());
                self.closed = true;
                self.stdout = None;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if self.stdin.is_none() && self.stdout.is_none() && self.closed {
            return Ok(());
        }

        debug!("Closing process {}", self.child.id());
        self.closed = true;

        // Dropping stdin sends EOF, which makes a stay-open exiftool exit on its own.
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };
        self.stdout = None;

        let reaped = self.reap();
        flushed.and(reaped)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn is_running(&mut self) -> bool {
        !self.closed && matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close process {}: {}", self.child.id(), e);
        }
    }
}

/// Feeds `reader` line by line into `handler` until it asks to stop or the stream ends.
///
/// Returns `true` when the end of the stream was reached. Line endings (`\n` or `\r\n`)
/// are stripped, and invalid UTF-8 is replaced rather than failing the whole answer.
pub(crate) fn read_lines<R: BufRead>(
    reader: &mut R,
    handler: &mut dyn OutputHandler,
) -> io::Result<bool> {
    let mut buffer = Vec::with_capacity(256);
    loop {
        buffer.clear();
        let bytes_read = reader.read_until(b'\n', &mut buffer)?;
        if bytes_read == 0 {
            handler.read_line(None);
            return Ok(true);
        }

        if buffer.ends_with(b"\n") {
            buffer.pop();
            if buffer.ends_with(b"\r") {
                buffer.pop();
            }
        }

        let line = String::from_utf8_lossy(&buffer);
        let more = handler.read_line(Some(&line));
        trace!("  - Line: {} (continue: {})", line, more);
        if !more {
            return Ok(false);
        }
    }
}

fn drain_stderr<R: Read + Send + 'static>(stderr: R, pid: u32) {
    let stderr_reader = BufReader::new(stderr);
    thread::spawn(move || {
        for line in stderr_reader.lines().map_while(Result::ok) {
            warn!("exiftool[{}] stderr: {}", pid, line);
        }
    });
}
