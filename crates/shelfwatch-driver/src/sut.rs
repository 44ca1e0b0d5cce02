//! The system under test, seen as a line-oriented peer.
//!
//! [`ProcessSut`] owns a child process. One pump task moves raw stdout
//! lines into a bounded channel, another keeps the newest stderr lines in a
//! small ring. The driver is the only writer to the child's stdin and the
//! only reader of the stdout channel.
//!
//! ```text
//!   Driver ──send_line──▶ stdin ─┐
//!                                ├─ child process
//!   Driver ◀──next_line── stdout ┘   (stdout pump task → mpsc)
//!                         stderr ──▶ stderr pump task → tail ring + tracing
//! ```

use std::{
    collections::VecDeque,
    path::Path,
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use crate::error::SutError;

/// Buffered stdout lines before the pump task waits.
const CHANNEL_CAPACITY: usize = 256;

/// Stderr lines kept for failure reports.
const STDERR_TAIL: usize = 8;

/// A line-oriented system under test.
#[async_trait]
pub trait Sut: Send {
    /// Write one line to the SUT's input.
    async fn send_line(&mut self, line: &str) -> Result<(), SutError>;

    /// Wait up to `timeout` for the next output line.
    async fn next_line(&mut self, timeout: Duration) -> Result<String, SutError>;

    /// Close input and stop the SUT.
    async fn shutdown(&mut self) -> Result<(), SutError>;

    /// Most recent diagnostic lines, drained.
    fn stderr_lines(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// What woke `next_line`.
enum Wake {
    Line(Option<String>),
    Exited(std::io::Result<ExitStatus>),
    Deadline,
}

/// A SUT running as a child process.
pub struct ProcessSut {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: mpsc::Receiver<String>,
    stderr: Arc<Mutex<VecDeque<String>>>,
    pumps: Vec<JoinHandle<()>>,
    exit: Option<ExitStatus>,
    shutdown_grace: Duration,
}

impl ProcessSut {
    /// Start `program` with `args`, all three streams piped.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SutError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SutError::Spawn { program: program.to_string(), source })?;

        let stdin = child.stdin.take().ok_or(SutError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SutError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SutError::MissingPipe("stderr"))?;

        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL)));
        let pumps = vec![
            tokio::spawn(pump_stdout(stdout, out_tx)),
            tokio::spawn(pump_stderr(stderr, Arc::clone(&tail))),
        ];

        info!(program, ?args, pid = child.id(), "SUT started");
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: out_rx,
            stderr: tail,
            pumps,
            exit: None,
            shutdown_grace: Duration::from_millis(1500),
        })
    }

    /// Start a Java SUT as `java -jar <jar>`.
    pub fn java_jar(jar: &Path) -> Result<Self, SutError> {
        Self::spawn("java", &["-jar".to_string(), jar.display().to_string()])
    }

    /// How long `shutdown` waits for a voluntary exit before killing.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    fn exited(&self) -> SutError {
        SutError::Exited { code: self.exit.and_then(|status| status.code()) }
    }
}

#[async_trait]
impl Sut for ProcessSut {
    async fn send_line(&mut self, line: &str) -> Result<(), SutError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SutError::Closed);
        };
        trace!(line, "to SUT");
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self, timeout: Duration) -> Result<String, SutError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            // Buffered lines win over exit so output written just before
            // the process ended is still delivered.
            let wake = tokio::select! {
                biased;
                line = self.stdout.recv() => Wake::Line(line),
                status = self.child.wait(), if self.exit.is_none() => Wake::Exited(status),
                () = &mut deadline => Wake::Deadline,
            };

            match wake {
                Wake::Line(Some(line)) => return Ok(line),
                Wake::Line(None) => return Err(self.exited()),
                Wake::Exited(status) => {
                    let status = status?;
                    debug!(%status, "SUT exited, draining output");
                    self.exit = Some(status);
                },
                Wake::Deadline => return Err(SutError::Timeout { after: timeout }),
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), SutError> {
        drop(self.stdin.take());

        let status = match self.exit {
            Some(status) => status,
            None => {
                if let Ok(status) =
                    tokio::time::timeout(self.shutdown_grace, self.child.wait()).await
                {
                    status?
                } else {
                    warn!(grace = ?self.shutdown_grace, "SUT still running, killing");
                    self.child.kill().await?;
                    self.child.wait().await?
                }
            },
        };
        self.exit = Some(status);

        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        info!(%status, "SUT stopped");
        Ok(())
    }

    fn stderr_lines(&mut self) -> Vec<String> {
        self.stderr.lock().map(|mut tail| tail.drain(..).collect()).unwrap_or_default()
    }
}

async fn pump_stdout<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end().to_string();
                trace!(line, "from SUT");
                if tx.send(line).await.is_err() {
                    break;
                }
            },
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "reading SUT stdout failed");
                break;
            },
        }
    }
}

/// Stderr never blocks the child: only the newest `STDERR_TAIL` lines are
/// kept, every line is logged.
async fn pump_stderr<R: AsyncRead + Unpin>(reader: R, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(target: "shelfwatch::sut::stderr", "{line}");
        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}
