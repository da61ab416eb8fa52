//! Output aggregator and watchdog
//!
//! `ProcessListener` owns the console's stdin and two reader tasks, one
//! per output stream. Lines are buffered per stream until the round's
//! trigger line shows up or the watchdog sees no output for a full
//! interval; the buffered text is then handed to the state machine
//! exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::console::protocol::{strip_prompt_noise, ConsoleCommand, Trigger, LINE_SEPARATOR};
use crate::error::BridgeError;
use crate::machine::signal::Round;
use crate::machine::state_machine::{Progress, StateMachine};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frames console output into rounds for one session
pub struct ProcessListener {
    shared: Arc<Shared>,
    stdin: Arc<tokio::sync::Mutex<Option<ChildStdin>>>,
    tasks: Vec<JoinHandle<()>>,
}

struct Shared {
    machine: Arc<Mutex<StateMachine>>,
    stdout: Mutex<String>,
    stderr: Mutex<String>,
    awaiting: AtomicBool,
    trigger: Mutex<Trigger>,
    watchdog: Watchdog,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

/// Deadline that is pushed back on every line and fires once per arm
struct Watchdog {
    interval: Duration,
    deadline: Mutex<Option<Instant>>,
    changed: Notify,
}

impl Watchdog {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Mutex::new(None),
            changed: Notify::new(),
        }
    }

    fn arm(&self) {
        *lock(&self.deadline) = Some(Instant::now() + self.interval);
        self.changed.notify_one();
    }

    /// Push the deadline back, but only while armed.
    fn reset(&self) {
        let mut deadline = lock(&self.deadline);
        if deadline.is_some() {
            *deadline = Some(Instant::now() + self.interval);
        }
    }

    fn stop(&self) {
        *lock(&self.deadline) = None;
        self.changed.notify_one();
    }

    fn deadline(&self) -> Option<Instant> {
        *lock(&self.deadline)
    }

    /// Disarm and return true if the deadline has passed.
    fn expire(&self) -> bool {
        let mut deadline = lock(&self.deadline);
        match *deadline {
            Some(at) if at <= Instant::now() => {
                *deadline = None;
                true
            }
            _ => false,
        }
    }

    fn is_armed(&self) -> bool {
        lock(&self.deadline).is_some()
    }
}

impl ProcessListener {
    /// Create a listener feeding `machine`.
    ///
    /// `output_timeout` is the watchdog interval. Cancelling `cancel`
    /// makes the readers and the watchdog stop delivering.
    #[must_use]
    pub fn new(
        machine: Arc<Mutex<StateMachine>>,
        output_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Self {
        let shared = Shared {
            machine,
            stdout: Mutex::new(String::new()),
            stderr: Mutex::new(String::new()),
            awaiting: AtomicBool::new(false),
            trigger: Mutex::new(Trigger::Timeout),
            watchdog: Watchdog::new(output_timeout),
            cancel: cancel.clone(),
            shutdown: cancel.child_token(),
        };

        Self {
            shared: Arc::new(shared),
            stdin: Arc::new(tokio::sync::Mutex::new(None)),
            tasks: Vec::new(),
        }
    }

    /// Spawn the console and open the startup round.
    ///
    /// Returns the child handle and the startup round's receiver.
    ///
    /// # Errors
    ///
    /// Fails when a round is already outstanding or the process cannot be
    /// spawned.
    pub fn start(&mut self, mut command: Command, trigger: Trigger) -> Result<(Child, Round), BridgeError> {
        if self.shared.awaiting.load(Ordering::Acquire) {
            return Err(BridgeError::RoundOutstanding);
        }

        let round = self.subscribe()?;
        *lock(&self.shared.trigger) = trigger;
        self.shared.awaiting.store(true, Ordering::Release);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.shared.awaiting.store(false, Ordering::Release);
                return Err(BridgeError::Spawn(err));
            }
        };
        debug!(pid = child.id(), "Console started");

        if let Some(stdin) = child.stdin.take() {
            self.stdin = Arc::new(tokio::sync::Mutex::new(Some(stdin)));
        }

        // Armed before any reader can resolve the round
        self.shared.watchdog.arm();
        if let Some(stdout) = child.stdout.take() {
            self.tasks
                .push(tokio::spawn(read_stream(Arc::clone(&self.shared), stdout, Stream::Stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            self.tasks
                .push(tokio::spawn(read_stream(Arc::clone(&self.shared), stderr, Stream::Stderr)));
        }
        self.tasks.push(tokio::spawn(run_watchdog(Arc::clone(&self.shared))));

        Ok((child, round))
    }

    /// Write `command` to the console and open a new round.
    ///
    /// The write happens on a background task; a failed write is logged
    /// and the watchdog closes the round.
    ///
    /// # Errors
    ///
    /// `RoundOutstanding` if the previous round has not resolved,
    /// `Cancelled` if the session was cancelled.
    pub fn post_command(&self, command: &ConsoleCommand) -> Result<Round, BridgeError> {
        if self.shared.awaiting.load(Ordering::Acquire) {
            return Err(BridgeError::RoundOutstanding);
        }
        if self.shared.cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }

        self.shared.clear_buffers();
        let round = self.subscribe()?;

        *lock(&self.shared.trigger) = command.trigger.clone();
        self.shared.awaiting.store(true, Ordering::Release);
        self.shared.watchdog.arm();

        debug!(verb = command.text.split_whitespace().next().unwrap_or_default(), "Posting command");
        trace!(command = %command.text, "Command line");

        let stdin = Arc::clone(&self.stdin);
        let line = format!("{}{LINE_SEPARATOR}", command.text);
        tokio::spawn(async move {
            let mut guard = stdin.lock().await;
            let Some(stdin) = guard.as_mut() else {
                warn!("Console stdin is not available");
                return;
            };
            let written = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await;
            if let Err(err) = written {
                warn!(error = %err, "Failed to write command to console");
            }
        });

        Ok(round)
    }

    /// True while a round is outstanding
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        self.shared.awaiting.load(Ordering::Acquire)
    }

    /// True while the watchdog is armed
    #[must_use]
    pub fn watchdog_armed(&self) -> bool {
        self.shared.watchdog.is_armed()
    }

    /// Bytes currently buffered across both streams
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        lock(&self.shared.stdout).len() + lock(&self.shared.stderr).len()
    }

    /// Stop the readers and the watchdog. Idempotent.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.cancel();
        self.shared.watchdog.stop();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn subscribe(&self) -> Result<Round, BridgeError> {
        lock(&self.shared.machine)
            .subscribe()
            .ok_or(BridgeError::RoundOutstanding)
    }
}

impl Drop for ProcessListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn clear_buffers(&self) {
        let mut stdout = lock(&self.stdout);
        if !stdout.is_empty() {
            warn!(data = %stdout, "Discarding leftover stdout");
            stdout.clear();
        }
        drop(stdout);

        let mut stderr = lock(&self.stderr);
        if !stderr.is_empty() {
            warn!(data = %stderr, "Discarding leftover stderr");
            stderr.clear();
        }
    }

    fn on_stdout_line(&self, raw: &str) {
        let line = strip_prompt_noise(raw).trim();
        if line.is_empty() {
            return;
        }

        self.watchdog.reset();
        let awaiting = self.awaiting.load(Ordering::Acquire);
        if awaiting {
            trace!(line, "stdout");
        } else {
            warn!("Console output while no command is outstanding");
            trace!(line, "Unexpected stdout");
        }

        {
            let mut stdout = lock(&self.stdout);
            stdout.push_str(line);
            stdout.push_str(LINE_SEPARATOR);
        }

        if awaiting && lock(&self.trigger).is_satisfied_by(line) {
            self.resolve_round();
        }
    }

    fn on_stderr_line(&self, line: &str) {
        self.watchdog.reset();
        warn!(line, "Console wrote to stderr");

        let mut stderr = lock(&self.stderr);
        stderr.push_str(line);
        stderr.push_str(LINE_SEPARATOR);
    }

    /// Deliver the buffered output of the current round, at most once.
    fn resolve_round(&self) {
        if self
            .awaiting
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.watchdog.stop();

        if self.stopped() {
            return;
        }

        let (output, errors) = {
            let mut stdout = lock(&self.stdout);
            let mut stderr = lock(&self.stderr);
            (std::mem::take(&mut *stdout), std::mem::take(&mut *stderr))
        };

        if !errors.is_empty() {
            if !output.is_empty() {
                debug!(data = %output, "Dropping stdout in favour of stderr");
            }
            lock(&self.machine).process_error(&errors);
            return;
        }

        let progress = lock(&self.machine).process_output(&output);
        if progress == Progress::Pending {
            self.reopen_round();
        }
    }

    /// Keep the current round open after a partial delivery.
    ///
    /// Lines that arrived while the round was briefly closed were buffered
    /// without a trigger check, so the buffer is checked here.
    fn reopen_round(&self) {
        self.awaiting.store(true, Ordering::Release);
        self.watchdog.arm();

        let triggered = {
            let trigger = lock(&self.trigger);
            lock(&self.stdout)
                .lines()
                .any(|line| trigger.is_satisfied_by(line))
        };
        if triggered {
            self.resolve_round();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn read_stream<R>(shared: Arc<Shared>, reader: R, stream: Stream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let next = tokio::select! {
            () = shared.shutdown.cancelled() => break,
            next = lines.next_line() => next,
        };

        match next {
            Ok(Some(line)) => {
                if shared.stopped() {
                    break;
                }
                match stream {
                    Stream::Stdout => shared.on_stdout_line(&line),
                    Stream::Stderr => shared.on_stderr_line(&line),
                }
            }
            Ok(None) => {
                debug!(?stream, "Console stream closed");
                break;
            }
            Err(err) => {
                warn!(?stream, error = %err, "Failed to read console stream");
                break;
            }
        }
    }
}

async fn run_watchdog(shared: Arc<Shared>) {
    loop {
        match shared.watchdog.deadline() {
            None => {
                tokio::select! {
                    () = shared.shutdown.cancelled() => break,
                    () = shared.watchdog.changed.notified() => {}
                }
            }
            Some(at) => {
                tokio::select! {
                    () = shared.shutdown.cancelled() => break,
                    () = shared.watchdog.changed.notified() => {}
                    () = tokio::time::sleep_until(at) => {
                        if shared.watchdog.expire() {
                            debug!("No console output within the interval");
                            shared.resolve_round();
                        }
                    }
                }
            }
        }
    }
    shared.watchdog.stop();
}
