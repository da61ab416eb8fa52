//! Wallet console session
//!
//! A `Session` is one console process, one state machine and one
//! listener, created per request and never reused. Dropping it kills the
//! process tree whatever the outcome was.

pub mod operation;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::config::ConsoleConfig;
use crate::console::process::{build_command, ensure_executable, kill_process_tree};
use crate::console::protocol::{ConsoleCommand, Trigger};
use crate::console::ProcessListener;
use crate::error::BridgeError;
use crate::machine::flow::{Flow, State};
use crate::machine::result::ConsoleResult;
use crate::machine::signal::Round;
use crate::machine::state_machine::StateMachine;

pub use operation::Operation;

/// One console process driven through one flow
pub struct Session {
    flow: Flow,
    executable: PathBuf,
    machine: Arc<Mutex<StateMachine>>,
    listener: ProcessListener,
    child: Option<Child>,
    cancel: CancellationToken,
}

impl Session {
    /// Prepare a session for `flow` without spawning anything yet.
    ///
    /// # Errors
    ///
    /// `ProcessUnavailable` when the executable is missing.
    pub fn open(
        config: &ConsoleConfig,
        flow: Flow,
        cancel: CancellationToken,
    ) -> Result<Self, BridgeError> {
        ensure_executable(&config.executable)?;

        let mut machine = StateMachine::new();
        machine.expect(flow)?;
        let machine = Arc::new(Mutex::new(machine));
        let listener = ProcessListener::new(Arc::clone(&machine), config.output_timeout(), &cancel);

        Ok(Self {
            flow,
            executable: config.executable.clone(),
            machine,
            listener,
            child: None,
            cancel,
        })
    }

    /// Spawn the console and wait for its startup banner.
    ///
    /// # Errors
    ///
    /// Spawn failures, cancellation, or the flow error of the startup round.
    pub async fn start(&mut self) -> Result<ConsoleResult, BridgeError> {
        let command = build_command(&self.executable);
        let (child, round) = self.listener.start(command, Trigger::startup())?;
        self.child = Some(child);

        let span = info_span!("round", flow = %self.flow, command = "startup");
        self.await_round(round).instrument(span).await
    }

    /// Issue one command and wait for its round to resolve.
    ///
    /// # Errors
    ///
    /// `SessionFailed` once the machine is in `Error`; otherwise the
    /// outcome of the round.
    pub async fn send(&mut self, command: &ConsoleCommand) -> Result<ConsoleResult, BridgeError> {
        if self.state() == State::Error {
            return Err(BridgeError::SessionFailed);
        }

        let round = self.listener.post_command(command)?;
        let verb = command.text.split_whitespace().next().unwrap_or_default();
        let span = info_span!("round", flow = %self.flow, command = verb);
        self.await_round(round).instrument(span).await
    }

    /// Current state of the session's machine
    #[must_use]
    pub fn state(&self) -> State {
        self.machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// Flow the session was opened for
    #[must_use]
    pub const fn flow(&self) -> Flow {
        self.flow
    }

    async fn await_round(&self, round: Round) -> Result<ConsoleResult, BridgeError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("Round cancelled");
                Err(BridgeError::Cancelled)
            }
            outcome = round => match outcome {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(err)) => Err(err.into()),
                Err(_) => Err(BridgeError::Disconnected),
            },
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.listener.shutdown();
        if let Some(mut child) = self.child.take() {
            kill_process_tree(&mut child);
        }
        debug!(flow = %self.flow, "Session closed");
    }
}
