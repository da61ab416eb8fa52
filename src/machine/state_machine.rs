//! Flow state machine
//!
//! Consumes one round of console output at a time, applies the parsing
//! rule of the current state and either advances along the flow's path,
//! finishes the flow, or fails it. Every decision resolves the completion
//! signal exactly once; a startup banner that has not been fully seen yet
//! is the only case that leaves the round open.

use tracing::{debug, error, trace, warn};

use crate::console::protocol::{
    filter_error, result_value, split_lines, COINS_LISTED_SUFFIX, ERROR_PREFIX,
    INVALID_MNEMONIC_PREFIX, SET_MNEMONIC_PREFIX, STARTUP_BANNER, STARTUP_PAYLOAD,
    VALID_ADDRESS_PREFIX,
};
use crate::error::{FlowError, StartFlowError};
use crate::machine::flow::{Flow, Rule, State};
use crate::machine::result::{CoinInfo, ConsoleResult};
use crate::machine::signal::{CompletionSignal, Round, RoundOutcome};

/// Whether a delivery completed the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The completion signal was resolved
    Signalled,
    /// The stage needs more output; the round is still open
    Pending,
}

/// Interprets console output for one session
#[derive(Debug)]
pub struct StateMachine {
    flow: Flow,
    state: State,
    banner_lines: usize,
    result: Option<ConsoleResult>,
    error: Option<FlowError>,
    signal: CompletionSignal,
}

impl StateMachine {
    /// Create an idle machine with no flow selected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flow: Flow::None,
            state: State::Idle,
            banner_lines: 0,
            result: None,
            error: None,
            signal: CompletionSignal::new(),
        }
    }

    /// Select the flow for the session and wait for the startup banner.
    ///
    /// # Errors
    ///
    /// Fails when the machine is in `Error` or still running another flow.
    pub fn expect(&mut self, flow: Flow) -> Result<(), StartFlowError> {
        match self.state {
            State::Idle => {}
            State::Error => return Err(StartFlowError::Failed),
            _ => return Err(StartFlowError::Busy(self.flow)),
        }

        if flow == Flow::None {
            return Ok(());
        }

        debug!(%flow, "Expecting flow");
        self.flow = flow;
        self.state = State::ApplicationStarting;
        self.banner_lines = 0;
        Ok(())
    }

    /// Currently selected flow
    #[must_use]
    pub const fn flow(&self) -> Flow {
        self.flow
    }

    /// Current stage
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Payload of the last successful round
    #[must_use]
    pub const fn result(&self) -> Option<&ConsoleResult> {
        self.result.as_ref()
    }

    /// Error that put the machine into `Error`
    #[must_use]
    pub const fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    /// Take the receiver for the current round; see [`CompletionSignal::subscribe`].
    pub fn subscribe(&mut self) -> Option<Round> {
        self.signal.subscribe()
    }

    /// Feed the primary-stream output of one round.
    ///
    /// `output` may be empty; that is what a silent round delivers when
    /// the watchdog fires.
    pub fn process_output(&mut self, output: &str) -> Progress {
        let lines = split_lines(output);
        trace!(state = %self.state, ?lines, "Processing output");

        let outcome = match self.state.rule() {
            Rule::Inactive => {
                warn!(data = output, "Output received while idle");
                Err(FlowError::UnexpectedResult)
            }
            Rule::Absorbing => {
                warn!(data = output, "Output received after failure, ignoring");
                let stored = self.error.clone().unwrap_or(FlowError::Internal);
                self.signal.resolve(Err(stored));
                return Progress::Signalled;
            }
            Rule::StartupBanner => match self.count_banner(&lines) {
                Some(outcome) => outcome,
                None => return Progress::Pending,
            },
            Rule::Acknowledge { prefix, payload } => {
                single_line(&lines).and_then(|line| {
                    if line.starts_with(prefix) {
                        Ok(ConsoleResult::text(payload))
                    } else {
                        Err(FlowError::Filtered(filter_error(line)))
                    }
                })
            }
            Rule::SetMnemonic => single_line(&lines).and_then(parse_set_mnemonic),
            Rule::CoinListing => parse_coin_listing(&lines),
            Rule::AddressCheck => single_line(&lines)
                .map(|line| ConsoleResult::boolean(line.starts_with(VALID_ADDRESS_PREFIX))),
            Rule::ResultLine => single_line(&lines).and_then(|line| {
                result_value(line)
                    .map(ConsoleResult::text)
                    .ok_or(FlowError::UnexpectedResult)
            }),
            Rule::LastResultLine => parse_last_result_line(&lines),
        };

        self.complete(outcome);
        Progress::Signalled
    }

    /// Feed error-stream output. Always fails the flow.
    pub fn process_error(&mut self, output: &str) {
        error!(state = %self.state, data = output, "Console wrote to stderr");
        self.fail(FlowError::Internal);
    }

    fn count_banner(&mut self, lines: &[&str]) -> Option<RoundOutcome> {
        if lines.is_empty() {
            return Some(Err(FlowError::NoData));
        }

        for line in lines {
            if STARTUP_BANNER.iter().any(|prefix| line.starts_with(prefix)) {
                debug!(line, "Banner line");
                self.banner_lines += 1;
            } else {
                warn!(line, "Unexpected line while starting");
            }
        }

        if self.banner_lines < STARTUP_BANNER.len() {
            debug!(seen = self.banner_lines, "Banner incomplete");
            return None;
        }
        if self.banner_lines > STARTUP_BANNER.len() {
            warn!(seen = self.banner_lines, ?lines, "More banner lines than expected");
        }

        Some(Ok(ConsoleResult::text(STARTUP_PAYLOAD)))
    }

    fn complete(&mut self, outcome: RoundOutcome) {
        match outcome {
            Ok(result) => self.advance(result),
            Err(err) => self.fail(err),
        }
    }

    fn advance(&mut self, result: ConsoleResult) {
        let Some(next) = self.flow.next_state(self.state) else {
            error!(flow = %self.flow, state = %self.state, "State is not on the flow's path");
            self.fail(FlowError::Internal);
            return;
        };

        debug!(flow = %self.flow, from = %self.state, to = %next, "Stage complete");
        self.state = next;
        if next == State::Idle {
            self.flow = Flow::None;
        }

        self.result = Some(result.clone());
        self.signal.resolve(Ok(result));
    }

    fn fail(&mut self, err: FlowError) {
        warn!(flow = %self.flow, state = %self.state, error = %err, "Flow failed");
        self.state = State::Error;
        self.error = Some(err.clone());
        self.signal.resolve(Err(err));
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn single_line<'a>(lines: &[&'a str]) -> Result<&'a str, FlowError> {
    match lines {
        [] => Err(FlowError::NoData),
        [line] => Ok(line),
        _ => Err(FlowError::TooManyLines),
    }
}

fn parse_set_mnemonic(line: &str) -> RoundOutcome {
    if line.starts_with(SET_MNEMONIC_PREFIX) {
        Ok(ConsoleResult::text(SET_MNEMONIC_PREFIX))
    } else if line.starts_with(INVALID_MNEMONIC_PREFIX) {
        Err(FlowError::InvalidMnemonic)
    } else if line.starts_with(ERROR_PREFIX) {
        Err(FlowError::Filtered(filter_error(line)))
    } else {
        Err(FlowError::UnexpectedResult)
    }
}

fn parse_coin_listing(lines: &[&str]) -> RoundOutcome {
    if lines.is_empty() {
        return Err(FlowError::NoData);
    }

    let coins = lines
        .iter()
        .filter(|line| !line.ends_with(COINS_LISTED_SUFFIX))
        .map(|line| CoinInfo::from_row(line))
        .collect();

    Ok(ConsoleResult::coins(coins))
}

// Success prints a path line before the result; failure prints only the
// error, so just the last line decides.
fn parse_last_result_line(lines: &[&str]) -> RoundOutcome {
    let last = match lines {
        [] => return Err(FlowError::NoData),
        [last] | [_, last] => *last,
        _ => return Err(FlowError::TooManyLines),
    };

    result_value(last)
        .map(ConsoleResult::text)
        .ok_or_else(|| FlowError::Filtered(filter_error(last)))
}
