//! Single-use completion signal
//!
//! Each round gets exactly one resolution. Resolving swaps in a fresh
//! channel before sending, so the next round's subscriber never sees a
//! stale value.

use tokio::sync::oneshot;

use crate::error::FlowError;
use crate::machine::result::ConsoleResult;

/// Outcome of one round as decided by the state machine
pub type RoundOutcome = Result<ConsoleResult, FlowError>;

/// Receiving half handed to whoever awaits a round
pub type Round = oneshot::Receiver<RoundOutcome>;

/// One-shot completion primitive, replaced after each resolution
#[derive(Debug)]
pub struct CompletionSignal {
    sender: oneshot::Sender<RoundOutcome>,
    receiver: Option<Round>,
}

impl CompletionSignal {
    /// Create an unresolved signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    /// Take the receiver for the current round.
    ///
    /// Returns `None` if it was already taken; there is only one waiter
    /// per round.
    pub fn subscribe(&mut self) -> Option<Round> {
        self.receiver.take()
    }

    /// Resolve the current round and arm a fresh signal for the next one.
    ///
    /// Returns false when nobody was listening; the outcome is dropped.
    pub fn resolve(&mut self, outcome: RoundOutcome) -> bool {
        let (sender, receiver) = oneshot::channel();
        let previous = std::mem::replace(&mut self.sender, sender);
        self.receiver = Some(receiver);
        previous.send(outcome).is_ok()
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_to_subscriber() {
        let mut signal = CompletionSignal::new();
        let round = signal.subscribe().unwrap();

        assert!(signal.resolve(Ok(ConsoleResult::text("Coin set"))));
        assert_eq!(round.await.unwrap(), Ok(ConsoleResult::text("Coin set")));
    }

    #[test]
    fn test_subscribe_is_single_use_per_round() {
        let mut signal = CompletionSignal::new();
        assert!(signal.subscribe().is_some());
        assert!(signal.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_resolve_rearms_for_next_round() {
        let mut signal = CompletionSignal::new();
        let first = signal.subscribe().unwrap();
        signal.resolve(Err(FlowError::NoData));

        let second = signal.subscribe().unwrap();
        signal.resolve(Ok(ConsoleResult::boolean(true)));

        assert_eq!(first.await.unwrap(), Err(FlowError::NoData));
        assert_eq!(second.await.unwrap(), Ok(ConsoleResult::boolean(true)));
    }

    #[test]
    fn test_resolve_without_listener_reports_dropped() {
        let mut signal = CompletionSignal::new();
        drop(signal.subscribe());
        assert!(!signal.resolve(Err(FlowError::Internal)));
    }

    #[tokio::test]
    async fn test_resolve_before_subscribe_is_not_lost() {
        let mut signal = CompletionSignal::new();
        let round = signal.subscribe().unwrap();
        signal.resolve(Ok(ConsoleResult::text("early")));
        // Awaiting after the fact still yields the value
        assert_eq!(round.await.unwrap(), Ok(ConsoleResult::text("early")));
    }
}
