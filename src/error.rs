//! Error types for the bridge
//!
//! `FlowError` covers everything the wallet console itself can get wrong
//! (content errors); its `Display` output is the exact message handed to
//! callers. `BridgeError` wraps it together with infrastructure and
//! caller-side failures.

use std::path::PathBuf;

use crate::machine::flow::Flow;

/// Content-level failure of a round, decided by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// The round produced no usable lines
    #[error("No data")]
    NoData,

    /// The round produced more lines than the stage accepts
    #[error("Too many lines")]
    TooManyLines,

    /// Output was present but did not match the stage's rule
    #[error("Unexpected result")]
    UnexpectedResult,

    /// The console rejected the command; carries its message with the
    /// error prefix removed
    #[error("{0}")]
    Filtered(String),

    /// `setMnemonic` was given a phrase that fails checksum validation
    #[error("Not a valid mnemonic")]
    InvalidMnemonic,

    /// Something was written to the console's error stream
    #[error("Internal error")]
    Internal,
}

/// Returned when a flow cannot be started on a state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartFlowError {
    /// The machine already failed; sessions are not reusable after that
    #[error("State machine is in failed state")]
    Failed,

    /// Another flow has not reached Idle yet
    #[error("Already processing {0}")]
    Busy(Flow),
}

/// Top-level error type for sessions and operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Content error decided by the state machine
    #[error("{0}")]
    Flow(#[from] FlowError),

    /// The configured executable does not exist
    #[error("WalletConsole executable not found at '{}'", .0.display())]
    ProcessUnavailable(PathBuf),

    /// The executable exists but could not be spawned
    #[error("Failed to start WalletConsole process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The caller abandoned the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// A command was posted while a round was still outstanding
    #[error("Already processing a command")]
    RoundOutstanding,

    /// A command was posted after the session entered Error
    #[error("Session is in failed state")]
    SessionFailed,

    /// The requested flow could not be started
    #[error(transparent)]
    StartFlow(#[from] StartFlowError),

    /// Caller input failed validation
    #[error("{0}")]
    InvalidRequest(String),

    /// The completion signal was dropped without a value
    #[error("Console session closed before the command completed")]
    Disconnected,
}

impl BridgeError {
    /// True for failures reported by the wallet console or the caller's
    /// input, as opposed to infrastructure problems and cancellation.
    #[must_use]
    pub const fn is_content_error(&self) -> bool {
        matches!(self, Self::Flow(_) | Self::InvalidRequest(_))
    }

    /// Shorthand for an input validation failure
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_messages_are_caller_facing() {
        assert_eq!(FlowError::NoData.to_string(), "No data");
        assert_eq!(FlowError::TooManyLines.to_string(), "Too many lines");
        assert_eq!(FlowError::UnexpectedResult.to_string(), "Unexpected result");
        assert_eq!(FlowError::InvalidMnemonic.to_string(), "Not a valid mnemonic");
        assert_eq!(FlowError::Internal.to_string(), "Internal error");
        assert_eq!(
            FlowError::Filtered("Invalid component".to_string()).to_string(),
            "Invalid component"
        );
    }

    #[test]
    fn test_bridge_error_passes_flow_message_through() {
        let err = BridgeError::from(FlowError::InvalidMnemonic);
        assert_eq!(err.to_string(), "Not a valid mnemonic");
        assert!(err.is_content_error());
    }

    #[test]
    fn test_infrastructure_errors_are_not_content_errors() {
        assert!(!BridgeError::ProcessUnavailable(PathBuf::from("x")).is_content_error());
        assert!(!BridgeError::Cancelled.is_content_error());
        assert!(!BridgeError::RoundOutstanding.is_content_error());
    }

    #[test]
    fn test_start_flow_busy_names_the_flow() {
        let err = StartFlowError::Busy(Flow::ListCoins);
        assert_eq!(err.to_string(), "Already processing ListCoins");
    }
}
