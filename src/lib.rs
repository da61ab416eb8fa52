//! walletconsole-bridge - request/response automation for the wallet console
//!
//! Drives the interactive Wallet-core console over its standard streams,
//! frames its free-text output into rounds and interprets each round with
//! a per-flow state machine, turning prompt-driven sessions into typed
//! results or structured errors.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod cli;
pub mod config;
pub mod console;
pub mod doctor;
pub mod error;
pub mod log;
pub mod machine;
pub mod session;

// Re-export commonly used types
pub use config::{BridgeConfig, ConsoleConfig};
pub use console::{ConsoleCommand, ProcessListener, Trigger};
pub use error::{BridgeError, FlowError, StartFlowError};
pub use machine::{CoinInfo, ConsoleResult, Flow, State, StateMachine};
pub use session::operation::run;
pub use session::{Operation, Session};
