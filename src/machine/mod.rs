//! Flow state machine
//!
//! This module holds the result model, the constant flow/state tables,
//! the per-round completion signal and the machine that ties them together.

pub mod flow;
pub mod result;
pub mod signal;
pub mod state_machine;

pub use flow::{Flow, State};
pub use result::{CoinInfo, ConsoleResult};
pub use signal::{Round, RoundOutcome};
pub use state_machine::{Progress, StateMachine};
