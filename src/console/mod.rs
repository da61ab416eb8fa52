//! Wallet console process handling
//!
//! This module handles the console's text protocol, spawning and killing
//! the process, and framing its output into rounds.

pub mod listener;
pub mod process;
pub mod protocol;

pub use listener::ProcessListener;
pub use protocol::{ConsoleCommand, Trigger};
