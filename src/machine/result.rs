//! Result model for the flow state machine
//!
//! Every round either produces one of these values or a `FlowError`.
//! The serialized shape is what callers of the bridge see: success
//! payloads under `result`, failures under `error`.

use serde::{Deserialize, Serialize};

/// A single coin row from the console's `coins` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    /// Network ticker, e.g. `btc`
    pub network: String,
    /// Coin id accepted by the `coin` command, e.g. `bitcoin`
    pub id: String,
    /// Human-readable name with the console's quotes removed
    pub name: String,
}

impl CoinInfo {
    /// Parse one tab-separated listing row.
    ///
    /// Fields are trimmed and stripped of surrounding single quotes, so
    /// `btg\tbitcoingold\t'bitcoin gold'` becomes
    /// `("btg", "bitcoingold", "bitcoin gold")`. Missing fields are left
    /// empty rather than rejected.
    #[must_use]
    pub fn from_row(row: &str) -> Self {
        let mut fields = row.split('\t').map(|f| f.trim().trim_matches('\'').to_string());

        Self {
            network: fields.next().unwrap_or_default(),
            id: fields.next().unwrap_or_default(),
            name: fields.next().unwrap_or_default(),
        }
    }
}

/// Tagged result of a round or of a whole operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsoleResult {
    /// A single text value (mnemonic, seed, address, ...)
    Text {
        /// The value
        result: String,
    },
    /// A yes/no answer (address validity)
    Boolean {
        /// The value
        result: bool,
    },
    /// The coin listing
    Coins {
        /// All listed coins, in console order
        result: Vec<CoinInfo>,
    },
    /// A structured error as reported to callers
    Error {
        /// Caller-facing message
        error: String,
    },
}

impl ConsoleResult {
    /// Build a text result
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            result: value.into(),
        }
    }

    /// Build a boolean result
    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::Boolean { result: value }
    }

    /// Build a coin listing result
    #[must_use]
    pub const fn coins(coins: Vec<CoinInfo>) -> Self {
        Self::Coins { result: coins }
    }

    /// Build an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// The text payload, if this is a text result
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { result } => Some(result),
            _ => None,
        }
    }
}
