//! Caller-facing operations
//!
//! Each operation maps to one flow and a fixed command sequence. Input is
//! validated before anything is spawned; the payload of the last round is
//! the operation's result.

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::ConsoleConfig;
use crate::console::protocol::ConsoleCommand;
use crate::error::BridgeError;
use crate::machine::flow::Flow;
use crate::machine::result::ConsoleResult;
use crate::session::Session;

/// Strength used by `newMnemonic` when the caller gives none
pub const DEFAULT_STRENGTH: u32 = 128;

/// A request against the wallet console
#[derive(Clone, PartialEq, Eq)]
pub enum Operation {
    /// Print the mnemonic the console generated at startup
    DumpMnemonic,
    /// Generate a mnemonic of the given strength in bits
    NewMnemonic {
        /// 128..=256, multiple of 32
        strength: u32,
    },
    /// Seed for a mnemonic
    Seed {
        /// BIP39 phrase
        mnemonic: String,
    },
    /// All supported coins
    ListCoins,
    /// Whether an address is valid for a coin
    CheckAddress {
        /// Coin id
        coin: String,
        /// Address to check
        address: String,
    },
    /// Default derivation path of a coin
    DerivationPath {
        /// Coin id
        coin: String,
    },
    /// Extended public key
    XPub {
        /// Coin id
        coin: String,
        /// BIP39 phrase
        mnemonic: String,
    },
    /// Default address
    DefaultAddress {
        /// Coin id
        coin: String,
        /// BIP39 phrase
        mnemonic: String,
    },
    /// Private key at a derivation path, or at the coin's default one
    DerivePrivateKey {
        /// Coin id
        coin: String,
        /// BIP39 phrase
        mnemonic: String,
        /// Optional derivation path
        derivation_path: Option<String>,
    },
    /// Public key for a private key
    PublicKey {
        /// Coin id
        coin: String,
        /// Hex private key
        private_key: String,
    },
    /// Address for a private key
    Address {
        /// Coin id
        coin: String,
        /// Hex private key
        private_key: String,
    },
    /// Address at a derivation path
    DeriveAddress {
        /// Coin id
        coin: String,
        /// BIP39 phrase
        mnemonic: String,
        /// Derivation path
        derivation_path: String,
    },
}

// Operations carry secrets; only the flow is printed.
impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation({})", self.flow())
    }
}

fn require(value: &str, message: &str) -> Result<(), BridgeError> {
    if value.trim().is_empty() {
        Err(BridgeError::invalid(message))
    } else {
        Ok(())
    }
}

fn require_coin(coin: &str) -> Result<(), BridgeError> {
    require(coin, "CoinId must be provided")
}

fn require_mnemonic(mnemonic: &str) -> Result<(), BridgeError> {
    require(mnemonic, "Mnemonic must be provided")
}

fn require_private_key(private_key: &str) -> Result<(), BridgeError> {
    require(private_key, "Private Key must be provided")
}

impl Operation {
    /// Flow driven by this operation
    #[must_use]
    pub const fn flow(&self) -> Flow {
        match self {
            Self::DumpMnemonic => Flow::DumpMnemonic,
            Self::NewMnemonic { .. } => Flow::NewMnemonic,
            Self::Seed { .. } => Flow::DumpSeed,
            Self::ListCoins => Flow::ListCoins,
            Self::CheckAddress { .. } => Flow::CheckAddress,
            Self::DerivationPath { .. } => Flow::DerivationPath,
            Self::XPub { .. } => Flow::DumpXPub,
            Self::DefaultAddress { .. } => Flow::DefaultAddress,
            Self::DerivePrivateKey { .. } => Flow::DerivePrivateKey,
            Self::PublicKey { .. } => Flow::PublicKey,
            Self::Address { .. } => Flow::Address,
            Self::DeriveAddress { .. } => Flow::DeriveAddress,
        }
    }

    /// Check caller input.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` with the first failing check's message.
    pub fn validate(&self) -> Result<(), BridgeError> {
        match self {
            Self::DumpMnemonic | Self::ListCoins => Ok(()),
            Self::NewMnemonic { strength } => {
                if (128..=256).contains(strength) && strength % 32 == 0 {
                    Ok(())
                } else {
                    Err(BridgeError::invalid(
                        "Strength must be between 128 and 256, and multiple of 32",
                    ))
                }
            }
            Self::Seed { mnemonic } => require_mnemonic(mnemonic),
            Self::CheckAddress { coin, address } => {
                require_coin(coin)?;
                require(address, "Address must be provided")
            }
            Self::DerivationPath { coin } => require_coin(coin),
            Self::XPub { coin, mnemonic }
            | Self::DefaultAddress { coin, mnemonic }
            | Self::DerivePrivateKey { coin, mnemonic, .. } => {
                require_coin(coin)?;
                require_mnemonic(mnemonic)
            }
            Self::PublicKey { coin, private_key } | Self::Address { coin, private_key } => {
                require_coin(coin)?;
                require_private_key(private_key)
            }
            Self::DeriveAddress {
                coin,
                mnemonic,
                derivation_path,
            } => {
                require_coin(coin)?;
                require(derivation_path, "Derivation path must be provided")?;
                require_mnemonic(mnemonic)
            }
        }
    }

    /// Commands issued after the startup round, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<ConsoleCommand> {
        match self {
            Self::DumpMnemonic => vec![ConsoleCommand::dump_mnemonic()],
            Self::NewMnemonic { strength } => vec![
                ConsoleCommand::new_mnemonic(*strength),
                ConsoleCommand::dump_mnemonic(),
            ],
            Self::Seed { mnemonic } => vec![
                ConsoleCommand::set_mnemonic(mnemonic),
                ConsoleCommand::dump_seed(),
            ],
            Self::ListCoins => vec![ConsoleCommand::list_coins()],
            Self::CheckAddress { coin, address } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::check_address(address),
            ],
            Self::DerivationPath { coin } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::dump_derivation_path(),
            ],
            Self::XPub { coin, mnemonic } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::set_mnemonic(mnemonic),
                ConsoleCommand::dump_xpub(),
            ],
            Self::DefaultAddress { coin, mnemonic } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::set_mnemonic(mnemonic),
                ConsoleCommand::default_address(),
            ],
            Self::DerivePrivateKey {
                coin,
                mnemonic,
                derivation_path,
            } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::set_mnemonic(mnemonic),
                ConsoleCommand::derive_private_key(derivation_path.as_deref()),
            ],
            Self::PublicKey { coin, private_key } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::public_key(private_key),
            ],
            Self::Address { coin, private_key } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::address(private_key),
            ],
            Self::DeriveAddress {
                coin,
                mnemonic,
                derivation_path,
            } => vec![
                ConsoleCommand::coin(coin),
                ConsoleCommand::set_mnemonic(mnemonic),
                ConsoleCommand::derive_address(derivation_path),
            ],
        }
    }
}

/// Run `operation` in a fresh session.
///
/// # Errors
///
/// Validation errors before spawning, `ProcessUnavailable` for a missing
/// executable, and the first failing round's error afterwards.
#[instrument(skip_all, fields(flow = %operation.flow()))]
pub async fn run(
    config: &ConsoleConfig,
    operation: &Operation,
    cancel: CancellationToken,
) -> Result<ConsoleResult, BridgeError> {
    operation.validate()?;

    let mut session = Session::open(config, operation.flow(), cancel)?;
    let mut result = session.start().await?;

    for command in operation.commands() {
        result = session.send(&command).await?;
    }

    info!("Operation complete");
    Ok(result)
}
