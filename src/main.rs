//! wcbridge - wallet console bridge
//!
//! CLI entry point: one subcommand per operation, JSON result on stdout.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use walletconsole_bridge::cli::{error_json, print_diagnostic_report, print_error, result_json};
use walletconsole_bridge::config::{BridgeConfig, DEFAULT_CONFIG_FILE};
use walletconsole_bridge::doctor::diagnose_live;
use walletconsole_bridge::session::operation::DEFAULT_STRENGTH;
use walletconsole_bridge::{log, run, BridgeError, Operation};

/// Request/response bridge for the Wallet-core console
///
/// Starts a fresh console per invocation, runs one operation against it
/// and prints the result as JSON.
#[derive(Parser, Debug)]
#[command(name = "wcbridge", version, about)]
struct Cli {
    /// Path to the walletconsole.toml configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Wallet console executable, overriding the config file
    #[arg(long, global = true)]
    executable: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the mnemonic generated at console startup
    Mnemonic,
    /// Generate a new mnemonic
    NewMnemonic {
        /// Entropy in bits: 128 to 256, multiple of 32
        #[arg(long, default_value_t = DEFAULT_STRENGTH)]
        strength: u32,
    },
    /// Seed for a mnemonic
    Seed {
        /// Mnemonic phrase; read from stdin when omitted
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// List supported coins
    Coins,
    /// Check whether an address is valid for a coin
    CheckAddress {
        /// Coin id, e.g. bitcoin
        coin: String,
        /// Address to check
        address: String,
    },
    /// Default derivation path of a coin
    DerivationPath {
        /// Coin id
        coin: String,
    },
    /// Extended public key for a mnemonic
    Xpub {
        /// Coin id
        coin: String,
        /// Mnemonic phrase; read from stdin when omitted
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// Default address for a mnemonic
    DefaultAddress {
        /// Coin id
        coin: String,
        /// Mnemonic phrase; read from stdin when omitted
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// Private key for a mnemonic
    DerivePrivateKey {
        /// Coin id
        coin: String,
        /// Derivation path; the coin's default when omitted
        #[arg(long)]
        derivation_path: Option<String>,
        /// Mnemonic phrase; read from stdin when omitted
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// Public key for a private key
    PublicKey {
        /// Coin id
        coin: String,
        /// Hex private key
        #[arg(long)]
        private_key: String,
    },
    /// Address for a private key
    Address {
        /// Coin id
        coin: String,
        /// Hex private key
        #[arg(long)]
        private_key: String,
    },
    /// Address at a derivation path
    DeriveAddress {
        /// Coin id
        coin: String,
        /// Derivation path
        #[arg(long)]
        derivation_path: String,
        /// Mnemonic phrase; read from stdin when omitted
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// Check the configuration and probe the console
    Doctor,
}

/// Use the flag value, or the first line of `input`.
fn resolve_mnemonic(flag: Option<String>, input: impl BufRead) -> Result<String> {
    if let Some(mnemonic) = flag {
        return Ok(mnemonic);
    }

    let line = input
        .lines()
        .next()
        .transpose()
        .context("Failed to read mnemonic from stdin")?
        .unwrap_or_default();
    Ok(line.trim().to_string())
}

impl Command {
    /// Build the operation, reading a missing mnemonic from `input`.
    ///
    /// Returns `None` for `doctor`.
    fn into_operation(self, input: impl BufRead) -> Result<Option<Operation>> {
        let operation = match self {
            Self::Doctor => return Ok(None),
            Self::Mnemonic => Operation::DumpMnemonic,
            Self::NewMnemonic { strength } => Operation::NewMnemonic { strength },
            Self::Seed { mnemonic } => Operation::Seed {
                mnemonic: resolve_mnemonic(mnemonic, input)?,
            },
            Self::Coins => Operation::ListCoins,
            Self::CheckAddress { coin, address } => Operation::CheckAddress { coin, address },
            Self::DerivationPath { coin } => Operation::DerivationPath { coin },
            Self::Xpub { coin, mnemonic } => Operation::XPub {
                coin,
                mnemonic: resolve_mnemonic(mnemonic, input)?,
            },
            Self::DefaultAddress { coin, mnemonic } => Operation::DefaultAddress {
                coin,
                mnemonic: resolve_mnemonic(mnemonic, input)?,
            },
            Self::DerivePrivateKey {
                coin,
                derivation_path,
                mnemonic,
            } => Operation::DerivePrivateKey {
                coin,
                mnemonic: resolve_mnemonic(mnemonic, input)?,
                derivation_path,
            },
            Self::PublicKey { coin, private_key } => Operation::PublicKey { coin, private_key },
            Self::Address { coin, private_key } => Operation::Address { coin, private_key },
            Self::DeriveAddress {
                coin,
                derivation_path,
                mnemonic,
            } => Operation::DeriveAddress {
                coin,
                mnemonic: resolve_mnemonic(mnemonic, input)?,
                derivation_path,
            },
        };
        Ok(Some(operation))
    }
}

/// Process exit code for a failed operation.
const fn exit_code_for(err: &BridgeError) -> u8 {
    if err.is_content_error() {
        1
    } else if matches!(err, BridgeError::Cancelled) {
        130
    } else {
        2
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let mut config = BridgeConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from '{}'", cli.config.display()))?;
    if let Some(executable) = cli.executable {
        config.console.executable = executable;
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let Some(operation) = cli.command.into_operation(std::io::stdin().lock())? else {
        let report = diagnose_live(&config.console, cancel).await;
        print_diagnostic_report(&report);
        return Ok(if report.error_count() > 0 {
            ExitCode::from(2)
        } else {
            ExitCode::SUCCESS
        });
    };

    match run(&config.console, &operation, cancel).await {
        Ok(result) => {
            println!("{}", result_json(&result));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", error_json(&err));
            print_error(&err);
            Ok(ExitCode::from(exit_code_for(&err)))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    log::init(cli.verbose);

    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "fatal:".red().bold());
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use walletconsole_bridge::FlowError;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("wcbridge").chain(args.iter().copied())).unwrap()
    }

    fn operation(args: &[&str], stdin: &str) -> Option<Operation> {
        parse(args)
            .command
            .into_operation(Cursor::new(stdin.to_string()))
            .unwrap()
    }

    #[test]
    fn test_global_defaults() {
        let cli = parse(&["coins"]);
        assert_eq!(cli.config, PathBuf::from("walletconsole.toml"));
        assert!(cli.executable.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["coins", "-vv", "--executable", "/opt/wc"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.executable, Some(PathBuf::from("/opt/wc")));
    }

    #[test]
    fn test_new_mnemonic_default_strength() {
        assert_eq!(
            operation(&["new-mnemonic"], ""),
            Some(Operation::NewMnemonic { strength: 128 })
        );
        assert_eq!(
            operation(&["new-mnemonic", "--strength", "256"], ""),
            Some(Operation::NewMnemonic { strength: 256 })
        );
    }

    #[test]
    fn test_mnemonic_flag_wins_over_stdin() {
        assert_eq!(
            operation(&["seed", "--mnemonic", "from flag"], "from stdin\n"),
            Some(Operation::Seed {
                mnemonic: "from flag".to_string()
            })
        );
    }

    #[test]
    fn test_mnemonic_read_from_first_stdin_line() {
        assert_eq!(
            operation(&["xpub", "bitcoin"], "  word word word  \nignored\n"),
            Some(Operation::XPub {
                coin: "bitcoin".to_string(),
                mnemonic: "word word word".to_string()
            })
        );
    }

    #[test]
    fn test_empty_stdin_gives_empty_mnemonic() {
        assert_eq!(
            operation(&["seed"], ""),
            Some(Operation::Seed {
                mnemonic: String::new()
            })
        );
    }

    #[test]
    fn test_derive_commands() {
        assert_eq!(
            operation(&["derive-private-key", "bitcoin", "--mnemonic", "m"], ""),
            Some(Operation::DerivePrivateKey {
                coin: "bitcoin".to_string(),
                mnemonic: "m".to_string(),
                derivation_path: None,
            })
        );
        assert_eq!(
            operation(
                &["derive-address", "bitcoin", "--derivation-path", "m/84'/0'/0'/0/1", "--mnemonic", "m"],
                ""
            ),
            Some(Operation::DeriveAddress {
                coin: "bitcoin".to_string(),
                mnemonic: "m".to_string(),
                derivation_path: "m/84'/0'/0'/0/1".to_string(),
            })
        );
    }

    #[test]
    fn test_private_key_commands_require_flag() {
        let cli = Cli::try_parse_from(["wcbridge", "public-key", "bitcoin"]);
        assert!(cli.is_err());

        assert_eq!(
            operation(&["address", "ethereum", "--private-key", "c305"], ""),
            Some(Operation::Address {
                coin: "ethereum".to_string(),
                private_key: "c305".to_string(),
            })
        );
    }

    #[test]
    fn test_doctor_has_no_operation() {
        assert_eq!(operation(&["doctor"], ""), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&BridgeError::from(FlowError::NoData)), 1);
        assert_eq!(exit_code_for(&BridgeError::invalid("CoinId must be provided")), 1);
        assert_eq!(exit_code_for(&BridgeError::Cancelled), 130);
        assert_eq!(
            exit_code_for(&BridgeError::ProcessUnavailable(PathBuf::from("x"))),
            2
        );
        assert_eq!(exit_code_for(&BridgeError::RoundOutstanding), 2);
    }
}
