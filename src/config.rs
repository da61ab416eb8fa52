//! Bridge configuration
//!
//! Parses `walletconsole.toml`. Every key is optional; a missing file
//! means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::console::process::debugger_attached;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "walletconsole.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Wallet console process settings
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Settings for spawning and reading the wallet console
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Path to the wallet console executable
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Watchdog interval in milliseconds (default: 1000)
    #[serde(default = "default_output_timeout_ms")]
    pub output_timeout_ms: u64,
    /// Watchdog interval while a debugger is attached (default: 30000)
    #[serde(default = "default_debugger_output_timeout_ms")]
    pub debugger_output_timeout_ms: u64,
}

fn default_executable() -> PathBuf {
    PathBuf::from("WalletConsole").join("walletconsole")
}

const fn default_output_timeout_ms() -> u64 {
    1000
}

const fn default_debugger_output_timeout_ms() -> u64 {
    30_000
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            output_timeout_ms: default_output_timeout_ms(),
            debugger_output_timeout_ms: default_debugger_output_timeout_ms(),
        }
    }
}

impl ConsoleConfig {
    /// Watchdog interval for this process, picking the debugger value
    /// when a tracer is attached.
    #[must_use]
    pub fn output_timeout(&self) -> Duration {
        if debugger_attached() {
            Duration::from_millis(self.debugger_output_timeout_ms)
        } else {
            Duration::from_millis(self.output_timeout_ms)
        }
    }
}

impl BridgeConfig {
    /// Parse a config file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Parse config content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse walletconsole.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.console.executable.as_os_str().is_empty() {
            bail!("console.executable cannot be empty");
        }
        if self.console.output_timeout_ms == 0 {
            bail!("console.output_timeout_ms must be greater than zero");
        }
        if self.console.debugger_output_timeout_ms == 0 {
            bail!("console.debugger_output_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}
