//! Wallet console text protocol
//!
//! The console has no framing: every answer is free text recognised by
//! its prefix. This module holds those prefixes, the prompt noise that
//! has to be stripped from output lines, the trigger patterns that end a
//! round, and builders for the commands the bridge is allowed to send.
//!
//! `fileW` and `fileR` are not part of the command
//! vocabulary: they read and write the host filesystem.

/// Startup banner prefixes; all four must be seen before the console is ready.
pub const STARTUP_BANNER: [&str; 4] = [
    "Wallet-core Console",
    "Type 'help'",
    "Loading coins ...",
    SET_COIN_PREFIX,
];

/// Payload reported once the banner is complete.
pub const STARTUP_PAYLOAD: &str = "WalletConsole utility started";

/// Interactive prompt printed before each command is read.
pub const INPUT_PROMPT: &str = "> ";

/// Line separator used to split round output.
pub const LINE_SEPARATOR: &str = "\n";

/// Prefix of single-value answers.
pub const RESULT_PREFIX: &str = "Result:";

/// Generic error prefix.
pub const ERROR_PREFIX: &str = "Error:";

/// Prefix used when the console refuses to run a command.
pub const COMMAND_ERROR_PREFIX: &str = "Error while executing command,";

/// Answer to `coin <id>`; also the last banner line.
pub const SET_COIN_PREFIX: &str = "Set active coin to:";

/// Answer to `setMnemonic` for an accepted phrase.
pub const SET_MNEMONIC_PREFIX: &str = "Mnemonic set";

/// Answer to `setMnemonic` for a phrase with a bad checksum.
pub const INVALID_MNEMONIC_PREFIX: &str = "Not a valid mnemonic";

/// Answer to `newMnemonic`.
pub const CREATE_MNEMONIC_PREFIX: &str = "New mnemonic set";

/// Answer to `addr` for a valid address.
pub const VALID_ADDRESS_PREFIX: &str = "Address is a valid";

/// Suffix of the summary line closing the `coins` listing.
pub const COINS_LISTED_SUFFIX: &str = "coins listed.";

/// Remove prompt noise from the start of an output line.
///
/// The prompt is printed without a newline, so it ends up glued to the
/// front of the next answer, sometimes more than once. Leading line
/// separators are stripped in the same loop.
// The separator strip mirrors the console's own echo handling and may be
// redundant once lines are split by the reader; kept until a console
// build is seen that never emits it.
#[must_use]
pub fn strip_prompt_noise(line: &str) -> &str {
    let mut rest = line;
    loop {
        if let Some(stripped) = rest.strip_prefix(INPUT_PROMPT) {
            rest = stripped;
            continue;
        }
        if let Some(stripped) = rest.strip_prefix(LINE_SEPARATOR) {
            rest = stripped;
            continue;
        }
        return rest;
    }
}

/// Split round output into trimmed, non-empty lines.
#[must_use]
pub fn split_lines(output: &str) -> Vec<&str> {
    output
        .split(LINE_SEPARATOR)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Value of a `Result:` line, if `line` is one.
#[must_use]
pub fn result_value(line: &str) -> Option<&str> {
    line.strip_prefix(RESULT_PREFIX).map(str::trim)
}

/// Strip the console's error prefixes from a rejection message.
///
/// `Error: invalid component` becomes `Invalid component`;
/// `Error while executing command, <reason>` becomes `<reason>`; any
/// other message is returned unchanged.
#[must_use]
pub fn filter_error(line: &str) -> String {
    let mut message = line.to_string();

    if let Some(rest) = message.strip_prefix(ERROR_PREFIX) {
        message = capitalize(rest.trim());
    }

    if let Some(rest) = message.strip_prefix(COMMAND_ERROR_PREFIX) {
        message = rest.trim().to_string();
    }

    message
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// What ends a round before the watchdog does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Nothing does; the round always waits for the watchdog
    Timeout,
    /// The first non-blank line
    FirstLine,
    /// A line starting or ending with the pattern
    Matching(String),
}

impl Trigger {
    /// Trigger for the startup round: the last banner line.
    #[must_use]
    pub fn startup() -> Self {
        Self::Matching(SET_COIN_PREFIX.to_string())
    }

    /// Returns true when `line` completes the round.
    #[must_use]
    pub fn is_satisfied_by(&self, line: &str) -> bool {
        match self {
            Self::Timeout => false,
            Self::FirstLine => true,
            Self::Matching(pattern) => line.starts_with(pattern) || line.ends_with(pattern),
        }
    }
}

/// A command line for the console plus the trigger ending its round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleCommand {
    /// Text written to stdin, without the line terminator
    pub text: String,
    /// Trigger armed for the round
    pub trigger: Trigger,
}

impl ConsoleCommand {
    fn new(text: String, trigger: Trigger) -> Self {
        Self { text, trigger }
    }

    /// `coin <id>`
    #[must_use]
    pub fn coin(coin_id: &str) -> Self {
        Self::new(format!("coin {coin_id}"), Trigger::FirstLine)
    }

    /// `setMnemonic <phrase>`
    #[must_use]
    pub fn set_mnemonic(mnemonic: &str) -> Self {
        Self::new(format!("setMnemonic {mnemonic}"), Trigger::FirstLine)
    }

    /// `dumpMnemonic`
    #[must_use]
    pub fn dump_mnemonic() -> Self {
        Self::new("dumpMnemonic".to_string(), Trigger::FirstLine)
    }

    /// `newMnemonic <strength>`
    #[must_use]
    pub fn new_mnemonic(strength: u32) -> Self {
        Self::new(format!("newMnemonic {strength}"), Trigger::FirstLine)
    }

    /// `coins`; the round ends on the summary line.
    #[must_use]
    pub fn list_coins() -> Self {
        Self::new(
            "coins".to_string(),
            Trigger::Matching(COINS_LISTED_SUFFIX.to_string()),
        )
    }

    /// `addr <address>`
    #[must_use]
    pub fn check_address(address: &str) -> Self {
        Self::new(format!("addr {address}"), Trigger::FirstLine)
    }

    /// `dumpDP`
    #[must_use]
    pub fn dump_derivation_path() -> Self {
        Self::new("dumpDP".to_string(), Trigger::FirstLine)
    }

    /// `dumpSeed`
    #[must_use]
    pub fn dump_seed() -> Self {
        Self::new("dumpSeed".to_string(), Trigger::FirstLine)
    }

    /// `dumpXpub`
    #[must_use]
    pub fn dump_xpub() -> Self {
        Self::new("dumpXpub".to_string(), Trigger::FirstLine)
    }

    /// `addrDefault`
    #[must_use]
    pub fn default_address() -> Self {
        Self::new("addrDefault".to_string(), Trigger::FirstLine)
    }

    /// `priDP [path]`. Succeeds with two lines and fails with one, so the
    /// round waits for the `Result:` line.
    #[must_use]
    pub fn derive_private_key(derivation_path: Option<&str>) -> Self {
        let text = match derivation_path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => format!("priDP {path}"),
            None => "priDP".to_string(),
        };
        Self::new(text, Trigger::Matching(RESULT_PREFIX.to_string()))
    }

    /// `pubPri <privateKey>`
    #[must_use]
    pub fn public_key(private_key: &str) -> Self {
        Self::new(
            format!("pubPri {private_key}"),
            Trigger::Matching(RESULT_PREFIX.to_string()),
        )
    }

    /// `addrPri <privateKey>`
    #[must_use]
    pub fn address(private_key: &str) -> Self {
        Self::new(format!("addrPri {private_key}"), Trigger::FirstLine)
    }

    /// `addrDP <path>`
    #[must_use]
    pub fn derive_address(derivation_path: &str) -> Self {
        Self::new(
            format!("addrDP {derivation_path}"),
            Trigger::Matching(RESULT_PREFIX.to_string()),
        )
    }
}
