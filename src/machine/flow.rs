//! Flow and state tables
//!
//! A `Flow` is the task selected for a session; its `path` is the fixed
//! sequence of `State`s the console walks through. Each `State` carries
//! the parsing `Rule` applied to the output of its round. Both tables are
//! constant data; the state machine only ever reads them.

use std::fmt;

use crate::console::protocol::{CREATE_MNEMONIC_PREFIX, SET_COIN_PREFIX};

/// High-level task of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Nothing selected; the machine is idle
    None,
    /// Startup banner only. Used by diagnostics to probe the console.
    ApplicationStartup,
    /// ApplicationStarting -> SettingCoin -> GettingAddress
    Address,
    /// ApplicationStarting -> SettingCoin -> CheckingAddress
    CheckAddress,
    /// ApplicationStarting -> SettingCoin -> SettingMnemonic -> GettingDefaultAddress
    DefaultAddress,
    /// ApplicationStarting -> SettingCoin -> GettingDerivationPath
    DerivationPath,
    /// ApplicationStarting -> SettingCoin -> SettingMnemonic -> DerivingAddress
    DeriveAddress,
    /// ApplicationStarting -> SettingCoin -> SettingMnemonic -> DerivingPrivateKey
    DerivePrivateKey,
    /// ApplicationStarting -> DumpingMnemonic
    DumpMnemonic,
    /// ApplicationStarting -> SettingMnemonic -> DumpingSeed
    DumpSeed,
    /// ApplicationStarting -> SettingCoin -> SettingMnemonic -> DumpingXPub
    DumpXPub,
    /// ApplicationStarting -> SettingCoin -> GettingPublicKey
    PublicKey,
    /// ApplicationStarting -> ListingCoins
    ListCoins,
    /// ApplicationStarting -> CreatingMnemonic -> DumpingMnemonic
    NewMnemonic,
}

impl Flow {
    /// Every flow that does useful work, i.e. everything but `None`.
    pub const WORKING: [Self; 13] = [
        Self::ApplicationStartup,
        Self::Address,
        Self::CheckAddress,
        Self::DefaultAddress,
        Self::DerivationPath,
        Self::DeriveAddress,
        Self::DerivePrivateKey,
        Self::DumpMnemonic,
        Self::DumpSeed,
        Self::DumpXPub,
        Self::PublicKey,
        Self::ListCoins,
        Self::NewMnemonic,
    ];

    /// Ordered states visited by this flow before returning to Idle.
    #[must_use]
    pub const fn path(self) -> &'static [State] {
        match self {
            Self::None => &[],
            Self::ApplicationStartup => &[State::ApplicationStarting],
            Self::Address => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::GettingAddress,
            ],
            Self::CheckAddress => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::CheckingAddress,
            ],
            Self::DefaultAddress => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::SettingMnemonic,
                State::GettingDefaultAddress,
            ],
            Self::DerivationPath => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::GettingDerivationPath,
            ],
            Self::DeriveAddress => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::SettingMnemonic,
                State::DerivingAddress,
            ],
            Self::DerivePrivateKey => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::SettingMnemonic,
                State::DerivingPrivateKey,
            ],
            Self::DumpMnemonic => &[State::ApplicationStarting, State::DumpingMnemonic],
            Self::DumpSeed => &[
                State::ApplicationStarting,
                State::SettingMnemonic,
                State::DumpingSeed,
            ],
            Self::DumpXPub => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::SettingMnemonic,
                State::DumpingXPub,
            ],
            Self::PublicKey => &[
                State::ApplicationStarting,
                State::SettingCoin,
                State::GettingPublicKey,
            ],
            Self::ListCoins => &[State::ApplicationStarting, State::ListingCoins],
            Self::NewMnemonic => &[
                State::ApplicationStarting,
                State::CreatingMnemonic,
                State::DumpingMnemonic,
            ],
        }
    }

    /// State that follows `current` on this flow's path.
    ///
    /// The last state on the path is followed by `Idle`. Returns `None`
    /// when `current` is not on the path at all.
    #[must_use]
    pub fn next_state(self, current: State) -> Option<State> {
        let path = self.path();
        let position = path.iter().position(|state| *state == current)?;
        Some(path.get(position + 1).copied().unwrap_or(State::Idle))
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stage within a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Shared start and successful end of every flow
    Idle,
    /// Waiting for the startup banner
    ApplicationStarting,
    /// `addr <address>` issued
    CheckingAddress,
    /// `newMnemonic <strength>` issued
    CreatingMnemonic,
    /// `addrDP <path>` issued
    DerivingAddress,
    /// `priDP [path]` issued
    DerivingPrivateKey,
    /// `dumpMnemonic` issued
    DumpingMnemonic,
    /// `dumpSeed` issued
    DumpingSeed,
    /// `dumpXpub` issued
    DumpingXPub,
    /// `addrPri <key>` issued
    GettingAddress,
    /// `addrDefault` issued
    GettingDefaultAddress,
    /// `dumpDP` issued
    GettingDerivationPath,
    /// `pubPri <key>` issued
    GettingPublicKey,
    /// `coins` issued
    ListingCoins,
    /// `coin <id>` issued
    SettingCoin,
    /// `setMnemonic <phrase>` issued
    SettingMnemonic,
    /// A round failed. Nothing leaves this state.
    Error,
}

impl State {
    /// Parsing rule applied to a round delivered in this state.
    #[must_use]
    pub const fn rule(self) -> Rule {
        match self {
            Self::Idle => Rule::Inactive,
            Self::Error => Rule::Absorbing,
            Self::ApplicationStarting => Rule::StartupBanner,
            Self::CreatingMnemonic => Rule::Acknowledge {
                prefix: CREATE_MNEMONIC_PREFIX,
                payload: "Ok",
            },
            Self::SettingCoin => Rule::Acknowledge {
                prefix: SET_COIN_PREFIX,
                payload: "Coin set",
            },
            Self::SettingMnemonic => Rule::SetMnemonic,
            Self::ListingCoins => Rule::CoinListing,
            Self::CheckingAddress => Rule::AddressCheck,
            Self::DerivingPrivateKey | Self::GettingPublicKey => Rule::LastResultLine,
            Self::DumpingMnemonic
            | Self::GettingDerivationPath
            | Self::DumpingSeed
            | Self::DumpingXPub
            | Self::GettingDefaultAddress
            | Self::GettingAddress
            | Self::DerivingAddress => Rule::ResultLine,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a round's lines are interpreted in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// No flow is running; any output is unexpected
    Inactive,
    /// The session already failed; output is logged and dropped
    Absorbing,
    /// Count banner lines until all startup prefixes were seen
    StartupBanner,
    /// Exactly one line starting with `prefix`; anything else is a
    /// filtered console error
    Acknowledge {
        /// Expected line prefix
        prefix: &'static str,
        /// Success payload reported for the round
        payload: &'static str,
    },
    /// Exactly one `Mnemonic set` line, with special cases for rejected
    /// phrases
    SetMnemonic,
    /// Any number of tab-separated coin rows plus a summary line
    CoinListing,
    /// Exactly one line; validity is read from its prefix
    AddressCheck,
    /// Exactly one `Result:` line; anything else is unexpected
    ResultLine,
    /// The last of one or two lines must be a `Result:` line; anything
    /// else is a filtered console error
    LastResultLine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_working_flow_starts_with_application_starting() {
        for flow in Flow::WORKING {
            assert_eq!(
                flow.path().first(),
                Some(&State::ApplicationStarting),
                "{flow} should start with the banner"
            );
        }
    }

    #[test]
    fn test_none_flow_has_empty_path() {
        assert!(Flow::None.path().is_empty());
        assert_eq!(Flow::None.next_state(State::ApplicationStarting), None);
    }

    #[test]
    fn test_first_working_state_per_flow() {
        let first = |flow: Flow| flow.next_state(State::ApplicationStarting);

        assert_eq!(first(Flow::DumpMnemonic), Some(State::DumpingMnemonic));
        assert_eq!(first(Flow::ListCoins), Some(State::ListingCoins));
        assert_eq!(first(Flow::DumpSeed), Some(State::SettingMnemonic));
        assert_eq!(first(Flow::NewMnemonic), Some(State::CreatingMnemonic));
        assert_eq!(first(Flow::ApplicationStartup), Some(State::Idle));
        for flow in [
            Flow::CheckAddress,
            Flow::DerivationPath,
            Flow::DumpXPub,
            Flow::DefaultAddress,
            Flow::DerivePrivateKey,
            Flow::PublicKey,
            Flow::Address,
            Flow::DeriveAddress,
        ] {
            assert_eq!(first(flow), Some(State::SettingCoin), "{flow}");
        }
    }

    #[test]
    fn test_setting_coin_successors() {
        let after_coin = |flow: Flow| flow.next_state(State::SettingCoin);

        assert_eq!(after_coin(Flow::DerivationPath), Some(State::GettingDerivationPath));
        assert_eq!(after_coin(Flow::CheckAddress), Some(State::CheckingAddress));
        assert_eq!(after_coin(Flow::PublicKey), Some(State::GettingPublicKey));
        assert_eq!(after_coin(Flow::Address), Some(State::GettingAddress));
        assert_eq!(after_coin(Flow::DumpXPub), Some(State::SettingMnemonic));
        assert_eq!(after_coin(Flow::DeriveAddress), Some(State::SettingMnemonic));
    }

    #[test]
    fn test_setting_mnemonic_successors() {
        let after_mnemonic = |flow: Flow| flow.next_state(State::SettingMnemonic);

        assert_eq!(after_mnemonic(Flow::DumpSeed), Some(State::DumpingSeed));
        assert_eq!(after_mnemonic(Flow::DumpXPub), Some(State::DumpingXPub));
        assert_eq!(after_mnemonic(Flow::DefaultAddress), Some(State::GettingDefaultAddress));
        assert_eq!(after_mnemonic(Flow::DerivePrivateKey), Some(State::DerivingPrivateKey));
        assert_eq!(after_mnemonic(Flow::DeriveAddress), Some(State::DerivingAddress));
    }

    #[test]
    fn test_last_state_is_followed_by_idle() {
        for flow in Flow::WORKING {
            let last = *flow.path().last().unwrap();
            assert_eq!(flow.next_state(last), Some(State::Idle), "{flow}");
        }
    }

    #[test]
    fn test_state_off_path_has_no_successor() {
        assert_eq!(Flow::ListCoins.next_state(State::SettingCoin), None);
        assert_eq!(Flow::DumpSeed.next_state(State::Error), None);
    }

    #[test]
    fn test_no_path_contains_idle_or_error() {
        for flow in Flow::WORKING {
            assert!(!flow.path().contains(&State::Idle));
            assert!(!flow.path().contains(&State::Error));
        }
    }

    #[test]
    fn test_rules_for_result_states() {
        for state in [
            State::DumpingMnemonic,
            State::GettingDerivationPath,
            State::DumpingSeed,
            State::DumpingXPub,
            State::GettingDefaultAddress,
            State::GettingAddress,
            State::DerivingAddress,
        ] {
            assert_eq!(state.rule(), Rule::ResultLine, "{state}");
        }
        assert_eq!(State::DerivingPrivateKey.rule(), Rule::LastResultLine);
        assert_eq!(State::GettingPublicKey.rule(), Rule::LastResultLine);
        assert_eq!(State::Error.rule(), Rule::Absorbing);
    }
}
