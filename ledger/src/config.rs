//! Ledger configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a [`BountyLedger`](crate::BountyLedger).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// When set, `accept_fulfilment` also fails with `DeadlinePassed` once the
    /// bounty's deadline is reached. Off by default: only `fulfil` is gated.
    #[serde(default)]
    pub deadline_gates_acceptance: bool,

    /// Buffer size of the broadcast channel handed out by `EventBus::channel`.
    /// Slow receivers that fall further behind than this miss events.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_event_channel_capacity() -> usize {
    256
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            deadline_gates_acceptance: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}
