//! Events emitted after successful ledger operations.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use bounty_types::{Amount, BountyId, FulfilmentId, Identity};

/// Observable outcome of a successful state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BountyEvent {
    BountyIssued {
        bounty_id: BountyId,
        issuer: Identity,
        amount: Amount,
    },
    BountyFulfiled {
        bounty_id: BountyId,
        fulfiler: Identity,
        fulfilment_id: FulfilmentId,
    },
    FulfilmentAccepted {
        bounty_id: BountyId,
        issuer: Identity,
        fulfiler: Identity,
        fulfilment_id: FulfilmentId,
        amount: Amount,
    },
    BountyCancelled {
        bounty_id: BountyId,
        issuer: Identity,
        amount: Amount,
    },
}

impl BountyEvent {
    pub fn bounty_id(&self) -> BountyId {
        match self {
            Self::BountyIssued { bounty_id, .. }
            | Self::BountyFulfiled { bounty_id, .. }
            | Self::FulfilmentAccepted { bounty_id, .. }
            | Self::BountyCancelled { bounty_id, .. } => *bounty_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BountyIssued { .. } => "BountyIssued",
            Self::BountyFulfiled { .. } => "BountyFulfiled",
            Self::FulfilmentAccepted { .. } => "FulfilmentAccepted",
            Self::BountyCancelled { .. } => "BountyCancelled",
        }
    }
}

type Listener = Box<dyn Fn(&BountyEvent) + Send + Sync>;
type SharedListener = Arc<dyn Fn(&BountyEvent) + Send + Sync>;

/// Fan-out of ledger events.
///
/// Listeners run inline on the emitting thread, after the operation has
/// committed and the ledger lock is released. They run against a snapshot of
/// the listener list, so a listener may subscribe others; those see the next
/// event. A panicking listener is logged and skipped. Async consumers can take a broadcast receiver from
/// [`EventBus::channel`] instead.
pub struct EventBus {
    listeners: RwLock<Vec<SharedListener>>,
    sender: broadcast::Sender<BountyEvent>,
}

impl EventBus {
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub fn subscribe(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::from(listener));
    }

    /// A receiver for every event emitted from now on.
    pub fn channel(&self) -> broadcast::Receiver<BountyEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn emit(&self, event: &BountyEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(event = event.name(), "event listener panicked");
            }
        }
        // No receivers is not an error.
        let _ = self.sender.send(event.clone());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::LedgerConfig::default().event_channel_capacity)
    }
}
