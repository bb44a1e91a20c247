//! Fundamental types for the bounty ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identities, amounts, timestamps, entity identifiers, escrow handles, and the
//! bounty/fulfilment records themselves.

pub mod amount;
pub mod bounty;
pub mod error;
pub mod escrow;
pub mod identity;
pub mod ids;
pub mod time;

pub use amount::Amount;
pub use bounty::{Bounty, BountyRecord, BountyStatus, Fulfilment};
pub use error::TypeError;
pub use escrow::{EscrowHandle, EscrowId};
pub use identity::Identity;
pub use ids::{BountyId, FulfilmentId};
pub use time::{Clock, SystemClock, Timestamp};
