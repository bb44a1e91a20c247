//! Bounty ledger engine.
//!
//! A bounty is a task posting that locks value in escrow until the issuer
//! either accepts one submitted fulfilment (paying its fulfiler) or cancels
//! (refunding the issuer). Each bounty moves through
//!
//! ```text
//! Open --accept_fulfilment--> Paid
//! Open --cancel_bounty------> Cancelled
//! ```
//!
//! and never leaves a terminal status. The ledger is generic over its
//! storage ([`bounty_store::BountyStore`]), its custody of value
//! ([`bounty_store::ValueTransfer`]) and its clock ([`bounty_types::Clock`]).

pub mod config;
pub mod error;
pub mod event;
pub mod ledger;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use event::{BountyEvent, EventBus};
pub use ledger::{BountyLedger, LedgerSummary};
