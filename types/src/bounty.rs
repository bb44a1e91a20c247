//! Bounty and fulfilment records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, BountyId, EscrowHandle, EscrowId, FulfilmentId, Identity, Timestamp};

/// Lifecycle status of a bounty.
///
/// `Open --accept--> Paid` and `Open --cancel--> Cancelled`; both targets are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BountyStatus {
    /// Accepting fulfilments; value is in escrow.
    Open,
    /// Withdrawn by the issuer; value returned to the issuer.
    Cancelled,
    /// A fulfilment was accepted; value paid to its fulfiler.
    Paid,
}

impl BountyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Cancelled => "cancelled",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A claim of completed work submitted against a bounty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfilment {
    /// The owning bounty.
    pub bounty_id: BountyId,
    /// Index within the owning bounty's fulfilment list.
    pub id: FulfilmentId,
    pub fulfiler: Identity,
    /// Opaque description of the submitted work.
    pub data: Vec<u8>,
    /// Set once, when the issuer accepts this fulfilment.
    pub accepted: bool,
    pub submitted_at: Timestamp,
}

/// An escrowed-value task posting with a deadline.
///
/// The stored form owns its [`EscrowHandle`]. Readers outside the ledger get a
/// [`BountyRecord`], which names the escrow entry but cannot release it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounty<E = EscrowHandle> {
    pub id: BountyId,
    pub issuer: Identity,
    /// Opaque description of the task.
    pub data: Vec<u8>,
    pub deadline: Timestamp,
    pub amount: Amount,
    pub status: BountyStatus,
    /// Append-only, indexed by submission order.
    pub fulfilments: Vec<Fulfilment>,
    pub created_at: Timestamp,
    /// When the bounty reached a terminal status.
    pub settled_at: Option<Timestamp>,
    /// The escrow claim; `Some` exactly while the bounty is open.
    pub escrow: Option<E>,
}

/// A bounty as seen by readers: the escrow claim is reduced to its id.
pub type BountyRecord = Bounty<EscrowId>;

impl Bounty {
    /// Build a freshly issued, open bounty holding `escrow`.
    pub fn open(
        id: BountyId,
        issuer: Identity,
        data: Vec<u8>,
        deadline: Timestamp,
        escrow: EscrowHandle,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            issuer,
            data,
            deadline,
            amount: escrow.amount(),
            status: BountyStatus::Open,
            fulfilments: Vec::new(),
            created_at,
            settled_at: None,
            escrow: Some(escrow),
        }
    }

    /// A handle-free copy of this bounty.
    pub fn record(&self) -> BountyRecord {
        Bounty {
            id: self.id,
            issuer: self.issuer.clone(),
            data: self.data.clone(),
            deadline: self.deadline,
            amount: self.amount,
            status: self.status,
            fulfilments: self.fulfilments.clone(),
            created_at: self.created_at,
            settled_at: self.settled_at,
            escrow: self.escrow.as_ref().map(EscrowHandle::id),
        }
    }
}

impl<E> Bounty<E> {
    pub fn is_open(&self) -> bool {
        self.status == BountyStatus::Open
    }

    /// Whether a fulfilment may be submitted at `now` (open and strictly before the deadline).
    pub fn can_fulfil(&self, now: Timestamp) -> bool {
        self.is_open() && now < self.deadline
    }

    pub fn fulfilment(&self, id: FulfilmentId) -> Option<&Fulfilment> {
        id.index().and_then(|i| self.fulfilments.get(i))
    }

    pub fn fulfilment_mut(&mut self, id: FulfilmentId) -> Option<&mut Fulfilment> {
        id.index().and_then(move |i| self.fulfilments.get_mut(i))
    }

    /// The id the next submitted fulfilment will receive.
    pub fn next_fulfilment_id(&self) -> FulfilmentId {
        FulfilmentId::new(self.fulfilments.len() as u64)
    }

    /// The accepted fulfilment, if the bounty has been paid.
    pub fn accepted_fulfilment(&self) -> Option<&Fulfilment> {
        self.fulfilments.iter().find(|f| f.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EscrowId;

    fn sample() -> Bounty {
        let issuer = Identity::new("alice");
        let escrow = EscrowHandle::new(EscrowId::new(0), issuer.clone(), Amount::new(10));
        Bounty::open(
            BountyId::new(0),
            issuer,
            b"task".to_vec(),
            Timestamp::new(200),
            escrow,
            Timestamp::new(100),
        )
    }

    #[test]
    fn open_bounty_takes_amount_from_escrow() {
        let b = sample();
        assert_eq!(b.amount, Amount::new(10));
        assert!(b.is_open());
        assert!(b.escrow.is_some());
        assert_eq!(b.next_fulfilment_id(), FulfilmentId::new(0));
    }

    #[test]
    fn can_fulfil_is_strictly_before_deadline() {
        let b = sample();
        assert!(b.can_fulfil(Timestamp::new(199)));
        assert!(!b.can_fulfil(Timestamp::new(200)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!BountyStatus::Open.is_terminal());
        assert!(BountyStatus::Paid.is_terminal());
        assert!(BountyStatus::Cancelled.is_terminal());
    }

    #[test]
    fn accepted_fulfilment_lookup() {
        let mut b = sample();
        for (i, who) in ["bob", "carol"].into_iter().enumerate() {
            b.fulfilments.push(Fulfilment {
                bounty_id: b.id,
                id: FulfilmentId::new(i as u64),
                fulfiler: Identity::new(who),
                data: Vec::new(),
                accepted: false,
                submitted_at: Timestamp::new(150),
            });
        }
        assert!(b.accepted_fulfilment().is_none());
        b.fulfilment_mut(FulfilmentId::new(1)).unwrap().accepted = true;
        assert_eq!(b.accepted_fulfilment().unwrap().fulfiler.as_str(), "carol");
        assert!(b.fulfilment(FulfilmentId::new(2)).is_none());
    }

    #[test]
    fn record_keeps_escrow_id_only() {
        let b = sample();
        let record = b.record();
        assert_eq!(record.escrow, Some(EscrowId::new(0)));
        assert_eq!(record.amount, b.amount);
        assert!(record.can_fulfil(Timestamp::new(150)));
    }
}
