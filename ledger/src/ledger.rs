//! The bounty state machine.
//!
//! Every mutating operation runs under one ledger-wide lock: it loads the
//! bounty, checks preconditions in a fixed order, then commits. A failed
//! precondition leaves the store and the custody book untouched.
//!
//! Terminal transitions persist the new status, still holding the escrow
//! handle, before releasing escrow. If the release fails the open record is
//! written back with the returned handle, so the bounty stays open and the
//! value stays in escrow. A terminal record that still holds a handle is an
//! unfinished settlement; [`BountyLedger::reconcile`] completes it.
//!
//! Readers get [`BountyRecord`]s. Escrow handles never leave the ledger.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bounty_store::{BountyStore, ReleaseFailure, StoreError, TransferError, ValueTransfer};
use bounty_types::{
    Amount, Bounty, BountyId, BountyRecord, BountyStatus, Clock, EscrowHandle, Fulfilment,
    FulfilmentId, Identity, Timestamp,
};
use bounty_utils::StatsCounter;

use crate::{BountyEvent, EventBus, LedgerConfig, LedgerError};

const STAT_NAMES: &[&str] = &[
    "issued",
    "fulfilled",
    "accepted",
    "cancelled",
    "rejected",
    "transfer_failures",
    "reconciled",
];

/// Aggregate view over the bounty arena.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub bounties: u64,
    pub open: u64,
    pub paid: u64,
    pub cancelled: u64,
    pub fulfilments: u64,
    pub escrowed: Amount,
}

/// The bounty ledger.
///
/// Generic over its three collaborators so tests can run it against
/// in-memory doubles and the daemon against LMDB. The ledger takes ownership
/// of them and does not hand them back out: balance queries and deposits go
/// to the caller's own handle on the custody backend.
pub struct BountyLedger<S, T, C> {
    store: S,
    transfer: T,
    clock: C,
    config: LedgerConfig,
    events: EventBus,
    stats: StatsCounter,
    serial: Mutex<()>,
    /// Escrows of issues that failed to persist and could not be refunded.
    owed_refunds: Mutex<Vec<EscrowHandle>>,
}

impl<S, T, C> BountyLedger<S, T, C>
where
    S: BountyStore,
    T: ValueTransfer,
    C: Clock,
{
    pub fn new(store: S, transfer: T, clock: C) -> Self {
        Self::with_config(store, transfer, clock, LedgerConfig::default())
    }

    pub fn with_config(store: S, transfer: T, clock: C, config: LedgerConfig) -> Self {
        Self {
            store,
            transfer,
            clock,
            events: EventBus::new(config.event_channel_capacity),
            config,
            stats: StatsCounter::new(STAT_NAMES),
            serial: Mutex::new(()),
            owed_refunds: Mutex::new(Vec::new()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Counters for committed transitions and rejections.
    pub fn stats(&self) -> HashMap<&'static str, u64> {
        self.stats.snapshot()
    }

    /// Post a new bounty, moving `amount` from `issuer` into escrow.
    ///
    /// Ids are dense: the new bounty gets the current bounty count.
    pub fn issue(
        &self,
        issuer: &Identity,
        data: impl Into<Vec<u8>>,
        deadline: Timestamp,
        amount: Amount,
    ) -> Result<BountyId, LedgerError> {
        let result = {
            let _guard = self.lock();
            self.try_issue(issuer, data.into(), deadline, amount)
        };
        self.finish("issue", result)
    }

    /// Record a claim of completed work against an open bounty.
    pub fn fulfil(
        &self,
        fulfiler: &Identity,
        bounty_id: BountyId,
        data: impl Into<Vec<u8>>,
    ) -> Result<FulfilmentId, LedgerError> {
        let result = {
            let _guard = self.lock();
            self.try_fulfil(fulfiler, bounty_id, data.into())
        };
        self.finish("fulfil", result)
    }

    /// Accept one fulfilment and pay the escrowed value to its fulfiler.
    pub fn accept_fulfilment(
        &self,
        caller: &Identity,
        bounty_id: BountyId,
        fulfilment_id: FulfilmentId,
    ) -> Result<(), LedgerError> {
        let result = {
            let _guard = self.lock();
            self.try_accept(caller, bounty_id, fulfilment_id)
        };
        self.finish("accept_fulfilment", result)
    }

    /// Withdraw an open bounty and return its escrow to the issuer.
    pub fn cancel_bounty(&self, caller: &Identity, bounty_id: BountyId) -> Result<(), LedgerError> {
        let result = {
            let _guard = self.lock();
            self.try_cancel(caller, bounty_id)
        };
        self.finish("cancel_bounty", result)
    }

    pub fn bounty(&self, bounty_id: BountyId) -> Result<BountyRecord, LedgerError> {
        let _guard = self.lock();
        Ok(self.load(bounty_id)?.record())
    }

    pub fn fulfilment(
        &self,
        bounty_id: BountyId,
        fulfilment_id: FulfilmentId,
    ) -> Result<Fulfilment, LedgerError> {
        let _guard = self.lock();
        let bounty = self.load(bounty_id)?;
        bounty
            .fulfilment(fulfilment_id)
            .cloned()
            .ok_or(LedgerError::FulfilmentNotFound {
                bounty: bounty_id,
                fulfilment: fulfilment_id,
            })
    }

    pub fn bounty_count(&self) -> Result<u64, LedgerError> {
        let _guard = self.lock();
        Ok(self.store.bounty_count()?)
    }

    /// All bounties in id order.
    pub fn bounties(&self) -> Result<Vec<BountyRecord>, LedgerError> {
        let _guard = self.lock();
        let bounties = self.store.iter_bounties()?;
        Ok(bounties.iter().map(Bounty::record).collect())
    }

    pub fn open_bounties(&self) -> Result<Vec<BountyRecord>, LedgerError> {
        let mut bounties = self.bounties()?;
        bounties.retain(BountyRecord::is_open);
        Ok(bounties)
    }

    /// Value currently held in escrow by open bounties.
    pub fn escrowed_total(&self) -> Result<Amount, LedgerError> {
        Ok(self.summary()?.escrowed)
    }

    pub fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let bounties = self.bounties()?;
        let mut summary = LedgerSummary {
            bounties: bounties.len() as u64,
            ..LedgerSummary::default()
        };
        for bounty in &bounties {
            summary.fulfilments += bounty.fulfilments.len() as u64;
            match bounty.status {
                BountyStatus::Open => {
                    summary.open += 1;
                    summary.escrowed = summary
                        .escrowed
                        .checked_add(bounty.amount)
                        .ok_or_else(|| StoreError::Overflow("escrowed total".to_string()))?;
                }
                BountyStatus::Paid => summary.paid += 1,
                BountyStatus::Cancelled => summary.cancelled += 1,
            }
        }
        Ok(summary)
    }

    /// Finish what failed writes left behind: settle terminal records that
    /// still hold their escrow, and retry refunds for issues that were never
    /// persisted. Returns the number of escrows resolved.
    pub fn reconcile(&self) -> Result<usize, LedgerError> {
        let (resolved, events) = {
            let _guard = self.lock();
            self.try_reconcile()?
        };
        for event in &events {
            self.events.emit(event);
        }
        if resolved > 0 {
            self.stats.add("reconciled", resolved as u64);
            tracing::info!(resolved, "reconciled unfinished escrow movements");
        }
        Ok(resolved)
    }

    /// Escrows held back from failed issues, waiting for a refund.
    pub fn owed_refunds(&self) -> usize {
        self.owed_refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, bounty_id: BountyId) -> Result<Bounty, LedgerError> {
        self.store.get_bounty(bounty_id).map_err(|e| match e {
            StoreError::NotFound(_) => LedgerError::BountyNotFound(bounty_id),
            other => LedgerError::Storage(other),
        })
    }

    /// Count, log and publish the outcome of an operation. Runs after the
    /// ledger lock is dropped.
    fn finish<R>(
        &self,
        op: &'static str,
        result: Result<(R, BountyEvent), LedgerError>,
    ) -> Result<R, LedgerError> {
        match result {
            Ok((output, event)) => {
                let counter = match event {
                    BountyEvent::BountyIssued { .. } => "issued",
                    BountyEvent::BountyFulfiled { .. } => "fulfilled",
                    BountyEvent::FulfilmentAccepted { .. } => "accepted",
                    BountyEvent::BountyCancelled { .. } => "cancelled",
                };
                self.stats.increment(counter);
                self.events.emit(&event);
                Ok(output)
            }
            Err(err) => {
                self.stats.increment("rejected");
                if let LedgerError::EscrowTransferFailed { .. } = err {
                    self.stats.increment("transfer_failures");
                }
                tracing::debug!(op, kind = err.kind(), error = %err, "operation rejected");
                Err(err)
            }
        }
    }

    fn try_issue(
        &self,
        issuer: &Identity,
        data: Vec<u8>,
        deadline: Timestamp,
        amount: Amount,
    ) -> Result<(BountyId, BountyEvent), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidBountyParameters {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        let now = self.clock.now();
        if deadline <= now {
            return Err(LedgerError::InvalidBountyParameters {
                reason: format!("deadline {deadline} is not after current time {now}"),
            });
        }

        let bounty_id = BountyId::new(self.store.bounty_count()?);
        let handle = self
            .transfer
            .escrow(issuer, amount)
            .map_err(|source| LedgerError::EscrowTransferFailed {
                bounty: bounty_id,
                source,
            })?;

        let bounty = Bounty::open(bounty_id, issuer.clone(), data, deadline, handle, now);
        if let Err(err) = self.store.put_bounty(&bounty) {
            if let Some(handle) = bounty.escrow {
                let escrow_id = handle.id();
                match self.transfer.release(handle, issuer) {
                    Ok(()) => tracing::warn!(
                        bounty = %bounty_id,
                        escrow = %escrow_id,
                        "bounty not persisted, escrow refunded"
                    ),
                    Err(failure) => {
                        tracing::error!(
                            bounty = %bounty_id,
                            escrow = %escrow_id,
                            error = %failure.reason,
                            "bounty not persisted and refund failed, refund held for reconcile"
                        );
                        self.owe_refund(failure.handle);
                    }
                }
            }
            return Err(err.into());
        }

        tracing::info!(
            bounty = %bounty_id,
            issuer = %issuer,
            amount = %amount,
            deadline = %deadline,
            "bounty issued"
        );
        let event = BountyEvent::BountyIssued {
            bounty_id,
            issuer: issuer.clone(),
            amount,
        };
        Ok((bounty_id, event))
    }

    fn try_fulfil(
        &self,
        fulfiler: &Identity,
        bounty_id: BountyId,
        data: Vec<u8>,
    ) -> Result<(FulfilmentId, BountyEvent), LedgerError> {
        let mut bounty = self.load(bounty_id)?;
        if !bounty.is_open() {
            return Err(LedgerError::BountyNotOpen {
                bounty: bounty_id,
                status: bounty.status,
            });
        }
        let now = self.clock.now();
        if now >= bounty.deadline {
            return Err(LedgerError::DeadlinePassed {
                bounty: bounty_id,
                deadline: bounty.deadline,
                now,
            });
        }
        if *fulfiler == bounty.issuer {
            return Err(LedgerError::SelfFulfilmentForbidden {
                bounty: bounty_id,
                caller: fulfiler.clone(),
            });
        }

        let fulfilment_id = bounty.next_fulfilment_id();
        bounty.fulfilments.push(Fulfilment {
            bounty_id,
            id: fulfilment_id,
            fulfiler: fulfiler.clone(),
            data,
            accepted: false,
            submitted_at: now,
        });
        self.store.put_bounty(&bounty)?;

        tracing::info!(
            bounty = %bounty_id,
            fulfilment = %fulfilment_id,
            fulfiler = %fulfiler,
            "fulfilment submitted"
        );
        let event = BountyEvent::BountyFulfiled {
            bounty_id,
            fulfiler: fulfiler.clone(),
            fulfilment_id,
        };
        Ok((fulfilment_id, event))
    }

    fn try_accept(
        &self,
        caller: &Identity,
        bounty_id: BountyId,
        fulfilment_id: FulfilmentId,
    ) -> Result<((), BountyEvent), LedgerError> {
        let mut bounty = self.load(bounty_id)?;
        let fulfilment =
            bounty
                .fulfilment(fulfilment_id)
                .ok_or(LedgerError::FulfilmentNotFound {
                    bounty: bounty_id,
                    fulfilment: fulfilment_id,
                })?;
        if *caller != bounty.issuer {
            return Err(LedgerError::NotIssuer {
                bounty: bounty_id,
                caller: caller.clone(),
            });
        }
        if fulfilment.accepted {
            return Err(LedgerError::FulfilmentAlreadyAccepted {
                bounty: bounty_id,
                fulfilment: fulfilment_id,
            });
        }
        if !bounty.is_open() {
            return Err(LedgerError::BountyNotOpen {
                bounty: bounty_id,
                status: bounty.status,
            });
        }
        let now = self.clock.now();
        if self.config.deadline_gates_acceptance && now >= bounty.deadline {
            return Err(LedgerError::DeadlinePassed {
                bounty: bounty_id,
                deadline: bounty.deadline,
                now,
            });
        }
        let fulfiler = fulfilment.fulfiler.clone();

        self.settle(&mut bounty, BountyStatus::Paid, Some(fulfilment_id), &fulfiler, now)?;

        tracing::info!(
            bounty = %bounty_id,
            fulfilment = %fulfilment_id,
            fulfiler = %fulfiler,
            amount = %bounty.amount,
            "fulfilment accepted, bounty paid"
        );
        let event = BountyEvent::FulfilmentAccepted {
            bounty_id,
            issuer: bounty.issuer.clone(),
            fulfiler,
            fulfilment_id,
            amount: bounty.amount,
        };
        Ok(((), event))
    }

    fn try_cancel(
        &self,
        caller: &Identity,
        bounty_id: BountyId,
    ) -> Result<((), BountyEvent), LedgerError> {
        let mut bounty = self.load(bounty_id)?;
        if *caller != bounty.issuer {
            return Err(LedgerError::NotIssuer {
                bounty: bounty_id,
                caller: caller.clone(),
            });
        }
        if !bounty.is_open() {
            return Err(LedgerError::BountyNotOpen {
                bounty: bounty_id,
                status: bounty.status,
            });
        }
        let now = self.clock.now();
        let issuer = bounty.issuer.clone();

        self.settle(&mut bounty, BountyStatus::Cancelled, None, &issuer, now)?;

        tracing::info!(
            bounty = %bounty_id,
            issuer = %issuer,
            amount = %bounty.amount,
            "bounty cancelled, escrow returned"
        );
        let event = BountyEvent::BountyCancelled {
            bounty_id,
            issuer,
            amount: bounty.amount,
        };
        Ok(((), event))
    }

    /// Move an open bounty to `status` and release its escrow to `payee`.
    ///
    /// The terminal record is persisted first with the handle still in it. A
    /// failed release restores the open record with the handle the transfer
    /// gave back. If that restore also fails the settling record stays in the
    /// store, handle included, and the caller sees `Storage`.
    fn settle(
        &self,
        bounty: &mut Bounty,
        status: BountyStatus,
        accepted: Option<FulfilmentId>,
        payee: &Identity,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let bounty_id = bounty.id;
        if bounty.escrow.is_none() {
            let reason = format!("open bounty {bounty_id} holds no escrow");
            return Err(StoreError::Corruption(reason).into());
        }

        bounty.status = status;
        bounty.settled_at = Some(now);
        if let Some(f) = accepted.and_then(|id| bounty.fulfilment_mut(id)) {
            f.accepted = true;
        }
        self.store.put_bounty(bounty)?;

        let handle = bounty.escrow.take().ok_or_else(|| {
            StoreError::Corruption(format!("open bounty {bounty_id} holds no escrow"))
        })?;
        let escrow_id = handle.id();
        match self.transfer.release(handle, payee) {
            Ok(()) => {
                if let Err(err) = self.store.put_bounty(bounty) {
                    // The value moved; the stale handle is cleared by reconcile.
                    tracing::warn!(
                        bounty = %bounty_id,
                        escrow = %escrow_id,
                        error = %err,
                        "escrow released but settled record not written"
                    );
                }
                Ok(())
            }
            Err(failure) => {
                bounty.status = BountyStatus::Open;
                bounty.settled_at = None;
                if let Some(f) = accepted.and_then(|id| bounty.fulfilment_mut(id)) {
                    f.accepted = false;
                }
                bounty.escrow = Some(failure.handle);
                if let Err(err) = self.store.put_bounty(bounty) {
                    tracing::error!(
                        bounty = %bounty_id,
                        escrow = %escrow_id,
                        release_error = %failure.reason,
                        error = %err,
                        "release failed and open record not restored, settlement left for reconcile"
                    );
                    return Err(LedgerError::Storage(err));
                }
                tracing::warn!(
                    bounty = %bounty_id,
                    escrow = %escrow_id,
                    error = %failure.reason,
                    "release failed, bounty left open"
                );
                Err(LedgerError::EscrowTransferFailed {
                    bounty: bounty_id,
                    source: failure.reason,
                })
            }
        }
    }

    fn owe_refund(&self, handle: EscrowHandle) {
        self.owed_refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    fn try_reconcile(&self) -> Result<(usize, Vec<BountyEvent>), LedgerError> {
        let mut resolved = 0;
        let mut events = Vec::new();

        let owed = std::mem::take(
            &mut *self
                .owed_refunds
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in owed {
            let depositor = handle.depositor().clone();
            let escrow_id = handle.id();
            match self.transfer.release(handle, &depositor) {
                Ok(()) => {
                    tracing::info!(escrow = %escrow_id, to = %depositor, "held refund paid");
                    resolved += 1;
                }
                Err(failure) => {
                    tracing::warn!(
                        escrow = %escrow_id,
                        error = %failure.reason,
                        "held refund failed again"
                    );
                    self.owe_refund(failure.handle);
                }
            }
        }

        for mut bounty in self.store.iter_bounties()? {
            if bounty.is_open() {
                continue;
            }
            let Some(handle) = bounty.escrow.take() else {
                continue;
            };
            let bounty_id = bounty.id;
            let escrow_id = handle.id();
            let event = match bounty.status {
                BountyStatus::Paid => {
                    let f = bounty.accepted_fulfilment().ok_or_else(|| {
                        let reason = format!("paid bounty {bounty_id} has no accepted fulfilment");
                        StoreError::Corruption(reason)
                    })?;
                    BountyEvent::FulfilmentAccepted {
                        bounty_id,
                        issuer: bounty.issuer.clone(),
                        fulfiler: f.fulfiler.clone(),
                        fulfilment_id: f.id,
                        amount: bounty.amount,
                    }
                }
                _ => BountyEvent::BountyCancelled {
                    bounty_id,
                    issuer: bounty.issuer.clone(),
                    amount: bounty.amount,
                },
            };
            let payee = match &event {
                BountyEvent::FulfilmentAccepted { fulfiler, .. } => fulfiler.clone(),
                _ => bounty.issuer.clone(),
            };

            match self.transfer.release(handle, &payee) {
                Ok(()) => {
                    tracing::info!(
                        bounty = %bounty_id,
                        escrow = %escrow_id,
                        to = %payee,
                        "unfinished settlement released"
                    );
                    events.push(event);
                }
                Err(ReleaseFailure {
                    reason: TransferError::UnknownEscrow(_),
                    ..
                }) => {
                    tracing::debug!(
                        bounty = %bounty_id,
                        escrow = %escrow_id,
                        "escrow already released, clearing handle"
                    );
                }
                Err(failure) => {
                    tracing::warn!(
                        bounty = %bounty_id,
                        escrow = %escrow_id,
                        error = %failure.reason,
                        "unfinished settlement still failing"
                    );
                    continue;
                }
            }
            self.store.put_bounty(&bounty)?;
            resolved += 1;
        }
        Ok((resolved, events))
    }
}
