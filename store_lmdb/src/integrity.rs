//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the ledger begins
//! accepting operations. The check cross-references the bounty arena with
//! the escrow book:
//! - bounty keys form the contiguous range `0..count` and match the stored ids
//! - an open bounty holds an escrow handle whose entry exists with the same amount
//! - a paid or cancelled bounty holds no handle; one that still does is a
//!   settlement the ledger's `reconcile` has yet to finish
//! - every escrow entry is claimed by exactly one bounty

use std::collections::HashSet;

use bounty_types::{Bounty, BountyStatus};

use crate::vault::EscrowEntry;
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub bounties_checked: u64,
    pub escrows_checked: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

pub(crate) fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env().read_txn()?;
    let mut claimed = HashSet::new();

    for (expected, result) in (0u64..).zip(env.bounties_db.iter(&rtxn)?) {
        let (key, val) = result?;
        report.bounties_checked += 1;

        let bounty: Bounty = match bincode::deserialize(val) {
            Ok(b) => b,
            Err(e) => {
                report
                    .errors
                    .push(format!("bounty record at position {expected} undecodable: {e}"));
                continue;
            }
        };
        if key != expected.to_be_bytes() || bounty.id.as_u64() != expected {
            report.errors.push(format!(
                "bounty arena gap: expected id {expected}, found {}",
                bounty.id
            ));
        }

        match (&bounty.status, &bounty.escrow) {
            (BountyStatus::Open, Some(handle)) => {
                claimed.insert(handle.id());
                match env.escrows_db.get(&rtxn, &handle.id().to_be_bytes())? {
                    Some(bytes) => {
                        let entry: EscrowEntry = bincode::deserialize(bytes)?;
                        if entry.amount != bounty.amount {
                            report.errors.push(format!(
                                "bounty {} escrows {} but {} holds {}",
                                bounty.id,
                                bounty.amount,
                                handle.id(),
                                entry.amount
                            ));
                        }
                    }
                    None => report.errors.push(format!(
                        "open bounty {} references missing {}",
                        bounty.id,
                        handle.id()
                    )),
                }
            }
            (BountyStatus::Open, None) => report
                .errors
                .push(format!("open bounty {} holds no escrow", bounty.id)),
            (status, Some(handle)) => {
                claimed.insert(handle.id());
                report.errors.push(format!(
                    "{status} bounty {} still holds {}, settlement unfinished",
                    bounty.id,
                    handle.id()
                ));
            }
            (_, None) => {}
        }
    }

    for result in env.escrows_db.iter(&rtxn)? {
        let (key, _val) = result?;
        report.escrows_checked += 1;
        let arr: [u8; 8] = key
            .try_into()
            .map_err(|_| LmdbError::Serialization("escrow key has bad length".to_string()))?;
        let id = bounty_types::EscrowId::new(u64::from_be_bytes(arr));
        if !claimed.contains(&id) {
            report
                .errors
                .push(format!("{id} is not claimed by any bounty"));
        }
    }

    if report.is_healthy() {
        tracing::debug!(
            bounties = report.bounties_checked,
            escrows = report.escrows_checked,
            "integrity check passed"
        );
    } else {
        tracing::warn!(errors = report.errors.len(), "integrity check found problems");
    }
    Ok(report)
}
