//! Sequence-assigned entity identifiers.
//!
//! Both identifiers are insertion indices: bounty ids index the ledger's
//! bounty arena, fulfilment ids index a single bounty's fulfilment list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// Identifier of a bounty (0-based, never reused).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BountyId(u64);

impl BountyId {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Big-endian key bytes; lexicographic order matches id order.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

/// Identifier of a fulfilment within its bounty (0-based submission order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FulfilmentId(u64);

impl FulfilmentId {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Position in the owning bounty's fulfilment list.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

macro_rules! id_impls {
    ($ty:ident) => {
        impl From<u64> for $ty {
            fn from(index: u64) -> Self {
                Self(index)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| TypeError::InvalidId(format!("{s:?}: {e}")))
            }
        }
    };
}

id_impls!(BountyId);
id_impls!(FulfilmentId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bytes_sort_like_ids() {
        let a = BountyId::new(9).to_be_bytes();
        let b = BountyId::new(256).to_be_bytes();
        assert!(a < b);
    }

    #[test]
    fn parse_id() {
        assert_eq!("7".parse::<FulfilmentId>().unwrap(), FulfilmentId::new(7));
        assert!("x".parse::<BountyId>().is_err());
    }
}
