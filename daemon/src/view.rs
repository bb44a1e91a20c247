//! JSON renderings of ledger records for command output.

use serde::Serialize;

use bounty_types::{BountyRecord, Fulfilment, Timestamp};
use bounty_utils::format_duration;

/// Render an opaque payload as text when it is valid UTF-8, otherwise as
/// `0x`-prefixed hex.
pub fn render_payload(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", hex::encode(data)),
    }
}

#[derive(Debug, Serialize)]
pub struct FulfilmentView {
    pub id: u64,
    pub fulfiler: String,
    pub accepted: bool,
    pub submitted_at: u64,
    pub data: String,
}

impl From<&Fulfilment> for FulfilmentView {
    fn from(f: &Fulfilment) -> Self {
        Self {
            id: f.id.as_u64(),
            fulfiler: f.fulfiler.to_string(),
            accepted: f.accepted,
            submitted_at: f.submitted_at.as_secs(),
            data: render_payload(&f.data),
        }
    }
}

/// Amounts are strings so 128-bit values survive JSON consumers.
#[derive(Debug, Serialize)]
pub struct BountyView {
    pub id: u64,
    pub issuer: String,
    pub status: &'static str,
    pub amount: String,
    pub deadline: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escrow: Option<String>,
    pub data: String,
    pub fulfilments: Vec<FulfilmentView>,
}

impl BountyView {
    pub fn new(bounty: &BountyRecord, now: Timestamp) -> Self {
        let time_left = bounty
            .can_fulfil(now)
            .then(|| format_duration(bounty.deadline.remaining_from(now)));
        Self {
            id: bounty.id.as_u64(),
            issuer: bounty.issuer.to_string(),
            status: bounty.status.as_str(),
            amount: bounty.amount.to_string(),
            deadline: bounty.deadline.as_secs(),
            time_left,
            created_at: bounty.created_at.as_secs(),
            settled_at: bounty.settled_at.map(|t| t.as_secs()),
            escrow: bounty.escrow.map(|id| id.to_string()),
            data: render_payload(&bounty.data),
            fulfilments: bounty.fulfilments.iter().map(FulfilmentView::from).collect(),
        }
    }
}
