//! Session receipts: the audit record produced when a session closes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AssetId, Delta, Movement, SessionId};

/// Summary of one successfully closed session.
///
/// Every delta was zero at close time, so the receipt only records what
/// crossed the session boundary and how much accounting happened inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReceipt {
    /// The session this receipt closes.
    pub session_id: SessionId,
    /// When the session was opened.
    pub opened_at: DateTime<Utc>,
    /// When the session closed.
    pub closed_at: DateTime<Utc>,
    /// Number of ledger adjustments retained by the session.
    pub adjustments: usize,
    /// Distinct assets whose delta was touched.
    pub assets_touched: BTreeSet<AssetId>,
    /// Total value received per asset.
    pub inbound: BTreeMap<AssetId, Delta>,
    /// Total value paid out per asset.
    pub outbound: BTreeMap<AssetId, Delta>,
    /// Movements in the order they happened.
    pub movements: Vec<Movement>,
    /// SHA-256 over the session id and the canonical movement list.
    pub digest: [u8; 32],
}

impl SessionReceipt {
    /// Build a receipt, deriving totals and the digest from `movements`.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        opened_at: DateTime<Utc>,
        adjustments: usize,
        assets_touched: BTreeSet<AssetId>,
        movements: Vec<Movement>,
    ) -> Self {
        let mut inbound: BTreeMap<AssetId, Delta> = BTreeMap::new();
        let mut outbound: BTreeMap<AssetId, Delta> = BTreeMap::new();
        for movement in &movements {
            let totals = if movement.is_outbound() {
                &mut outbound
            } else {
                &mut inbound
            };
            let total = totals.entry(movement.asset().clone()).or_insert(0);
            // Per-direction sums can exceed i128 even when every delta fit.
            *total = total.saturating_add(movement.amount());
        }
        let digest = Self::compute_digest(session_id, &movements);
        Self {
            session_id,
            opened_at,
            closed_at: Utc::now(),
            adjustments,
            assets_touched,
            inbound,
            outbound,
            movements,
            digest,
        }
    }

    /// `SHA-256(domain_sep || session_id || count || canonical movements)`
    #[must_use]
    pub fn compute_digest(session_id: SessionId, movements: &[Movement]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"flashledger:receipt:v1:");
        hasher.update(session_id.0.as_bytes());
        hasher.update((movements.len() as u64).to_le_bytes());
        for movement in movements {
            hasher.update(movement.canonical_bytes());
        }
        hasher.finalize().into()
    }

    /// Recompute the digest and compare it with the stored one.
    #[must_use]
    pub fn verify_digest(&self) -> bool {
        Self::compute_digest(self.session_id, &self.movements) == self.digest
    }

    /// Hex-encoded digest.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Net value that crossed the boundary for `asset` (inbound - outbound).
    #[must_use]
    pub fn net_flow(&self, asset: &AssetId) -> Delta {
        let received = self.inbound.get(asset).copied().unwrap_or(0);
        let paid = self.outbound.get(asset).copied().unwrap_or(0);
        received.saturating_sub(paid)
    }

    /// Number of outbound transfers made by the session.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.movements.iter().filter(|m| m.is_outbound()).count()
    }
}
