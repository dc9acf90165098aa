//! Per-asset signed delta table.
//!
//! Tracks the net amount outstanding per asset for the current session and
//! an incrementally maintained count of nonzero rows. All mutations are
//! atomic: either the full adjustment applies or the ledger is unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use flashledger_types::{AssetId, Delta, FlashError, LedgerEntry, Result};
use sha2::{Digest, Sha256};

use crate::journal::{Checkpoint, Journal};

/// Signed per-asset balance table with an O(1) settlement check.
///
/// Zero rows may linger in the table between a mutation and the next
/// [`commit`](Self::commit); they are never observable through the public
/// API, which treats zero and absent identically.
pub struct DeltaLedger {
    /// Per-asset deltas.
    deltas: HashMap<AssetId, Delta>,
    /// Always equal to the number of nonzero values in `deltas`.
    nonzero: usize,
    /// Prior values of every mutation since the last commit.
    journal: Journal,
}

impl DeltaLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deltas: HashMap::new(),
            nonzero: 0,
            journal: Journal::new(),
        }
    }

    /// Add `amount` (positive or negative) to the delta of `asset`.
    ///
    /// Returns the new delta. Adjusting by zero is a no-op that leaves both
    /// the counter and the journal untouched.
    ///
    /// # Errors
    /// - `DeltaOverflow` if the addition overflows `i128`
    /// - `CounterOverflow` if a new nonzero row cannot be counted
    pub fn adjust(&mut self, asset: &AssetId, amount: Delta) -> Result<Delta> {
        let current = self.read(asset);
        if amount == 0 {
            return Ok(current);
        }

        let next = current
            .checked_add(amount)
            .ok_or_else(|| FlashError::DeltaOverflow {
                asset: asset.clone(),
                current,
                amount,
            })?;

        // Counter first: it is the only other fallible step.
        if current == 0 {
            self.nonzero = self
                .nonzero
                .checked_add(1)
                .ok_or(FlashError::CounterOverflow)?;
        } else if next == 0 {
            self.nonzero -= 1;
        }

        self.journal.record(asset.clone(), current);
        self.deltas.insert(asset.clone(), next);

        tracing::trace!(%asset, amount, delta = next, nonzero = self.nonzero, "Delta adjusted");
        Ok(next)
    }

    /// Current delta for `asset` (zero if absent).
    #[must_use]
    pub fn read(&self, asset: &AssetId) -> Delta {
        self.deltas.get(asset).copied().unwrap_or(0)
    }

    /// Whether every delta is zero. O(1).
    #[must_use]
    pub fn is_fully_settled(&self) -> bool {
        self.nonzero == 0
    }

    /// Number of assets with a nonzero delta.
    #[must_use]
    pub fn nonzero_count(&self) -> usize {
        self.nonzero
    }

    /// Nonzero rows sorted by asset, for diagnostics and error reports.
    #[must_use]
    pub fn outstanding(&self) -> Vec<LedgerEntry> {
        self.snapshot()
            .into_iter()
            .map(|(asset, delta)| LedgerEntry::new(asset, delta))
            .collect()
    }

    /// Canonical view of the ledger: nonzero rows only, ordered by asset.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<AssetId, Delta> {
        self.deltas
            .iter()
            .filter(|(_, delta)| **delta != 0)
            .map(|(asset, delta)| (asset.clone(), *delta))
            .collect()
    }

    /// SHA-256 over the canonical view.
    ///
    /// `SHA-256(domain_sep || count || for each row: len(asset) || asset || delta)`
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let snapshot = self.snapshot();
        let mut hasher = Sha256::new();
        hasher.update(b"flashledger:ledger:v1:");
        hasher.update((snapshot.len() as u64).to_le_bytes());
        for (asset, delta) in &snapshot {
            hasher.update((asset.as_str().len() as u64).to_le_bytes());
            hasher.update(asset.as_str().as_bytes());
            hasher.update(delta.to_le_bytes());
        }
        hasher.finalize().into()
    }

    // -----------------------------------------------------------------
    // Journal
    // -----------------------------------------------------------------

    /// Mark the current state so it can be restored later.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.journal.checkpoint()
    }

    /// Undo every mutation made after `checkpoint`, newest first.
    ///
    /// Returns the number of mutations discarded.
    pub fn rollback_to(&mut self, checkpoint: Checkpoint) -> usize {
        let mut reverted = 0;
        for record in self.journal.unwind_to(checkpoint) {
            let current = self.deltas.get(&record.asset).copied().unwrap_or(0);
            if current == 0 && record.previous != 0 {
                self.nonzero += 1;
            } else if current != 0 && record.previous == 0 {
                self.nonzero -= 1;
            }
            if record.previous == 0 {
                self.deltas.remove(&record.asset);
            } else {
                self.deltas.insert(record.asset, record.previous);
            }
            reverted += 1;
        }
        if reverted > 0 {
            tracing::trace!(reverted, nonzero = self.nonzero, "Ledger rolled back");
        }
        reverted
    }

    /// Accept every mutation since the last commit and prune zero rows.
    pub fn commit(&mut self) {
        self.journal.clear();
        self.deltas.retain(|_, delta| *delta != 0);
    }

    /// Number of mutations recorded since the last commit.
    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Number of mutations recorded since `checkpoint`.
    #[must_use]
    pub fn mutations_since(&self, checkpoint: Checkpoint) -> usize {
        self.journal.since(checkpoint).len()
    }

    /// Distinct assets mutated since `checkpoint`.
    #[must_use]
    pub fn touched_since(&self, checkpoint: Checkpoint) -> BTreeSet<AssetId> {
        self.journal
            .since(checkpoint)
            .iter()
            .map(|record| record.asset.clone())
            .collect()
    }
}

impl Default for DeltaLedger {
    fn default() -> Self {
        Self::new()
    }
}
