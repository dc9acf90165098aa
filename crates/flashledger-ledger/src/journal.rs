//! Undo journal for ledger mutations.
//!
//! Every mutation appends the value the entry held *before* the write.
//! Replaying the records in reverse restores any earlier state exactly.

use flashledger_types::{AssetId, Delta, constants};

/// The prior value of one entry, captured just before it was overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub asset: AssetId,
    pub previous: Delta,
}

/// Position in the journal that can later be rolled back to.
///
/// Checkpoints are plain journal lengths; they stay valid as long as
/// nothing older than them has been rolled back or committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(pub(crate) usize);

impl Checkpoint {
    /// Number of journal records that precede this checkpoint.
    #[must_use]
    pub fn position(self) -> usize {
        self.0
    }
}

/// Append-only list of undo records, truncated on rollback or commit.
#[derive(Debug, Clone)]
pub struct Journal {
    records: Vec<UndoRecord>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(constants::JOURNAL_INITIAL_CAPACITY),
        }
    }

    pub fn record(&mut self, asset: AssetId, previous: Delta) {
        self.records.push(UndoRecord { asset, previous });
    }

    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.records.len())
    }

    /// Remove and return, newest first, every record after `checkpoint`.
    pub fn unwind_to(&mut self, checkpoint: Checkpoint) -> impl Iterator<Item = UndoRecord> + '_ {
        let start = checkpoint.0.min(self.records.len());
        self.records.drain(start..).rev()
    }

    /// Forget every record. The current state becomes the new baseline.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records since `checkpoint`, oldest first.
    #[must_use]
    pub fn since(&self, checkpoint: Checkpoint) -> &[UndoRecord] {
        let start = checkpoint.0.min(self.records.len());
        &self.records[start..]
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwind_yields_newest_first() {
        let mut journal = Journal::new();
        journal.record(AssetId::from("USD"), 0);
        let cp = journal.checkpoint();
        journal.record(AssetId::from("USD"), 10);
        journal.record(AssetId::from("EUR"), 0);

        let undone: Vec<UndoRecord> = journal.unwind_to(cp).collect();
        assert_eq!(undone.len(), 2);
        assert_eq!(undone[0].asset, AssetId::from("EUR"));
        assert_eq!(undone[1].previous, 10);
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn stale_checkpoint_is_clamped() {
        let mut journal = Journal::new();
        journal.record(AssetId::from("USD"), 0);
        let cp = journal.checkpoint();
        journal.clear();
        assert_eq!(journal.unwind_to(cp).count(), 0);
        assert!(journal.is_empty());
    }
}
