//! # flashledger-ledger
//!
//! **Accounting plane**: the per-asset delta table every session mutates.
//!
//! ## Architecture
//!
//! The [`DeltaLedger`] knows nothing about sessions or callers. It offers:
//! 1. Checked `adjust` with an incrementally maintained nonzero counter
//! 2. O(1) [`DeltaLedger::is_fully_settled`] for the close gate
//! 3. An undo journal of `(asset, previous_delta)` records, so any prefix
//!    of mutations can be discarded with [`DeltaLedger::rollback_to`]
//!
//! Whether a session is open is the caller's concern; keeping the check
//! out of the ledger lets it be composed into other accounting surfaces.

pub mod delta_ledger;
pub mod journal;

pub use delta_ledger::DeltaLedger;
pub use journal::{Checkpoint, Journal, UndoRecord};
