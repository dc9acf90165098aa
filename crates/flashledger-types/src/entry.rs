//! Ledger entry types.
//!
//! A delta is the signed net amount outstanding for one asset within the
//! current session:
//! - **positive**: the session owes value to the engine and must pay it in
//!   with `settle`
//! - **negative**: the engine owes value to the session, withdrawn with
//!   `take` or forfeited with `clear`
//!
//! Zero-valued and absent entries are semantically identical.

use serde::{Deserialize, Serialize};

use crate::AssetId;

/// Signed delta width. Arithmetic on it is always checked.
pub type Delta = i128;

/// A single (asset, delta) row of the delta ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The asset this row tracks.
    pub asset: AssetId,
    /// Net amount outstanding for the asset.
    pub delta: Delta,
}

impl LedgerEntry {
    #[must_use]
    pub fn new(asset: AssetId, delta: Delta) -> Self {
        Self { asset, delta }
    }

    /// Whether this row is fully reconciled.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.delta == 0
    }

    /// The session still has to pay this asset in.
    #[must_use]
    pub fn is_debt(&self) -> bool {
        self.delta > 0
    }

    /// The session still has this asset to withdraw.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.delta < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_classification() {
        let debt = LedgerEntry::new(AssetId::from("USD"), 50);
        assert!(debt.is_debt() && !debt.is_credit() && !debt.is_zero());

        let credit = LedgerEntry::new(AssetId::from("EUR"), -20);
        assert!(credit.is_credit() && !credit.is_debt());

        assert!(LedgerEntry::new(AssetId::from("BTC"), 0).is_zero());
    }
}
