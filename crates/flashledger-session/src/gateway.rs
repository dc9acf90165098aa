//! Settlement gateway.
//!
//! The only component that turns ledger deltas into real value movement:
//! 1. `settle`: value arrived from outside, the debt for an asset shrinks
//! 2. `take`: value leaves to a recipient, the credit for an asset shrinks
//! 3. `clear`: a credit is forfeited, no value moves
//!
//! Every operation requires the lock to be held. Each one is atomic on its
//! own: if the collaborator refuses a movement, the adjustment made for it
//! is reverted before the error is returned.

use flashledger_ledger::DeltaLedger;
use flashledger_types::{AccountId, AssetId, Delta, FlashError, Movement, Result, SettlePolicy};

use crate::lock::LockCoordinator;
use crate::transfer::{TransferError, ValueTransfer};

/// Position in the movement journal, see [`SettlementGateway::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MovementMark(usize);

/// Translates ledger deltas into calls on a [`ValueTransfer`] collaborator.
pub struct SettlementGateway<T> {
    /// The value-transfer collaborator.
    transfer: T,
    /// Overpayment handling for `settle`.
    policy: SettlePolicy,
    /// Movements completed since the last drain, oldest first.
    movements: Vec<Movement>,
}

impl<T: ValueTransfer> SettlementGateway<T> {
    /// Create a gateway over `transfer`.
    #[must_use]
    pub fn new(transfer: T, policy: SettlePolicy) -> Self {
        Self {
            transfer,
            policy,
            movements: Vec::new(),
        }
    }

    /// Record that `amount` of `asset` was received. Reduces the delta.
    ///
    /// # Errors
    /// - `NoActiveSession` if the lock is not held
    /// - `NegativeAmount` if `amount < 0`
    /// - `SurplusRejected` under [`SettlePolicy::Strict`] when `amount`
    ///   exceeds the outstanding debt
    /// - `DeltaOverflow` from the ledger
    /// - `TransferFailed` if the collaborator rejects the notification
    pub fn settle(
        &mut self,
        lock: &LockCoordinator,
        ledger: &mut DeltaLedger,
        asset: &AssetId,
        amount: Delta,
    ) -> Result<Delta> {
        lock.ensure_locked()?;
        Self::check_amount(asset, amount)?;
        if amount == 0 {
            return Ok(ledger.read(asset));
        }

        if self.policy == SettlePolicy::Strict {
            let owed = ledger.read(asset).max(0);
            if amount > owed {
                return Err(FlashError::SurplusRejected {
                    asset: asset.clone(),
                    amount,
                    owed,
                });
            }
        }

        let checkpoint = ledger.checkpoint();
        // `amount` is non-negative, so negation cannot overflow.
        let delta = ledger.adjust(asset, -amount)?;
        if let Err(err) = self.transfer.acknowledge_inbound(asset, amount) {
            ledger.rollback_to(checkpoint);
            return Err(Self::transfer_failed(asset, amount, err));
        }

        self.movements.push(Movement::Inbound {
            asset: asset.clone(),
            amount,
        });
        Ok(delta)
    }

    /// Pay `amount` of `asset` out to `recipient`. Increases the delta.
    ///
    /// Taking more than the session is owed is allowed; the resulting
    /// debt must be settled before the session can close.
    ///
    /// # Errors
    /// - `NoActiveSession` if the lock is not held
    /// - `NegativeAmount` if `amount < 0`
    /// - `DeltaOverflow` from the ledger
    /// - `TransferFailed` if the collaborator refuses the payout; the ledger
    ///   is left exactly as it was before the call
    pub fn take(
        &mut self,
        lock: &LockCoordinator,
        ledger: &mut DeltaLedger,
        asset: &AssetId,
        amount: Delta,
        recipient: AccountId,
    ) -> Result<Delta> {
        lock.ensure_locked()?;
        Self::check_amount(asset, amount)?;
        if amount == 0 {
            return Ok(ledger.read(asset));
        }

        let checkpoint = ledger.checkpoint();
        let delta = ledger.adjust(asset, amount)?;
        if let Err(err) = self.transfer.transfer_out(asset, amount, recipient) {
            ledger.rollback_to(checkpoint);
            return Err(Self::transfer_failed(asset, amount, err));
        }

        self.movements.push(Movement::Outbound {
            asset: asset.clone(),
            amount,
            recipient,
        });
        Ok(delta)
    }

    /// Forfeit exactly the credit outstanding for `asset`.
    ///
    /// # Errors
    /// - `NoActiveSession` if the lock is not held
    /// - `NegativeAmount` if `amount < 0`
    /// - `ClearMismatch` unless the delta is exactly `-amount`
    ///
    /// Clearing 0 is a no-op whatever the current delta.
    pub fn clear(
        &mut self,
        lock: &LockCoordinator,
        ledger: &mut DeltaLedger,
        asset: &AssetId,
        amount: Delta,
    ) -> Result<()> {
        lock.ensure_locked()?;
        Self::check_amount(asset, amount)?;
        if amount == 0 {
            return Ok(());
        }
        let credit = ledger.read(asset);
        if credit.checked_neg() != Some(amount) {
            return Err(FlashError::ClearMismatch {
                asset: asset.clone(),
                amount,
                credit,
            });
        }
        ledger.adjust(asset, amount)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Movement journal
    // -----------------------------------------------------------------

    /// Mark the current end of the movement journal.
    #[must_use]
    pub fn mark(&self) -> MovementMark {
        MovementMark(self.movements.len())
    }

    /// Movements completed since `mark`, oldest first.
    #[must_use]
    pub fn movements_since(&self, mark: MovementMark) -> &[Movement] {
        &self.movements[mark.0.min(self.movements.len())..]
    }

    /// Drop every movement after `mark`, newest first, asking the
    /// collaborator to reverse each one when `compensate` is set.
    ///
    /// Returns the movements the collaborator could not reverse.
    pub fn unwind_to(
        &mut self,
        mark: MovementMark,
        compensate: bool,
    ) -> Vec<(Movement, TransferError)> {
        let start = mark.0.min(self.movements.len());
        let undone: Vec<Movement> = self.movements.drain(start..).rev().collect();
        if !compensate {
            return Vec::new();
        }
        let mut failures = Vec::new();
        for movement in undone {
            if let Err(err) = self.transfer.compensate(&movement) {
                failures.push((movement, err));
            }
        }
        failures
    }

    /// Take every recorded movement, leaving the journal empty.
    pub fn drain_movements(&mut self) -> Vec<Movement> {
        std::mem::take(&mut self.movements)
    }

    /// The value-transfer collaborator.
    #[must_use]
    pub fn collaborator(&self) -> &T {
        &self.transfer
    }

    #[must_use]
    pub fn collaborator_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    #[must_use]
    pub fn policy(&self) -> SettlePolicy {
        self.policy
    }

    fn check_amount(asset: &AssetId, amount: Delta) -> Result<()> {
        if amount < 0 {
            return Err(FlashError::NegativeAmount {
                asset: asset.clone(),
                amount,
            });
        }
        Ok(())
    }

    fn transfer_failed(asset: &AssetId, amount: Delta, err: TransferError) -> FlashError {
        tracing::warn!(%asset, amount, reason = %err, "Value transfer refused");
        FlashError::TransferFailed {
            asset: asset.clone(),
            amount,
            reason: err.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::InMemoryVault;

    struct Fixture {
        lock: LockCoordinator,
        ledger: DeltaLedger,
        gateway: SettlementGateway<InMemoryVault>,
    }

    fn locked(policy: SettlePolicy) -> Fixture {
        let mut lock = LockCoordinator::new();
        lock.open().unwrap();
        Fixture {
            lock,
            ledger: DeltaLedger::new(),
            gateway: SettlementGateway::new(InMemoryVault::new().with_reserve("EUR", 100), policy),
        }
    }

    fn usd() -> AssetId {
        AssetId::from("USD")
    }

    fn eur() -> AssetId {
        AssetId::from("EUR")
    }

    #[test]
    fn settle_reduces_debt() {
        let mut f = locked(SettlePolicy::Credit);
        f.ledger.adjust(&usd(), 10).unwrap();
        let delta = f.gateway.settle(&f.lock, &mut f.ledger, &usd(), 10).unwrap();
        assert_eq!(delta, 0);
        assert!(f.ledger.is_fully_settled());
        assert_eq!(f.gateway.collaborator().reserve(&usd()), 10);
    }

    #[test]
    fn operations_require_lock() {
        let mut ledger = DeltaLedger::new();
        let lock = LockCoordinator::new();
        let mut gateway = SettlementGateway::new(InMemoryVault::new(), SettlePolicy::Credit);

        let err = gateway.settle(&lock, &mut ledger, &usd(), 1).unwrap_err();
        assert!(matches!(err, FlashError::NoActiveSession));
        let err = gateway
            .take(&lock, &mut ledger, &usd(), 1, AccountId::fixture(1))
            .unwrap_err();
        assert!(matches!(err, FlashError::NoActiveSession));
        let err = gateway.clear(&lock, &mut ledger, &usd(), 0).unwrap_err();
        assert!(matches!(err, FlashError::NoActiveSession));
        assert_eq!(ledger.journal_len(), 0);
    }

    #[test]
    fn negative_amounts_rejected() {
        let mut f = locked(SettlePolicy::Credit);
        let err = f.gateway.settle(&f.lock, &mut f.ledger, &usd(), -1).unwrap_err();
        assert!(matches!(err, FlashError::NegativeAmount { amount: -1, .. }));
        let err = f
            .gateway
            .take(&f.lock, &mut f.ledger, &usd(), i128::MIN, AccountId::fixture(1))
            .unwrap_err();
        assert!(matches!(err, FlashError::NegativeAmount { .. }));
    }

    #[test]
    fn credit_policy_accepts_surplus_as_credit() {
        let mut f = locked(SettlePolicy::Credit);
        f.ledger.adjust(&usd(), 10).unwrap();
        let delta = f.gateway.settle(&f.lock, &mut f.ledger, &usd(), 15).unwrap();
        assert_eq!(delta, -5);
        assert!(!f.ledger.is_fully_settled(), "surplus still blocks close");
    }

    #[test]
    fn strict_policy_rejects_surplus() {
        let mut f = locked(SettlePolicy::Strict);
        f.ledger.adjust(&usd(), 10).unwrap();
        let err = f.gateway.settle(&f.lock, &mut f.ledger, &usd(), 11).unwrap_err();
        assert!(matches!(err, FlashError::SurplusRejected { owed: 10, amount: 11, .. }));
        assert_eq!(f.ledger.read(&usd()), 10);
        assert!(f.gateway.settle(&f.lock, &mut f.ledger, &usd(), 10).is_ok());
    }

    #[test]
    fn take_pays_out_credit() {
        let mut f = locked(SettlePolicy::Credit);
        let bob = AccountId::fixture(2);
        f.ledger.adjust(&eur(), -20).unwrap();
        let delta = f.gateway.take(&f.lock, &mut f.ledger, &eur(), 20, bob).unwrap();
        assert_eq!(delta, 0);
        assert_eq!(f.gateway.collaborator().paid_to(bob, &eur()), 20);
        assert_eq!(f.gateway.movements_since(MovementMark(0)).len(), 1);
    }

    #[test]
    fn failed_take_leaves_no_orphaned_delta() {
        let mut f = locked(SettlePolicy::Credit);
        let journal_before = f.ledger.journal_len();
        let err = f
            .gateway
            .take(&f.lock, &mut f.ledger, &eur(), 500, AccountId::fixture(3))
            .unwrap_err();
        assert!(matches!(err, FlashError::TransferFailed { amount: 500, .. }));
        assert_eq!(f.ledger.read(&eur()), 0);
        assert!(f.ledger.is_fully_settled());
        assert_eq!(f.ledger.journal_len(), journal_before);
        assert!(f.gateway.movements_since(MovementMark(0)).is_empty());
    }

    #[test]
    fn clear_requires_exact_credit() {
        let mut f = locked(SettlePolicy::Credit);
        f.ledger.adjust(&usd(), -7).unwrap();
        let err = f.gateway.clear(&f.lock, &mut f.ledger, &usd(), 6).unwrap_err();
        assert!(matches!(err, FlashError::ClearMismatch { credit: -7, .. }));
        f.gateway.clear(&f.lock, &mut f.ledger, &usd(), 7).unwrap();
        assert!(f.ledger.is_fully_settled());
        assert!(f.gateway.movements_since(MovementMark(0)).is_empty());
    }

    #[test]
    fn zero_amounts_are_noops() {
        let mut f = locked(SettlePolicy::Strict);
        assert_eq!(f.gateway.settle(&f.lock, &mut f.ledger, &usd(), 0).unwrap(), 0);
        assert_eq!(
            f.gateway
                .take(&f.lock, &mut f.ledger, &eur(), 0, AccountId::fixture(1))
                .unwrap(),
            0
        );
        f.gateway.clear(&f.lock, &mut f.ledger, &usd(), 0).unwrap();
        assert_eq!(f.ledger.journal_len(), 0);
        assert!(f.gateway.collaborator().log().is_empty());
    }

    #[test]
    fn clear_zero_leaves_outstanding_credit() {
        let mut f = locked(SettlePolicy::Credit);
        f.ledger.adjust(&usd(), -4).unwrap();
        let journal_before = f.ledger.journal_len();

        f.gateway.clear(&f.lock, &mut f.ledger, &usd(), 0).unwrap();
        assert_eq!(f.ledger.read(&usd()), -4);
        assert_eq!(f.ledger.journal_len(), journal_before);
    }

    #[test]
    fn unwind_compensates_newest_first() {
        let mut f = locked(SettlePolicy::Credit);
        let bob = AccountId::fixture(2);
        let mark = f.gateway.mark();
        f.gateway.settle(&f.lock, &mut f.ledger, &eur(), 30).unwrap();
        f.gateway.take(&f.lock, &mut f.ledger, &eur(), 120, bob).unwrap();
        assert_eq!(f.gateway.collaborator().reserve(&eur()), 10);

        let failures = f.gateway.unwind_to(mark, true);
        assert!(failures.is_empty());
        assert_eq!(f.gateway.collaborator().reserve(&eur()), 100);
        assert_eq!(f.gateway.collaborator().paid_to(bob, &eur()), 0);
        assert!(f.gateway.drain_movements().is_empty());
    }
}
