//! In-memory reference collaborator.
//!
//! Holds per-asset reserves on behalf of the engine and records payouts per
//! recipient. Outbound transfers fail when reserves run short or the asset
//! is frozen, which makes it a convenient simulator for transfer failures.

use std::collections::{HashMap, HashSet};

use flashledger_types::{AccountId, AssetId, Delta, Movement};

use crate::transfer::{TransferError, ValueTransfer};

/// Reserve-backed [`ValueTransfer`] kept entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryVault {
    /// Value held by the engine, per asset.
    reserves: HashMap<AssetId, Delta>,
    /// Value paid out, per (recipient, asset).
    payouts: HashMap<(AccountId, AssetId), Delta>,
    /// Completed movements, oldest first. Compensated movements are removed.
    log: Vec<Movement>,
    /// Assets whose outbound transfers are refused.
    frozen: HashSet<AssetId>,
}

impl InMemoryVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed reserves outside of any session.
    pub fn fund(&mut self, asset: &str, amount: Delta) {
        let reserve = self.reserves.entry(AssetId::from(asset)).or_insert(0);
        *reserve = reserve.saturating_add(amount);
    }

    /// Builder form of [`fund`](Self::fund).
    #[must_use]
    pub fn with_reserve(mut self, asset: &str, amount: Delta) -> Self {
        self.fund(asset, amount);
        self
    }

    /// Refuse outbound transfers of `asset` until unfrozen.
    pub fn freeze(&mut self, asset: &AssetId) {
        self.frozen.insert(asset.clone());
    }

    pub fn unfreeze(&mut self, asset: &AssetId) {
        self.frozen.remove(asset);
    }

    /// Reserve currently held for `asset`.
    #[must_use]
    pub fn reserve(&self, asset: &AssetId) -> Delta {
        self.reserves.get(asset).copied().unwrap_or(0)
    }

    /// Total paid out to `account` in `asset`.
    #[must_use]
    pub fn paid_to(&self, account: AccountId, asset: &AssetId) -> Delta {
        self.payouts
            .get(&(account, asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Every completed movement, oldest first.
    #[must_use]
    pub fn log(&self) -> &[Movement] {
        &self.log
    }

    /// Completed outbound transfers, oldest first.
    pub fn outbound(&self) -> impl Iterator<Item = &Movement> {
        self.log.iter().filter(|m| m.is_outbound())
    }

    fn credit_reserve(&mut self, asset: &AssetId, amount: Delta) -> Result<(), TransferError> {
        let reserve = self.reserves.entry(asset.clone()).or_insert(0);
        *reserve = reserve
            .checked_add(amount)
            .ok_or_else(|| TransferError::new(format!("reserve overflow on {asset}")))?;
        Ok(())
    }

    fn forget(&mut self, movement: &Movement) {
        if let Some(pos) = self.log.iter().rposition(|m| m == movement) {
            self.log.remove(pos);
        }
    }
}

impl ValueTransfer for InMemoryVault {
    fn transfer_out(
        &mut self,
        asset: &AssetId,
        amount: Delta,
        recipient: AccountId,
    ) -> Result<(), TransferError> {
        if self.frozen.contains(asset) {
            return Err(TransferError::new(format!("{asset} is frozen")));
        }
        let reserve = self.reserve(asset);
        if reserve < amount {
            return Err(TransferError::new(format!(
                "insufficient {asset} reserve: need {amount}, have {reserve}"
            )));
        }
        self.reserves.insert(asset.clone(), reserve - amount);
        let paid = self.payouts.entry((recipient, asset.clone())).or_insert(0);
        *paid = paid.saturating_add(amount);
        self.log.push(Movement::Outbound {
            asset: asset.clone(),
            amount,
            recipient,
        });
        Ok(())
    }

    fn acknowledge_inbound(&mut self, asset: &AssetId, amount: Delta) -> Result<(), TransferError> {
        self.credit_reserve(asset, amount)?;
        self.log.push(Movement::Inbound {
            asset: asset.clone(),
            amount,
        });
        Ok(())
    }

    fn compensate(&mut self, movement: &Movement) -> Result<(), TransferError> {
        match movement {
            Movement::Outbound {
                asset,
                amount,
                recipient,
            } => {
                let key = (*recipient, asset.clone());
                let paid = self.payouts.get(&key).copied().unwrap_or(0);
                if paid < *amount {
                    return Err(TransferError::new(format!(
                        "cannot claw back {amount} {asset} from {recipient}: only {paid} paid"
                    )));
                }
                if paid == *amount {
                    self.payouts.remove(&key);
                } else {
                    self.payouts.insert(key, paid - amount);
                }
                self.credit_reserve(asset, *amount)?;
            }
            Movement::Inbound { asset, amount } => {
                let reserve = self.reserve(asset);
                if reserve < *amount {
                    return Err(TransferError::new(format!(
                        "cannot refund {amount} {asset}: reserve is {reserve}"
                    )));
                }
                self.reserves.insert(asset.clone(), reserve - amount);
            }
        }
        self.forget(movement);
        Ok(())
    }
}
