//! Boundary to the value-transfer collaborator.
//!
//! The collaborator owns everything outside the session: authorization,
//! custody and durable bookkeeping of who owns what. The core only tells it
//! when value arrives, when value must leave, and when a movement has to be
//! reversed because the session unwound.

use flashledger_types::{AccountId, AssetId, Delta, Movement};
use thiserror::Error;

/// Failure reported by a [`ValueTransfer`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TransferError {
    pub reason: String,
}

impl TransferError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Real movement of value across the session boundary.
pub trait ValueTransfer {
    /// Pay `amount` of `asset` out to `recipient`.
    fn transfer_out(
        &mut self,
        asset: &AssetId,
        amount: Delta,
        recipient: AccountId,
    ) -> Result<(), TransferError>;

    /// Notification that `amount` of `asset` has arrived from outside.
    fn acknowledge_inbound(&mut self, _asset: &AssetId, _amount: Delta) -> Result<(), TransferError> {
        Ok(())
    }

    /// Reverse a movement that completed inside a session which then
    /// unwound. Collaborators without reversible movements keep the default.
    fn compensate(&mut self, _movement: &Movement) -> Result<(), TransferError> {
        Ok(())
    }
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for &mut T {
    fn transfer_out(
        &mut self,
        asset: &AssetId,
        amount: Delta,
        recipient: AccountId,
    ) -> Result<(), TransferError> {
        (**self).transfer_out(asset, amount, recipient)
    }

    fn acknowledge_inbound(&mut self, asset: &AssetId, amount: Delta) -> Result<(), TransferError> {
        (**self).acknowledge_inbound(asset, amount)
    }

    fn compensate(&mut self, movement: &Movement) -> Result<(), TransferError> {
        (**self).compensate(movement)
    }
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for Box<T> {
    fn transfer_out(
        &mut self,
        asset: &AssetId,
        amount: Delta,
        recipient: AccountId,
    ) -> Result<(), TransferError> {
        (**self).transfer_out(asset, amount, recipient)
    }

    fn acknowledge_inbound(&mut self, asset: &AssetId, amount: Delta) -> Result<(), TransferError> {
        (**self).acknowledge_inbound(asset, amount)
    }

    fn compensate(&mut self, movement: &Movement) -> Result<(), TransferError> {
        (**self).compensate(movement)
    }
}
