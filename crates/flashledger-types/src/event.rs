//! Diagnostic events emitted on every session state transition.

use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetId, Delta, Movement, SessionId, SessionReceipt};

/// A single observable state transition.
///
/// Events are notifications only; nothing in the core reads them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// The lock moved IDLE → LOCKED.
    SessionOpened { session_id: SessionId },
    /// A pure accounting adjustment was applied.
    Adjusted {
        session_id: SessionId,
        asset: AssetId,
        amount: Delta,
        delta: Delta,
        depth: usize,
    },
    /// Value was received and the debt reduced.
    Settled {
        session_id: SessionId,
        asset: AssetId,
        amount: Delta,
        delta: Delta,
    },
    /// Value was paid out and the credit reduced.
    Taken {
        session_id: SessionId,
        asset: AssetId,
        amount: Delta,
        recipient: AccountId,
        delta: Delta,
    },
    /// A credit was forfeited.
    Cleared {
        session_id: SessionId,
        asset: AssetId,
        amount: Delta,
    },
    /// A nested call failed and only its own mutations were reverted.
    NestedCallReverted {
        session_id: SessionId,
        depth: usize,
        reverted_adjustments: usize,
        code: String,
    },
    /// The collaborator could not reverse a movement during unwind.
    CompensationFailed {
        session_id: SessionId,
        movement: Movement,
        reason: String,
    },
    /// The lock moved LOCKED → IDLE with every delta at zero.
    SessionClosed { receipt: SessionReceipt },
    /// The session unwound; ledger and lock are back to their prior state.
    SessionAborted {
        session_id: SessionId,
        code: String,
        reverted_adjustments: usize,
    },
}

impl LedgerEvent {
    /// Session the event belongs to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::SessionOpened { session_id }
            | Self::Adjusted { session_id, .. }
            | Self::Settled { session_id, .. }
            | Self::Taken { session_id, .. }
            | Self::Cleared { session_id, .. }
            | Self::NestedCallReverted { session_id, .. }
            | Self::CompensationFailed { session_id, .. }
            | Self::SessionAborted { session_id, .. } => *session_id,
            Self::SessionClosed { receipt } => receipt.session_id,
        }
    }

    /// Short lowercase label, used as a structured logging field.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. } => "open",
            Self::Adjusted { .. } => "adjust",
            Self::Settled { .. } => "settle",
            Self::Taken { .. } => "take",
            Self::Cleared { .. } => "clear",
            Self::NestedCallReverted { .. } => "nested_revert",
            Self::CompensationFailed { .. } => "compensation_failed",
            Self::SessionClosed { .. } => "close",
            Self::SessionAborted { .. } => "abort",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_and_label() {
        let id = SessionId::new();
        let event = LedgerEvent::Cleared {
            session_id: id,
            asset: AssetId::from("USD"),
            amount: 3,
        };
        assert_eq!(event.session_id(), id);
        assert_eq!(event.label(), "clear");
    }
}
