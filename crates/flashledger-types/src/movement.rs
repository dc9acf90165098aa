//! Real value movements recorded by the settlement gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetId, Delta};

/// One movement of real value across the session boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Movement {
    /// Value received from outside (`settle`).
    Inbound { asset: AssetId, amount: Delta },
    /// Value paid out to `recipient` (`take`).
    Outbound {
        asset: AssetId,
        amount: Delta,
        recipient: AccountId,
    },
}

impl Movement {
    #[must_use]
    pub fn asset(&self) -> &AssetId {
        match self {
            Self::Inbound { asset, .. } | Self::Outbound { asset, .. } => asset,
        }
    }

    #[must_use]
    pub fn amount(&self) -> Delta {
        match self {
            Self::Inbound { amount, .. } | Self::Outbound { amount, .. } => *amount,
        }
    }

    #[must_use]
    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::Outbound { .. })
    }

    /// Canonical byte encoding used for receipt digests.
    ///
    /// Format: `tag || len(asset) || asset || amount (LE) [|| recipient]`
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let asset = self.asset().as_str().as_bytes();
        let mut out = Vec::with_capacity(1 + 8 + asset.len() + 16 + 16);
        match self {
            Self::Inbound { .. } => out.push(0x01),
            Self::Outbound { .. } => out.push(0x02),
        }
        out.extend_from_slice(&(asset.len() as u64).to_le_bytes());
        out.extend_from_slice(asset);
        out.extend_from_slice(&self.amount().to_le_bytes());
        if let Self::Outbound { recipient, .. } = self {
            out.extend_from_slice(recipient.0.as_bytes());
        }
        out
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound { asset, amount } => write!(f, "in {amount} {asset}"),
            Self::Outbound {
                asset,
                amount,
                recipient,
            } => write!(f, "out {amount} {asset} -> {recipient}"),
        }
    }
}
