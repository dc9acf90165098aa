//! Session lifecycle types.
//!
//! A ledger instance cycles through two phases:
//! **IDLE → LOCKED → IDLE**
//!
//! During LOCKED, exactly one session may mutate the ledger. Returning to
//! IDLE requires every delta to be zero, or an abort that unwinds them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two phases of the session lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No session open; ledger mutations are rejected.
    #[default]
    Idle,
    /// A session is open and owns the ledger.
    Locked,
}

impl SessionPhase {
    /// Whether ledger mutations are currently allowed.
    #[must_use]
    pub fn is_locked(self) -> bool {
        self == Self::Locked
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Locked => write!(f, "LOCKED"),
        }
    }
}
