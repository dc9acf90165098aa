//! Configuration types for a FlashLedger instance.

use serde::{Deserialize, Serialize};

use crate::{FlashError, Result, constants};

/// What `settle` does with a payment larger than the outstanding debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Accept the surplus. It becomes a credit (negative delta) that still
    /// has to be taken or cleared before the session can close.
    #[default]
    Credit,
    /// Reject any settle above the current positive delta.
    Strict,
}

/// Configuration for one ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Overpayment handling in `settle`.
    pub settle_policy: SettlePolicy,
    /// Maximum nesting depth of `Session::call` / `Session::invoke`.
    pub max_call_depth: usize,
    /// Reverse completed movements through the collaborator on unwind.
    pub compensate_on_abort: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            settle_policy: SettlePolicy::default(),
            max_call_depth: constants::DEFAULT_MAX_CALL_DEPTH,
            compensate_on_abort: constants::DEFAULT_COMPENSATE_ON_ABORT,
        }
    }
}

impl LedgerConfig {
    /// Strict reconciliation: overpayment is an error.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            settle_policy: SettlePolicy::Strict,
            ..Self::default()
        }
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    /// Returns [`FlashError::Configuration`] if `max_call_depth` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            return Err(FlashError::Configuration(
                "max_call_depth must be > 0".into(),
            ));
        }
        Ok(())
    }
}
