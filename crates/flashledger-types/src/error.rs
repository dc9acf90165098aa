//! Error types for the FlashLedger settlement core.
//!
//! All errors use the `FL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Usage errors (wrong session state, bad arguments)
//! - 2xx: Arithmetic errors
//! - 3xx: Settlement gate errors
//! - 4xx: Value-transfer errors
//! - 5xx: Work callback errors
//! - 9xx: General / internal errors

use std::fmt;

use thiserror::Error;

use crate::{AssetId, LedgerEntry};

/// Coarse classification of a [`FlashError`].
///
/// None of these are recovered by the core itself; the kind only tells the
/// embedder who has to fix what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An operation was called outside its valid session state. Caller-fixable.
    Usage,
    /// A delta or counter update would overflow.
    Arithmetic,
    /// `close` found nonzero deltas.
    UnsettledSession,
    /// The value-transfer collaborator refused a movement.
    TransferFailure,
    /// The work callback raised its own error.
    Callback,
    /// Invariant breakage or bad configuration.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "USAGE"),
            Self::Arithmetic => write!(f, "ARITHMETIC"),
            Self::UnsettledSession => write!(f, "UNSETTLED_SESSION"),
            Self::TransferFailure => write!(f, "TRANSFER_FAILURE"),
            Self::Callback => write!(f, "CALLBACK"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all FlashLedger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlashError {
    // =================================================================
    // Usage Errors (1xx)
    // =================================================================
    /// A ledger-mutating operation was called while no session is open.
    #[error("FL_ERR_100: No active session")]
    NoActiveSession,

    /// A session was opened while another one is still locked.
    #[error("FL_ERR_101: Session already active")]
    SessionAlreadyActive,

    /// `settle`, `take` and `clear` only accept non-negative amounts.
    #[error("FL_ERR_102: Negative amount {amount} for {asset}")]
    NegativeAmount { asset: AssetId, amount: i128 },

    /// Nested calls went deeper than the configured limit.
    #[error("FL_ERR_103: Call depth {depth} exceeds limit {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },

    /// `clear` must forfeit exactly the outstanding credit.
    #[error("FL_ERR_104: Clear of {amount} {asset} does not match credit {credit}")]
    ClearMismatch {
        asset: AssetId,
        amount: i128,
        credit: i128,
    },

    /// Strict settle policy refused a payment larger than the debt.
    #[error("FL_ERR_105: Settle of {amount} {asset} exceeds outstanding debt {owed}")]
    SurplusRejected {
        asset: AssetId,
        amount: i128,
        owed: i128,
    },

    // =================================================================
    // Arithmetic Errors (2xx)
    // =================================================================
    /// Applying the adjustment would overflow the delta width.
    #[error("FL_ERR_200: Delta overflow on {asset}: {current} + {amount}")]
    DeltaOverflow {
        asset: AssetId,
        current: i128,
        amount: i128,
    },

    /// The nonzero counter cannot be incremented any further.
    #[error("FL_ERR_201: Nonzero counter overflow")]
    CounterOverflow,

    // =================================================================
    // Settlement Gate Errors (3xx)
    // =================================================================
    /// `close` was attempted while some deltas are still nonzero.
    #[error("FL_ERR_300: Session unsettled: {} asset(s) outstanding", outstanding.len())]
    UnsettledSession { outstanding: Vec<LedgerEntry> },

    // =================================================================
    // Transfer Errors (4xx)
    // =================================================================
    /// The value-transfer collaborator reported a failure.
    #[error("FL_ERR_400: Transfer of {amount} {asset} failed: {reason}")]
    TransferFailed {
        asset: AssetId,
        amount: i128,
        reason: String,
    },

    // =================================================================
    // Callback Errors (5xx)
    // =================================================================
    /// Error raised by caller-supplied work.
    #[error("FL_ERR_500: Callback failed: {reason}")]
    Callback { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("FL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("FL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl FlashError {
    /// Shorthand for a work callback failure.
    pub fn callback(reason: impl Into<String>) -> Self {
        Self::Callback {
            reason: reason.into(),
        }
    }

    /// Which part of the error taxonomy this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoActiveSession
            | Self::SessionAlreadyActive
            | Self::NegativeAmount { .. }
            | Self::CallDepthExceeded { .. }
            | Self::ClearMismatch { .. }
            | Self::SurplusRejected { .. } => ErrorKind::Usage,
            Self::DeltaOverflow { .. } | Self::CounterOverflow => ErrorKind::Arithmetic,
            Self::UnsettledSession { .. } => ErrorKind::UnsettledSession,
            Self::TransferFailed { .. } => ErrorKind::TransferFailure,
            Self::Callback { .. } => ErrorKind::Callback,
            Self::Internal(_) | Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// The `FL_ERR_xxx` code of this error, without the message.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "FL_ERR_100",
            Self::SessionAlreadyActive => "FL_ERR_101",
            Self::NegativeAmount { .. } => "FL_ERR_102",
            Self::CallDepthExceeded { .. } => "FL_ERR_103",
            Self::ClearMismatch { .. } => "FL_ERR_104",
            Self::SurplusRejected { .. } => "FL_ERR_105",
            Self::DeltaOverflow { .. } => "FL_ERR_200",
            Self::CounterOverflow => "FL_ERR_201",
            Self::UnsettledSession { .. } => "FL_ERR_300",
            Self::TransferFailed { .. } => "FL_ERR_400",
            Self::Callback { .. } => "FL_ERR_500",
            Self::Internal(_) => "FL_ERR_900",
            Self::Configuration(_) => "FL_ERR_902",
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FlashError>;
