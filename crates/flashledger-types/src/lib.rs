//! # flashledger-types
//!
//! Shared types, errors, and configuration for the **FlashLedger**
//! deferred-settlement core.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AssetId`], [`AccountId`], [`SessionId`]
//! - **Ledger model**: [`LedgerEntry`], [`Delta`]
//! - **Session model**: [`SessionPhase`], [`SessionReceipt`]
//! - **Value movement**: [`Movement`]
//! - **Diagnostics**: [`LedgerEvent`]
//! - **Configuration**: [`LedgerConfig`], [`SettlePolicy`]
//! - **Errors**: [`FlashError`] with `FL_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod event;
pub mod ids;
pub mod movement;
pub mod receipt;
pub mod session;

pub use config::*;
pub use entry::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use movement::*;
pub use receipt::*;
pub use session::*;

// Constants are accessed via `flashledger_types::constants::FOO`
// (not re-exported to avoid name collisions).
