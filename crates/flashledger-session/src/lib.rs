//! # flashledger-session
//!
//! **Session plane**: session lifecycle, settlement against real value
//! movement, and execution of caller-supplied work with atomic unwind.
//!
//! ## Architecture
//!
//! Built on the [`DeltaLedger`](flashledger_ledger::DeltaLedger):
//! 1. **LockCoordinator**: IDLE → LOCKED → IDLE, one session at a time,
//!    close only when every delta is zero
//! 2. **SettlementGateway**: `settle` / `take` / `clear`, the only path to
//!    the [`ValueTransfer`] collaborator
//! 3. **CallbackDispatcher**: opens a session, hands a [`Session`] to the
//!    work callback, closes or unwinds
//!
//! ## Flow
//!
//! ```text
//! run(work) → lock.open() → work(&mut Session) → lock.close()
//!                                │ adjust / settle / take / clear
//!                                │ call / invoke (nested savepoints)
//!                                ▼
//!                   any failure → rollback + compensate + release
//! ```
//!
//! Positive delta = the session owes the engine; negative = the engine owes
//! the session.

pub mod dispatcher;
pub mod gateway;
pub mod lock;
pub mod sink;
pub mod transfer;
pub mod vault;

pub use dispatcher::{CallbackDispatcher, Participant, Session};
pub use gateway::{MovementMark, SettlementGateway};
pub use lock::{LockCoordinator, SessionTicket};
pub use sink::{DiagnosticsSink, FanoutSink, NoopSink, RecordingSink, TracingSink};
pub use transfer::{TransferError, ValueTransfer};
pub use vault::InMemoryVault;
