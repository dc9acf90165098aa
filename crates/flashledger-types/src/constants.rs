//! System-wide constants for the FlashLedger settlement core.

/// Default bound on nested `Session::call` depth.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Whether completed transfers are compensated on unwind by default.
pub const DEFAULT_COMPENSATE_ON_ABORT: bool = true;

/// Initial capacity of the per-session undo journal.
pub const JOURNAL_INITIAL_CAPACITY: usize = 64;

/// `tracing` target used by the event re-emitting sink.
pub const EVENT_TARGET: &str = "flashledger::events";

