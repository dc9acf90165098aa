//! Session lock coordinator.
//!
//! Gatekeeps the session lifecycle of one ledger instance:
//! **IDLE → LOCKED → IDLE**. Only one session may hold the lock, and the
//! lock is only handed back once every delta is zero (or the session is
//! aborted and unwound by the dispatcher).

use chrono::{DateTime, Utc};
use flashledger_ledger::DeltaLedger;
use flashledger_types::{FlashError, Result, SessionId, SessionPhase};

/// Proof that a session was opened, handed out by [`LockCoordinator::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    pub session_id: SessionId,
    pub opened_at: DateTime<Utc>,
}

/// Reentrancy guard for one ledger instance.
///
/// This is not a mutual-exclusion primitive for threads: it only rejects a
/// second session opened while the first is still on the call stack.
/// Independent ledgers get independent coordinators.
pub struct LockCoordinator {
    /// The session currently holding the lock, if any.
    active: Option<SessionTicket>,
    /// Sessions opened over the lifetime of this coordinator.
    sessions_opened: u64,
}

impl LockCoordinator {
    /// Create a new coordinator in the IDLE phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: None,
            sessions_opened: 0,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.active.is_some() {
            SessionPhase::Locked
        } else {
            SessionPhase::Idle
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.active.is_some()
    }

    /// The session holding the lock.
    #[must_use]
    pub fn active(&self) -> Option<SessionTicket> {
        self.active
    }

    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    /// IDLE → LOCKED.
    ///
    /// # Errors
    /// Returns [`FlashError::SessionAlreadyActive`] if a session already
    /// holds the lock. Nothing changes in that case.
    pub fn open(&mut self) -> Result<SessionTicket> {
        self.check_idle()?;
        let ticket = SessionTicket {
            session_id: SessionId::new(),
            opened_at: Utc::now(),
        };
        self.active = Some(ticket);
        self.sessions_opened += 1;
        Ok(ticket)
    }

    /// LOCKED → IDLE, only if `ledger` is fully settled.
    ///
    /// # Errors
    /// - `NoActiveSession` if the lock is not held
    /// - `UnsettledSession` if any delta is nonzero; the lock stays held so
    ///   the caller can inspect the ledger before unwinding
    pub fn close(&mut self, ledger: &DeltaLedger) -> Result<SessionTicket> {
        let ticket = self.active.ok_or(FlashError::NoActiveSession)?;
        if !ledger.is_fully_settled() {
            return Err(FlashError::UnsettledSession {
                outstanding: ledger.outstanding(),
            });
        }
        self.active = None;
        Ok(ticket)
    }

    /// The open guard on its own: `Ok` only when IDLE.
    ///
    /// # Errors
    /// Returns [`FlashError::SessionAlreadyActive`] if a session holds the
    /// lock.
    pub fn check_idle(&self) -> Result<()> {
        match self.active {
            Some(active) => {
                tracing::warn!(session = %active.session_id, "Session open rejected: lock already held");
                Err(FlashError::SessionAlreadyActive)
            }
            None => Ok(()),
        }
    }

    /// Force LOCKED → IDLE without the settlement check.
    ///
    /// Only the abort path may call this, after the ledger has been unwound.
    pub fn release(&mut self) -> Option<SessionTicket> {
        self.active.take()
    }

    /// Guard a ledger mutation. Returns the active session id, or
    /// [`FlashError::NoActiveSession`] when IDLE.
    pub fn ensure_locked(&self) -> Result<SessionId> {
        self.active
            .map(|ticket| ticket.session_id)
            .ok_or(FlashError::NoActiveSession)
    }
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashledger_types::AssetId;

    #[test]
    fn starts_idle() {
        let lock = LockCoordinator::new();
        assert_eq!(lock.phase(), SessionPhase::Idle);
        assert!(lock.active().is_none());
        assert!(matches!(
            lock.ensure_locked(),
            Err(FlashError::NoActiveSession)
        ));
    }

    #[test]
    fn open_then_close_settled() {
        let mut lock = LockCoordinator::new();
        let ledger = DeltaLedger::new();
        let ticket = lock.open().unwrap();
        assert_eq!(lock.phase(), SessionPhase::Locked);
        assert_eq!(lock.ensure_locked().unwrap(), ticket.session_id);

        let closed = lock.close(&ledger).unwrap();
        assert_eq!(closed, ticket);
        assert_eq!(lock.phase(), SessionPhase::Idle);
        assert_eq!(lock.sessions_opened(), 1);
    }

    #[test]
    fn double_open_rejected_without_transition() {
        let mut lock = LockCoordinator::new();
        let ticket = lock.open().unwrap();
        let err = lock.open().unwrap_err();
        assert!(matches!(err, FlashError::SessionAlreadyActive));
        assert_eq!(lock.active(), Some(ticket));
        assert_eq!(lock.sessions_opened(), 1);
    }

    #[test]
    fn close_requires_settled_ledger() {
        let mut lock = LockCoordinator::new();
        let mut ledger = DeltaLedger::new();
        let usd = AssetId::from("USD");
        lock.open().unwrap();
        ledger.adjust(&usd, 50).unwrap();

        let err = lock.close(&ledger).unwrap_err();
        match err {
            FlashError::UnsettledSession { outstanding } => {
                assert_eq!(outstanding.len(), 1);
                assert_eq!(outstanding[0].delta, 50);
            }
            other => panic!("expected UnsettledSession, got {other:?}"),
        }
        assert_eq!(lock.phase(), SessionPhase::Locked, "failed close keeps the lock");

        ledger.adjust(&usd, -50).unwrap();
        assert!(lock.close(&ledger).is_ok());
    }

    #[test]
    fn close_when_idle_is_usage_error() {
        let mut lock = LockCoordinator::new();
        let err = lock.close(&DeltaLedger::new()).unwrap_err();
        assert!(matches!(err, FlashError::NoActiveSession));
    }

    #[test]
    fn release_returns_to_idle() {
        let mut lock = LockCoordinator::new();
        let ticket = lock.open().unwrap();
        assert_eq!(lock.release(), Some(ticket));
        assert_eq!(lock.phase(), SessionPhase::Idle);
        assert_eq!(lock.release(), None);
        assert!(lock.open().is_ok());
    }

    #[test]
    fn open_guard_tracks_phase() {
        let mut lock = LockCoordinator::new();
        assert!(lock.check_idle().is_ok());
        lock.open().unwrap();
        assert!(matches!(
            lock.check_idle(),
            Err(FlashError::SessionAlreadyActive)
        ));
        lock.release();
        assert!(lock.check_idle().is_ok());
    }

    #[test]
    fn ticket_session_id_is_minted_at_open() {
        let mut lock = LockCoordinator::new();
        let floor = Utc::now().timestamp_millis();
        let ticket = lock.open().unwrap();
        let minted = i64::try_from(ticket.session_id.timestamp_ms()).unwrap();
        assert!(floor <= minted, "minted={minted}, floor={floor}");
        assert!(minted <= ticket.opened_at.timestamp_millis());
    }
}
