//! Callback dispatcher: runs caller-supplied work inside exactly one
//! session and guarantees all-or-nothing ledger effects.
//!
//! ## Lifecycle of `run`
//!
//! ```text
//!   open ──▶ work(&mut Session) ──Ok──▶ close ──Ok──▶ commit ──▶ receipt
//!                 │                       │
//!                Err / panic             Err (unsettled)
//!                 ▼                       ▼
//!              unwind ◀───────────────────┘
//!   (ledger rolled back, movements compensated, lock released)
//! ```
//!
//! Nested sub-operations go through [`Session::call`] or
//! [`Session::invoke`]. Each nested call is a savepoint: if it fails, only
//! its own mutations are reverted and the error is handed back to the
//! enclosing work, which may recover or propagate it.

use std::panic::{self, AssertUnwindSafe};

use flashledger_ledger::{Checkpoint, DeltaLedger};
use flashledger_types::{
    AccountId, AssetId, Delta, FlashError, LedgerConfig, LedgerEntry, LedgerEvent, Movement,
    Result, SessionId, SessionPhase, SessionReceipt,
};

use crate::gateway::{MovementMark, SettlementGateway};
use crate::lock::LockCoordinator;
use crate::sink::{DiagnosticsSink, NoopSink};
use crate::transfer::{TransferError, ValueTransfer};

/// Independent party that takes part in a session, e.g. one leg of a
/// multi-leg operation that calls back into the same ledger.
pub trait Participant<T: ValueTransfer> {
    fn on_call(&mut self, session: &mut Session<'_, T>) -> Result<()>;
}

impl<T, F> Participant<T> for F
where
    T: ValueTransfer,
    F: FnMut(&mut Session<'_, T>) -> Result<()>,
{
    fn on_call(&mut self, session: &mut Session<'_, T>) -> Result<()> {
        self(session)
    }
}

/// Runs units of work against one ledger instance.
///
/// Owns the ledger, its lock and its gateway. Nothing here is global:
/// every dispatcher is an isolated accounting domain.
pub struct CallbackDispatcher<T> {
    ledger: DeltaLedger,
    lock: LockCoordinator,
    gateway: SettlementGateway<T>,
    sink: Box<dyn DiagnosticsSink>,
    config: LedgerConfig,
}

impl<T: ValueTransfer> CallbackDispatcher<T> {
    /// Create a dispatcher with the default configuration.
    #[must_use]
    pub fn new(transfer: T) -> Self {
        let config = LedgerConfig::default();
        Self {
            ledger: DeltaLedger::new(),
            lock: LockCoordinator::new(),
            gateway: SettlementGateway::new(transfer, config.settle_policy),
            sink: Box::new(NoopSink),
            config,
        }
    }

    /// Create a dispatcher with an explicit configuration.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` fails validation.
    pub fn with_config(transfer: T, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger: DeltaLedger::new(),
            lock: LockCoordinator::new(),
            gateway: SettlementGateway::new(transfer, config.settle_policy),
            sink: Box::new(NoopSink),
            config,
        })
    }

    /// Replace the diagnostics sink.
    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Run `work` inside a fresh session, discarding the receipt.
    pub fn run<R, F>(&mut self, work: F) -> Result<R>
    where
        F: FnOnce(&mut Session<'_, T>) -> Result<R>,
    {
        self.run_with_receipt(work).map(|(value, _)| value)
    }

    /// Run `work` inside a fresh session.
    ///
    /// On success every mutation is retained and a receipt is returned. On
    /// any failure (an error from `work`, an unsettled close, or a panic)
    /// the ledger, the movement journal and the lock are restored to their
    /// state before the call, then the error propagates (or the panic
    /// resumes).
    ///
    /// # Errors
    /// - `SessionAlreadyActive` if the lock is held; nothing is touched
    /// - `UnsettledSession` if `work` left nonzero deltas behind
    /// - any error returned by `work`
    pub fn run_with_receipt<R, F>(&mut self, work: F) -> Result<(R, SessionReceipt)>
    where
        F: FnOnce(&mut Session<'_, T>) -> Result<R>,
    {
        let ticket = self.lock.open()?;
        let session_id = ticket.session_id;
        tracing::debug!(session = %session_id, "Session opened");

        let checkpoint = self.ledger.checkpoint();
        let mark = self.gateway.mark();

        let outcome = {
            let mut session = Session {
                ledger: &mut self.ledger,
                lock: &self.lock,
                gateway: &mut self.gateway,
                sink: &mut self.sink,
                config: &self.config,
                session_id,
                depth: 0,
            };
            // A panicking sink unwinds the session like a panicking callback.
            panic::catch_unwind(AssertUnwindSafe(|| {
                session
                    .sink
                    .on_event(&LedgerEvent::SessionOpened { session_id });
                work(&mut session)
            }))
        };

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                self.abort(session_id, checkpoint, mark, err.code());
                return Err(err);
            }
            Err(payload) => {
                self.abort(session_id, checkpoint, mark, "PANIC");
                panic::resume_unwind(payload);
            }
        };

        if let Err(err) = self.lock.close(&self.ledger) {
            if let FlashError::UnsettledSession { outstanding } = &err {
                tracing::warn!(
                    session = %session_id,
                    outstanding = outstanding.len(),
                    "Session close rejected: deltas outstanding"
                );
            }
            self.abort(session_id, checkpoint, mark, err.code());
            return Err(err);
        }

        let receipt = SessionReceipt::new(
            session_id,
            ticket.opened_at,
            self.ledger.mutations_since(checkpoint),
            self.ledger.touched_since(checkpoint),
            self.gateway.drain_movements(),
        );
        self.ledger.commit();

        tracing::info!(
            session = %session_id,
            adjustments = receipt.adjustments,
            assets = receipt.assets_touched.len(),
            transfers = receipt.transfer_count(),
            "Session closed"
        );
        self.sink.on_event(&LedgerEvent::SessionClosed {
            receipt: receipt.clone(),
        });
        Ok((value, receipt))
    }

    /// Discard everything since `checkpoint`/`mark` and hand the lock back.
    ///
    /// State is fully restored before any sink runs.
    fn abort(&mut self, session_id: SessionId, checkpoint: Checkpoint, mark: MovementMark, code: &str) {
        let reverted = self.ledger.rollback_to(checkpoint);
        let failures = self.gateway.unwind_to(mark, self.config.compensate_on_abort);
        self.lock.release();

        tracing::warn!(session = %session_id, code, reverted, "Session aborted and unwound");
        report_compensation_failures(&mut self.sink, session_id, failures);
        self.sink.on_event(&LedgerEvent::SessionAborted {
            session_id,
            code: code.to_string(),
            reverted_adjustments: reverted,
        });
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    #[must_use]
    pub fn ledger(&self) -> &DeltaLedger {
        &self.ledger
    }

    #[must_use]
    pub fn lock(&self) -> &LockCoordinator {
        &self.lock
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock.phase()
    }

    /// Current delta for `asset`. Always zero between sessions.
    #[must_use]
    pub fn read(&self, asset: &AssetId) -> Delta {
        self.ledger.read(asset)
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub fn collaborator(&self) -> &T {
        self.gateway.collaborator()
    }

    /// Mutable access to the collaborator between sessions (funding,
    /// freezing assets, ...).
    #[must_use]
    pub fn collaborator_mut(&mut self) -> &mut T {
        self.gateway.collaborator_mut()
    }
}

fn report_compensation_failures(
    sink: &mut Box<dyn DiagnosticsSink>,
    session_id: SessionId,
    failures: Vec<(Movement, TransferError)>,
) {
    for (movement, err) in failures {
        tracing::error!(
            session = %session_id,
            movement = %movement,
            reason = %err,
            "Movement could not be compensated"
        );
        sink.on_event(&LedgerEvent::CompensationFailed {
            session_id,
            movement,
            reason: err.reason,
        });
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Handle given to work callbacks while a session holds the lock.
///
/// Every ledger-mutating operation goes through this handle, so none of
/// them can be reached while the dispatcher is idle.
pub struct Session<'a, T> {
    ledger: &'a mut DeltaLedger,
    lock: &'a LockCoordinator,
    gateway: &'a mut SettlementGateway<T>,
    sink: &'a mut Box<dyn DiagnosticsSink>,
    config: &'a LedgerConfig,
    session_id: SessionId,
    depth: usize,
}

impl<T: ValueTransfer> Session<'_, T> {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.session_id
    }

    /// Nesting depth: 0 for the top-level work, +1 per nested call.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pure accounting adjustment. Returns the new delta.
    pub fn adjust(&mut self, asset: &AssetId, amount: Delta) -> Result<Delta> {
        self.lock.ensure_locked()?;
        let delta = self.ledger.adjust(asset, amount)?;
        if amount != 0 {
            tracing::debug!(session = %self.session_id, %asset, amount, delta, depth = self.depth, "Adjust");
            self.sink.on_event(&LedgerEvent::Adjusted {
                session_id: self.session_id,
                asset: asset.clone(),
                amount,
                delta,
                depth: self.depth,
            });
        }
        Ok(delta)
    }

    /// Current delta for `asset`.
    #[must_use]
    pub fn read(&self, asset: &AssetId) -> Delta {
        self.ledger.read(asset)
    }

    #[must_use]
    pub fn is_fully_settled(&self) -> bool {
        self.ledger.is_fully_settled()
    }

    #[must_use]
    pub fn nonzero_count(&self) -> usize {
        self.ledger.nonzero_count()
    }

    /// Nonzero rows sorted by asset.
    #[must_use]
    pub fn outstanding(&self) -> Vec<LedgerEntry> {
        self.ledger.outstanding()
    }

    /// Record `amount` of `asset` received from outside.
    pub fn settle(&mut self, asset: &AssetId, amount: Delta) -> Result<Delta> {
        let delta = self.gateway.settle(self.lock, &mut *self.ledger, asset, amount)?;
        if amount != 0 {
            tracing::debug!(session = %self.session_id, %asset, amount, delta, "Settle");
            self.sink.on_event(&LedgerEvent::Settled {
                session_id: self.session_id,
                asset: asset.clone(),
                amount,
                delta,
            });
        }
        Ok(delta)
    }

    /// Pay `amount` of `asset` out to `recipient`.
    pub fn take(&mut self, asset: &AssetId, amount: Delta, recipient: AccountId) -> Result<Delta> {
        let delta = self
            .gateway
            .take(self.lock, &mut *self.ledger, asset, amount, recipient)?;
        if amount != 0 {
            tracing::debug!(session = %self.session_id, %asset, amount, %recipient, delta, "Take");
            self.sink.on_event(&LedgerEvent::Taken {
                session_id: self.session_id,
                asset: asset.clone(),
                amount,
                recipient,
                delta,
            });
        }
        Ok(delta)
    }

    /// Forfeit exactly the credit outstanding for `asset`.
    pub fn clear(&mut self, asset: &AssetId, amount: Delta) -> Result<()> {
        self.gateway.clear(self.lock, &mut *self.ledger, asset, amount)?;
        if amount != 0 {
            tracing::debug!(session = %self.session_id, %asset, amount, "Clear");
            self.sink.on_event(&LedgerEvent::Cleared {
                session_id: self.session_id,
                asset: asset.clone(),
                amount,
            });
        }
        Ok(())
    }

    /// Run a nested sub-operation as a savepoint.
    ///
    /// If `f` fails, the ledger mutations and movements it made are
    /// reverted and its error is returned; the session itself stays open.
    /// If `f` panics, the same revert happens before the panic resumes, so
    /// work that catches it still sees the savepoint state.
    ///
    /// # Errors
    /// - `CallDepthExceeded` if nesting would exceed `max_call_depth`
    /// - whatever `f` returns
    pub fn call<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session<'_, T>) -> Result<R>,
    {
        let depth = self.depth + 1;
        if depth > self.config.max_call_depth {
            return Err(FlashError::CallDepthExceeded {
                depth,
                limit: self.config.max_call_depth,
            });
        }

        let checkpoint = self.ledger.checkpoint();
        let mark = self.gateway.mark();

        self.depth = depth;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.depth = depth - 1;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                self.revert_nested(checkpoint, mark, depth, err.code());
                Err(err)
            }
            Err(payload) => {
                self.revert_nested(checkpoint, mark, depth, "PANIC");
                panic::resume_unwind(payload);
            }
        }
    }

    fn revert_nested(&mut self, checkpoint: Checkpoint, mark: MovementMark, depth: usize, code: &str) {
        let reverted = self.ledger.rollback_to(checkpoint);
        let failures = self
            .gateway
            .unwind_to(mark, self.config.compensate_on_abort);
        tracing::debug!(
            session = %self.session_id,
            depth,
            reverted,
            code,
            "Nested call reverted"
        );
        report_compensation_failures(&mut *self.sink, self.session_id, failures);
        self.sink.on_event(&LedgerEvent::NestedCallReverted {
            session_id: self.session_id,
            depth,
            reverted_adjustments: reverted,
            code: code.to_string(),
        });
    }

    /// Hand the session to an independent participant as a nested call.
    pub fn invoke(&mut self, participant: &mut dyn Participant<T>) -> Result<()> {
        self.call(|session| participant.on_call(session))
    }

    /// Attempt to open a new top-level session from inside this one.
    ///
    /// A `Session` borrows its dispatcher exclusively, so the borrow checker
    /// already rules out calling `CallbackDispatcher::run` from inside
    /// `work`. This entry point answers the attempt with the coordinator's
    /// open guard, which rejects with `SessionAlreadyActive` for as long as
    /// this handle holds the lock. `work` never runs and the current
    /// session is unaffected.
    pub fn run<R, F>(&mut self, _work: F) -> Result<R>
    where
        F: FnOnce(&mut Session<'_, T>) -> Result<R>,
    {
        Err(self
            .lock
            .check_idle()
            .err()
            .unwrap_or(FlashError::SessionAlreadyActive))
    }

    /// The value-transfer collaborator, read-only.
    #[must_use]
    pub fn collaborator(&self) -> &T {
        self.gateway.collaborator()
    }
}
