//! Diagnostics sinks.
//!
//! Every session state transition is handed to a [`DiagnosticsSink`] as a
//! [`LedgerEvent`]. Sinks are notification-only: the core never reads
//! anything back from them.

use std::{cell::RefCell, rc::Rc};

use flashledger_types::{LedgerEvent, constants};

/// Observer for ledger state transitions.
pub trait DiagnosticsSink {
    fn on_event(&mut self, event: &LedgerEvent);
}

/// Discards every event. The dispatcher default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn on_event(&mut self, _event: &LedgerEvent) {}
}

/// Re-emits events as `tracing` records under the
/// [`EVENT_TARGET`](constants::EVENT_TARGET) target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn on_event(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::SessionClosed { receipt } => tracing::info!(
                target: constants::EVENT_TARGET,
                event = event.label(),
                session = %receipt.session_id,
                adjustments = receipt.adjustments,
                transfers = receipt.transfer_count(),
                digest = %receipt.digest_hex(),
                "Ledger event"
            ),
            LedgerEvent::SessionAborted {
                session_id, code, ..
            } => tracing::warn!(
                target: constants::EVENT_TARGET,
                event = event.label(),
                session = %session_id,
                code = %code,
                "Ledger event"
            ),
            LedgerEvent::CompensationFailed {
                session_id,
                movement,
                reason,
            } => tracing::error!(
                target: constants::EVENT_TARGET,
                event = event.label(),
                session = %session_id,
                movement = %movement,
                reason = %reason,
                "Ledger event"
            ),
            other => tracing::debug!(
                target: constants::EVENT_TARGET,
                event = other.label(),
                session = %other.session_id(),
                detail = ?other,
                "Ledger event"
            ),
        }
    }
}

/// Collects events in memory. Clones share the same buffer, so a test or
/// monitor can keep one handle while the dispatcher owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<LedgerEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.borrow().clone()
    }

    /// Labels of every event recorded so far, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(LedgerEvent::label).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl DiagnosticsSink for RecordingSink {
    fn on_event(&mut self, event: &LedgerEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Forwards each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn DiagnosticsSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl DiagnosticsSink for FanoutSink {
    fn on_event(&mut self, event: &LedgerEvent) {
        for sink in &mut self.sinks {
            sink.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashledger_types::SessionId;

    #[test]
    fn recording_clones_share_buffer() {
        let recorder = RecordingSink::new();
        let mut handle = recorder.clone();
        handle.on_event(&LedgerEvent::SessionOpened {
            session_id: SessionId::new(),
        });
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.labels(), ["open"]);
        recorder.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        let mut fanout = FanoutSink::new().with(a.clone()).with(TracingSink).with(b.clone());
        fanout.on_event(&LedgerEvent::SessionOpened {
            session_id: SessionId::new(),
        });
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
