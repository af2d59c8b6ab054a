//! Event ingress: the push path from journals into the board actor.
//!
//! An `EventSender` may be cloned into any number of producer tasks and
//! called at any rate. It never blocks the caller beyond the enqueue
//! itself: a full queue drops the event and reports it, relying on the
//! next reconciliation pass to self-heal.
//!
//! Each sender is stamped with the registry epoch current at subscription
//! time. `unregister_all` bumps the epoch, so events from de-registered
//! journals (including ones already queued) are discarded by the actor
//! instead of resurrecting rows after a reset.

use tokio::sync::mpsc;
use tracing::debug;

use posboard_core::PositionSnapshot;

use crate::board::PositionBoardMsg;
use crate::diagnostics::{DynDiagnostics, Severity};

/// Non-blocking, epoch-stamped sender for position change notifications.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PositionBoardMsg>,
    epoch: u64,
    diagnostics: DynDiagnostics,
}

impl EventSender {
    pub(crate) fn new(
        tx: mpsc::Sender<PositionBoardMsg>,
        epoch: u64,
        diagnostics: DynDiagnostics,
    ) -> Self {
        Self {
            tx,
            epoch,
            diagnostics,
        }
    }

    /// Notify the board that a position changed.
    ///
    /// Callable from any task or thread. Never blocks: if the board queue
    /// is full the event is dropped and reported, and the position will be
    /// picked up by the next reconciliation pass.
    pub fn position_changed(&self, snapshot: PositionSnapshot) {
        let number = snapshot.number;
        match self.tx.try_send(PositionBoardMsg::PositionChanged {
            snapshot,
            epoch: self.epoch,
        }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.diagnostics.report(
                    &format!("board queue full, dropped update for position {number}"),
                    Severity::Error,
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(position = %number, "board channel closed, dropping position event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    use posboard_core::{Direction, PositionNumber, PositionSnapshot, PositionState};

    use crate::diagnostics::CollectingDiagnostics;

    fn sample(number: u64) -> PositionSnapshot {
        PositionSnapshot::new(
            PositionNumber::new(number),
            PositionState::Open,
            "bot-a",
            "BTCUSDT",
            Direction::Buy,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_reports() {
        let (tx, mut rx) = mpsc::channel(1);
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let sender = EventSender::new(tx, 0, diagnostics.clone());

        sender.position_changed(sample(1));
        sender.position_changed(sample(2));

        // First event sits in the queue, second was dropped and reported.
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.reports()[0].1.contains("#2"));

        let msg = rx.recv().await.unwrap();
        assert!(
            matches!(msg, PositionBoardMsg::PositionChanged { snapshot, .. } if snapshot.number == PositionNumber::new(1))
        );
    }

    #[tokio::test]
    async fn test_closed_channel_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let sender = EventSender::new(tx, 0, diagnostics.clone());

        sender.position_changed(sample(3));

        // Closed channel is a shutdown condition, not a reportable error.
        assert_eq!(diagnostics.error_count(), 0);
    }
}
