//! Reconciliation scheduler: the periodic full-state poll path.
//!
//! On a fixed cadence the scheduler pulls every registered journal's
//! current open-position set, unions the results, and hands the union to
//! the board actor, which converges the row set to exactly it. The poll
//! path self-heals whatever the event path missed: dropped events, late
//! notifications, positions that silently vanished from a journal.
//!
//! Journals are pulled concurrently and each pull is bounded by the
//! configured timeout, so one slow or hanging journal cannot stall the
//! others. A failed pull is reported and contributes an empty set to the
//! pass; the next tick naturally retries.

use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use posboard_core::PositionSnapshot;

use crate::board::{PositionBoardHandle, PositionBoardMsg};
use crate::config::BoardConfig;
use crate::diagnostics::Severity;
use crate::journal::DynJournal;

/// Background task driving periodic reconciliation passes.
pub struct ReconcileScheduler {
    /// Handle to the board actor and journal registry.
    board: PositionBoardHandle,
    /// Pass interval.
    poll_interval: Duration,
    /// Per-journal pull bound.
    pull_timeout: Duration,
    /// Explicit stop signal from the owning process.
    shutdown: CancellationToken,
}

impl ReconcileScheduler {
    /// Create a new scheduler.
    ///
    /// The caller owns the token; cancelling it stops the loop after the
    /// current pass.
    #[must_use]
    pub fn new(
        config: &BoardConfig,
        board: PositionBoardHandle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            board,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            pull_timeout: Duration::from_millis(config.pull_timeout_ms),
            shutdown,
        }
    }

    /// Run the reconciliation loop until cancelled.
    pub async fn run(self) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            pull_timeout_ms = self.pull_timeout.as_millis() as u64,
            "ReconcileScheduler started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("ReconcileScheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.reconcile_pass().await {
                        break;
                    }
                }
            }
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Returns false when the board actor is gone and the loop should end.
    async fn reconcile_pass(&self) -> bool {
        // Epoch before pulling: if teardown lands mid-pass, the union is
        // stale on arrival and the actor discards it.
        let epoch = self.board.epoch.load(Ordering::Acquire);
        let journals: Vec<DynJournal> = self.board.journals.read().clone();

        if journals.is_empty() {
            trace!("no journals registered, skipping pass");
            return true;
        }

        let pulls = journals.iter().map(|journal| {
            let journal = journal.clone();
            let pull_timeout = self.pull_timeout;
            let diagnostics = self.board.diagnostics.clone();
            async move {
                match tokio::time::timeout(pull_timeout, journal.open_positions()).await {
                    Ok(Ok(positions)) => positions,
                    Ok(Err(e)) => {
                        diagnostics.report(
                            &format!("pull from journal '{}' failed: {e}", journal.name()),
                            Severity::Error,
                        );
                        Vec::new()
                    }
                    Err(_) => {
                        diagnostics.report(
                            &format!("pull from journal '{}' timed out", journal.name()),
                            Severity::Error,
                        );
                        Vec::new()
                    }
                }
            }
        });

        let union: Vec<PositionSnapshot> =
            join_all(pulls).await.into_iter().flatten().collect();

        trace!(
            journals = journals.len(),
            polled = union.len(),
            "reconcile pass pulled"
        );

        if self
            .board
            .tx
            .send(PositionBoardMsg::Reconcile { union, epoch })
            .await
            .is_err()
        {
            debug!("board channel closed, stopping ReconcileScheduler");
            return false;
        }

        true
    }
}
