//! Position board actor: registry and view materializer.
//!
//! Provides a single-threaded actor that owns the materialized row set
//! (number -> latest displayable snapshot) and applies every mutation,
//! event-driven or poll-driven, through one merge routine. Producers on
//! any thread funnel into the actor's channel, so no two merges ever
//! interleave and view callbacks fire in merge order.
//!
//! # Dual State: Actor vs Handle
//!
//! - Actor state (`rows: HashMap`) is authoritative and updated only via
//!   message processing.
//! - Handle state (`rows_cache: DashMap`) mirrors it for synchronous reads
//!   (`snapshot`, `get`, `contains`) without an async round-trip. It is
//!   written only by the actor, after the authoritative update.
//!
//! # Epochs
//!
//! The registry epoch makes teardown win every race: `unregister_all`
//! bumps the epoch before enqueueing `Reset`, and the actor discards any
//! event or reconcile union stamped with a stale epoch. A journal
//! de-registered mid-pass can therefore never resurrect rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use posboard_core::{PositionNumber, PositionSnapshot};

use crate::config::BoardConfig;
use crate::diagnostics::{DynDiagnostics, Severity};
use crate::ingress::EventSender;
use crate::journal::DynJournal;
use crate::view::DynPositionView;

// ============================================================================
// PositionBoardMsg
// ============================================================================

/// Messages for the position board actor.
#[derive(Debug)]
pub enum PositionBoardMsg {
    /// A journal reported a position change (event path).
    PositionChanged {
        /// The changed position.
        snapshot: PositionSnapshot,
        /// Registry epoch the producer was subscribed under.
        epoch: u64,
    },

    /// A reconciliation pass finished pulling all journals (poll path).
    Reconcile {
        /// Union of every journal's currently reported open positions.
        union: Vec<PositionSnapshot>,
        /// Registry epoch observed before the pass started pulling.
        epoch: u64,
    },

    /// Registry teardown: clear everything.
    Reset,

    /// Graceful shutdown.
    Shutdown,
}

// ============================================================================
// PositionBoardTask
// ============================================================================

/// Position board actor task.
///
/// Runs in its own tokio task, processing messages sequentially.
/// Maintains the authoritative row set and drives the view callbacks.
pub struct PositionBoardTask {
    /// Message receiver.
    rx: mpsc::Receiver<PositionBoardMsg>,

    /// Authoritative row set: number -> latest displayable snapshot.
    rows: HashMap<PositionNumber, PositionSnapshot>,

    /// Mirror of `rows` for synchronous handle reads.
    rows_cache: Arc<DashMap<PositionNumber, PositionSnapshot>>,

    /// Current registry epoch (shared with the handle).
    epoch: Arc<AtomicU64>,

    /// Render-layer callbacks.
    view: DynPositionView,

    /// Non-fatal error sink.
    diagnostics: DynDiagnostics,
}

impl PositionBoardTask {
    /// Run the position board actor.
    ///
    /// Processes messages until Shutdown is received or every sender is
    /// dropped.
    pub async fn run(mut self) {
        debug!("PositionBoardTask started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                PositionBoardMsg::Shutdown => {
                    debug!("PositionBoardTask shutting down");
                    break;
                }
                PositionBoardMsg::PositionChanged { snapshot, epoch } => {
                    if self.is_stale(epoch) {
                        trace!(position = %snapshot.number, "dropping event from stale epoch");
                        continue;
                    }
                    self.merge(snapshot);
                }
                PositionBoardMsg::Reconcile { union, epoch } => {
                    if self.is_stale(epoch) {
                        trace!("dropping reconcile union from stale epoch");
                        continue;
                    }
                    self.reconcile(union);
                }
                PositionBoardMsg::Reset => self.reset(),
            }
        }

        debug!("PositionBoardTask terminated");
    }

    fn is_stale(&self, epoch: u64) -> bool {
        epoch != self.epoch.load(Ordering::Acquire)
    }

    /// Apply one snapshot to the row set (shared by both update paths).
    ///
    /// Non-displayable states remove the row (no-op if absent);
    /// displayable states insert or replace it wholesale.
    fn merge(&mut self, snapshot: PositionSnapshot) {
        let number = snapshot.number;

        if !snapshot.is_displayable() {
            if self.rows.remove(&number).is_some() {
                self.rows_cache.remove(&number);
                trace!(position = %number, state = %snapshot.state, "position left the view");
                self.signal_remove(number);
            }
            return;
        }

        trace!(position = %number, state = %snapshot.state, "position upserted");
        self.rows.insert(number, snapshot.clone());
        self.rows_cache.insert(number, snapshot.clone());
        self.signal_upsert(&snapshot);
    }

    /// Apply a reconciliation pass result.
    ///
    /// Converges the row set to exactly the polled union: every polled
    /// snapshot is upserted first, then rows the poll no longer reports
    /// are removed. A row is never transiently lost during the pass.
    fn reconcile(&mut self, union: Vec<PositionSnapshot>) {
        // Key by number; within one pass the later journal wins.
        let mut polled: HashMap<PositionNumber, PositionSnapshot> =
            HashMap::with_capacity(union.len());
        for snapshot in union {
            if snapshot.is_displayable() {
                polled.insert(snapshot.number, snapshot);
            }
        }

        for snapshot in polled.values() {
            self.rows.insert(snapshot.number, snapshot.clone());
            self.rows_cache.insert(snapshot.number, snapshot.clone());
            self.signal_upsert(snapshot);
        }

        let gone: Vec<PositionNumber> = self
            .rows
            .keys()
            .filter(|number| !polled.contains_key(number))
            .copied()
            .collect();

        for number in gone {
            self.rows.remove(&number);
            self.rows_cache.remove(&number);
            self.signal_remove(number);
        }

        debug!(rows = self.rows.len(), "reconcile pass applied");
    }

    /// Clear the row set after registry teardown.
    fn reset(&mut self) {
        let dropped = self.rows.len();
        self.rows.clear();
        self.rows_cache.clear();

        if let Err(e) = self.view.on_reset() {
            self.diagnostics
                .report(&format!("view reset failed: {e}"), Severity::Error);
        }

        debug!(dropped, "board reset");
    }

    fn signal_upsert(&self, snapshot: &PositionSnapshot) {
        if let Err(e) = self.view.on_upsert(snapshot) {
            self.diagnostics.report(
                &format!("view upsert failed for position {}: {e}", snapshot.number),
                Severity::Error,
            );
        }
    }

    fn signal_remove(&self, number: PositionNumber) {
        if let Err(e) = self.view.on_remove(number) {
            self.diagnostics.report(
                &format!("view remove failed for position {number}: {e}"),
                Severity::Error,
            );
        }
    }
}

// ============================================================================
// PositionBoardHandle
// ============================================================================

/// Handle for interacting with the position board actor.
///
/// Provides journal registration and teardown, an event-sender factory
/// for the push path, and synchronous row reads off the mirrored cache.
#[derive(Clone)]
pub struct PositionBoardHandle {
    /// Message sender.
    pub(crate) tx: mpsc::Sender<PositionBoardMsg>,

    /// Mirror of the actor's row set.
    rows_cache: Arc<DashMap<PositionNumber, PositionSnapshot>>,

    /// Registered journals, deduplicated by name.
    pub(crate) journals: Arc<RwLock<Vec<DynJournal>>>,

    /// Current registry epoch.
    pub(crate) epoch: Arc<AtomicU64>,

    /// Non-fatal error sink.
    pub(crate) diagnostics: DynDiagnostics,

    /// Bound on the registration-time initial pull.
    pull_timeout: Duration,
}

impl PositionBoardHandle {
    // === Registry ===

    /// Register a journal.
    ///
    /// No-ops if a journal with the same name is already registered.
    /// Otherwise subscribes the journal for push notifications and
    /// immediately pulls its open positions through the merge path, so a
    /// late-joining journal does not wait for the next pass to appear.
    pub async fn register(&self, journal: DynJournal) {
        let name = journal.name().to_string();

        {
            let mut journals = self.journals.write();
            if journals.iter().any(|j| j.name() == name) {
                debug!(journal = %name, "journal already registered, ignoring");
                return;
            }
            journals.push(journal.clone());
        }

        journal.subscribe(self.event_sender());

        let epoch = self.epoch.load(Ordering::Acquire);
        match tokio::time::timeout(self.pull_timeout, journal.open_positions()).await {
            Ok(Ok(positions)) => {
                debug!(journal = %name, count = positions.len(), "initial pull on registration");
                for snapshot in positions {
                    if self
                        .tx
                        .send(PositionBoardMsg::PositionChanged { snapshot, epoch })
                        .await
                        .is_err()
                    {
                        debug!("board channel closed during initial pull");
                        return;
                    }
                }
            }
            Ok(Err(e)) => self.diagnostics.report(
                &format!("initial pull from journal '{name}' failed: {e}"),
                Severity::Error,
            ),
            Err(_) => self.diagnostics.report(
                &format!("initial pull from journal '{name}' timed out"),
                Severity::Error,
            ),
        }
    }

    /// Unregister every journal and clear the board.
    ///
    /// A hard reset: bumps the epoch so in-flight events and passes from
    /// the old registration become inert, then clears the row set and
    /// signals exactly one `on_reset` to the view.
    pub async fn unregister_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);

        let dropped = {
            let mut journals = self.journals.write();
            let count = journals.len();
            journals.clear();
            count
        };
        debug!(journals = dropped, "unregistered all journals");

        let _ = self.tx.send(PositionBoardMsg::Reset).await;
    }

    /// Mint an event sender stamped with the current epoch.
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(
            self.tx.clone(),
            self.epoch.load(Ordering::Acquire),
            self.diagnostics.clone(),
        )
    }

    /// Number of registered journals.
    #[must_use]
    pub fn journal_count(&self) -> usize {
        self.journals.read().len()
    }

    // === Sync reads (cache lookups) ===

    /// Get a snapshot of every row currently in the view.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PositionSnapshot> {
        self.rows_cache.iter().map(|r| r.value().clone()).collect()
    }

    /// Get the current row for a position number.
    #[must_use]
    pub fn get(&self, number: PositionNumber) -> Option<PositionSnapshot> {
        self.rows_cache.get(&number).map(|r| r.value().clone())
    }

    /// Whether a position number currently has a row.
    #[must_use]
    pub fn contains(&self, number: PositionNumber) -> bool {
        self.rows_cache.contains_key(&number)
    }

    /// Number of rows currently in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows_cache.len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows_cache.is_empty()
    }

    // === Lifecycle ===

    /// Request graceful shutdown of the actor.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(PositionBoardMsg::Shutdown).await;
    }
}

// ============================================================================
// Spawn function
// ============================================================================

/// Spawn the position board actor.
///
/// Returns a handle for interaction and a join handle for the task.
/// The reconciliation scheduler is spawned separately; see
/// [`crate::scheduler::ReconcileScheduler`].
#[must_use]
pub fn spawn_position_board(
    config: &BoardConfig,
    view: DynPositionView,
    diagnostics: DynDiagnostics,
) -> (PositionBoardHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    let rows_cache = Arc::new(DashMap::new());
    let epoch = Arc::new(AtomicU64::new(0));

    let task = PositionBoardTask {
        rx,
        rows: HashMap::new(),
        rows_cache: rows_cache.clone(),
        epoch: epoch.clone(),
        view,
        diagnostics: diagnostics.clone(),
    };

    let handle = PositionBoardHandle {
        tx,
        rows_cache,
        journals: Arc::new(RwLock::new(Vec::new())),
        epoch,
        diagnostics,
        pull_timeout: Duration::from_millis(config.pull_timeout_ms),
    };

    let join_handle = tokio::spawn(task.run());

    (handle, join_handle)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use posboard_core::{Direction, PositionState};

    use crate::diagnostics::CollectingDiagnostics;
    use crate::journal::MockJournal;
    use crate::view::{RecordingView, ViewCall};

    fn sample(number: u64, state: PositionState) -> PositionSnapshot {
        PositionSnapshot::new(
            PositionNumber::new(number),
            state,
            "bot-a",
            "BTCUSDT",
            Direction::Buy,
            Utc::now(),
        )
    }

    fn spawn_board() -> (
        PositionBoardHandle,
        Arc<RecordingView>,
        Arc<CollectingDiagnostics>,
    ) {
        let view = Arc::new(RecordingView::new());
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let (handle, _join) = spawn_position_board(
            &BoardConfig::default(),
            view.clone(),
            diagnostics.clone(),
        );
        (handle, view, diagnostics)
    }

    async fn settle() {
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_merge_upserts_and_replaces_by_number() {
        let (handle, view, _diagnostics) = spawn_board();
        let events = handle.event_sender();

        events.position_changed(sample(1, PositionState::Opening));
        events.position_changed(sample(1, PositionState::Open));
        settle().await;

        // One row per number, latest state wins.
        assert_eq!(handle.len(), 1);
        assert_eq!(
            handle.get(PositionNumber::new(1)).unwrap().state,
            PositionState::Open
        );
        assert_eq!(view.upserts_for(PositionNumber::new(1)), 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (handle, _view, _diagnostics) = spawn_board();
        let events = handle.event_sender();

        let snapshot = sample(1, PositionState::Open);
        events.position_changed(snapshot.clone());
        settle().await;
        let after_first = handle.snapshot();

        events.position_changed(snapshot);
        settle().await;
        let after_second = handle.snapshot();

        assert_eq!(after_first, after_second);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_displayable_removes_row() {
        let (handle, view, _diagnostics) = spawn_board();
        let events = handle.event_sender();

        events.position_changed(sample(1, PositionState::Open));
        events.position_changed(sample(1, PositionState::Done));
        settle().await;

        assert!(handle.is_empty());
        assert_eq!(view.removes_for(PositionNumber::new(1)), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_displayable_for_unknown_number_is_silent() {
        let (handle, view, _diagnostics) = spawn_board();
        let events = handle.event_sender();

        events.position_changed(sample(9, PositionState::Deleted));
        settle().await;

        assert!(handle.is_empty());
        assert!(view.calls().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconcile_converges_to_union() {
        let (handle, view, _diagnostics) = spawn_board();
        let events = handle.event_sender();

        events.position_changed(sample(1, PositionState::Open));
        events.position_changed(sample(2, PositionState::Open));
        settle().await;
        view.clear();

        // Poll reports #2 (still open) and #3 (new); #1 is gone.
        let epoch = handle.epoch.load(Ordering::Acquire);
        handle
            .tx
            .send(PositionBoardMsg::Reconcile {
                union: vec![sample(2, PositionState::Closing), sample(3, PositionState::Open)],
                epoch,
            })
            .await
            .unwrap();
        settle().await;

        assert_eq!(handle.len(), 2);
        assert!(!handle.contains(PositionNumber::new(1)));
        assert_eq!(
            handle.get(PositionNumber::new(2)).unwrap().state,
            PositionState::Closing
        );
        assert_eq!(view.upserts_for(PositionNumber::new(3)), 1);
        assert_eq!(view.removes_for(PositionNumber::new(1)), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconcile_empty_union_clears_rows() {
        let (handle, view, _diagnostics) = spawn_board();
        let events = handle.event_sender();

        events.position_changed(sample(1, PositionState::Open));
        events.position_changed(sample(2, PositionState::Open));
        settle().await;

        let epoch = handle.epoch.load(Ordering::Acquire);
        handle
            .tx
            .send(PositionBoardMsg::Reconcile {
                union: Vec::new(),
                epoch,
            })
            .await
            .unwrap();
        settle().await;

        assert!(handle.is_empty());
        assert_eq!(view.removes_for(PositionNumber::new(1)), 1);
        assert_eq!(view.removes_for(PositionNumber::new(2)), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconcile_drops_non_displayable_union_entries() {
        let (handle, _view, _diagnostics) = spawn_board();

        let epoch = handle.epoch.load(Ordering::Acquire);
        handle
            .tx
            .send(PositionBoardMsg::Reconcile {
                union: vec![sample(1, PositionState::Open), sample(2, PositionState::Done)],
                epoch,
            })
            .await
            .unwrap();
        settle().await;

        assert_eq!(handle.len(), 1);
        assert!(handle.contains(PositionNumber::new(1)));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_deduplicates_by_name() {
        let (handle, _view, _diagnostics) = spawn_board();

        let journal = Arc::new(MockJournal::new("bot-a"));
        journal.set_positions(vec![sample(1, PositionState::Open)]);

        handle.register(journal.clone()).await;
        settle().await;
        assert_eq!(handle.len(), 1);
        assert_eq!(journal.pull_count(), 1);

        // Same name again: no second pull, registry unchanged.
        let twin = Arc::new(MockJournal::new("bot-a"));
        twin.set_positions(vec![sample(2, PositionState::Open)]);
        handle.register(twin.clone()).await;
        settle().await;

        assert_eq!(handle.journal_count(), 1);
        assert_eq!(twin.pull_count(), 0);
        assert_eq!(handle.len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_failed_pull_is_reported_not_fatal() {
        let (handle, _view, diagnostics) = spawn_board();

        let journal = Arc::new(MockJournal::new("bot-a"));
        journal.set_failing(true);

        handle.register(journal.clone()).await;
        settle().await;

        assert_eq!(handle.journal_count(), 1);
        assert!(handle.is_empty());
        assert_eq!(diagnostics.error_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_unregister_all_resets_once() {
        let (handle, view, _diagnostics) = spawn_board();

        let journal = Arc::new(MockJournal::new("bot-a"));
        journal.set_positions(vec![sample(1, PositionState::Open)]);
        handle.register(journal).await;
        settle().await;

        handle.unregister_all().await;
        settle().await;

        assert!(handle.is_empty());
        assert_eq!(handle.journal_count(), 0);
        assert_eq!(view.reset_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stale_epoch_event_is_discarded() {
        let (handle, _view, _diagnostics) = spawn_board();

        // Sender minted before teardown keeps the old epoch.
        let stale = handle.event_sender();
        handle.unregister_all().await;
        settle().await;

        stale.position_changed(sample(1, PositionState::Open));
        settle().await;

        assert!(handle.is_empty());

        // A sender minted after teardown is live again.
        handle
            .event_sender()
            .position_changed(sample(1, PositionState::Open));
        settle().await;
        assert_eq!(handle.len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_view_failure_does_not_corrupt_rows() {
        let (handle, view, diagnostics) = spawn_board();
        let events = handle.event_sender();

        view.set_failing(true);
        events.position_changed(sample(1, PositionState::Open));
        settle().await;

        // Row set is the source of truth; failure only reaches diagnostics.
        assert_eq!(handle.len(), 1);
        assert_eq!(diagnostics.error_count(), 1);

        // Later callbacks still flow once the view recovers.
        view.set_failing(false);
        events.position_changed(sample(1, PositionState::Done));
        settle().await;

        assert!(handle.is_empty());
        assert!(view
            .calls()
            .iter()
            .any(|call| matches!(call, ViewCall::Remove(n) if *n == PositionNumber::new(1))));

        handle.shutdown().await;
    }
}
