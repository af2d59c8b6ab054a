//! Journal trait: the position source collaborator.
//!
//! A journal is an independent producer of position snapshots for one
//! strategy or instrument stream. The engine consumes it through a narrow
//! interface: a name (registration identity), a pull of its current open
//! positions, and an optional push subscription.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use posboard_core::PositionSnapshot;

use crate::error::JournalError;
use crate::ingress::EventSender;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// An independent producer of position snapshots.
///
/// Registration identity is the name: two journals with equal names are
/// the same journal to the registry, regardless of reference identity.
pub trait Journal: Send + Sync {
    /// Journal name, unique across registered journals.
    fn name(&self) -> &str;

    /// Pull the journal's current open-position set.
    ///
    /// May legitimately be empty. Errors are isolated per journal: a
    /// failed pull contributes nothing to the pass that issued it.
    fn open_positions(&self) -> BoxFuture<'_, Result<Vec<PositionSnapshot>, JournalError>>;

    /// Hand the journal a sender for push notifications.
    ///
    /// Called once on registration. Poll-only journals can ignore it.
    fn subscribe(&self, _events: EventSender) {}
}

/// Arc wrapper for Journal trait objects.
pub type DynJournal = Arc<dyn Journal>;

/// Mock journal for testing.
///
/// Serves a configurable position list, can be armed to fail pulls, and
/// exposes the subscription sender so tests can emit events on its behalf.
#[derive(Default)]
pub struct MockJournal {
    name: String,
    positions: parking_lot::Mutex<Vec<PositionSnapshot>>,
    failing: AtomicBool,
    pull_count: AtomicU64,
    events: parking_lot::Mutex<Option<EventSender>>,
}

impl MockJournal {
    /// Create a new mock journal with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Replace the position list served by `open_positions`.
    pub fn set_positions(&self, positions: Vec<PositionSnapshot>) {
        *self.positions.lock() = positions;
    }

    /// Arm or disarm pull failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of pulls issued against this journal.
    pub fn pull_count(&self) -> u64 {
        self.pull_count.load(Ordering::SeqCst)
    }

    /// Whether the journal has been subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.events.lock().is_some()
    }

    /// Push a change notification, as the real journal would on a fill.
    ///
    /// No-op when the journal was never subscribed.
    pub fn emit(&self, snapshot: PositionSnapshot) {
        if let Some(events) = self.events.lock().as_ref() {
            events.position_changed(snapshot);
        }
    }
}

impl Journal for MockJournal {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_positions(&self) -> BoxFuture<'_, Result<Vec<PositionSnapshot>, JournalError>> {
        Box::pin(async move {
            self.pull_count.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(JournalError::Pull("mock journal armed to fail".into()));
            }
            Ok(self.positions.lock().clone())
        })
    }

    fn subscribe(&self, events: EventSender) {
        *self.events.lock() = Some(events);
    }
}
