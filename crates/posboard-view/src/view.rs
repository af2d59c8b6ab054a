//! Render-layer callbacks for the materialized view.
//!
//! The engine makes no assumption about rendering technology; it only
//! requires that callbacks are applied in the order the merge determined.
//! They are always invoked from the single board actor task, so
//! implementations never see two callbacks at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use posboard_core::{PositionNumber, PositionSnapshot};

use crate::error::ViewError;

/// Callbacks exposed to the rendering layer.
///
/// An `Err` from any callback is reported to diagnostics and otherwise
/// ignored: the row set has already been updated and remains the source
/// of truth.
pub trait PositionView: Send + Sync {
    /// A position entered the view or its row was replaced.
    fn on_upsert(&self, snapshot: &PositionSnapshot) -> Result<(), ViewError>;

    /// A position left the view.
    fn on_remove(&self, number: PositionNumber) -> Result<(), ViewError>;

    /// The whole view was cleared (registry teardown).
    fn on_reset(&self) -> Result<(), ViewError>;
}

/// Arc wrapper for PositionView trait objects.
pub type DynPositionView = Arc<dyn PositionView>;

/// One recorded view callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Upsert(PositionSnapshot),
    Remove(PositionNumber),
    Reset,
}

/// Recording view for tests.
///
/// Records every callback in invocation order and can be armed to fail,
/// for exercising the render-failure path.
#[derive(Debug, Default)]
pub struct RecordingView {
    calls: parking_lot::Mutex<Vec<ViewCall>>,
    failing: AtomicBool,
}

impl RecordingView {
    /// Create a new recording view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm or disarm callback failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get all recorded calls in invocation order.
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().clone()
    }

    /// Count upserts recorded for a given position number.
    pub fn upserts_for(&self, number: PositionNumber) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ViewCall::Upsert(s) if s.number == number))
            .count()
    }

    /// Count removes recorded for a given position number.
    pub fn removes_for(&self, number: PositionNumber) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ViewCall::Remove(n) if *n == number))
            .count()
    }

    /// Count reset callbacks.
    pub fn reset_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ViewCall::Reset))
            .count()
    }

    /// Clear recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: ViewCall) -> Result<(), ViewError> {
        self.calls.lock().push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ViewError::Render("recording view armed to fail".into()));
        }
        Ok(())
    }
}

impl PositionView for RecordingView {
    fn on_upsert(&self, snapshot: &PositionSnapshot) -> Result<(), ViewError> {
        self.record(ViewCall::Upsert(snapshot.clone()))
    }

    fn on_remove(&self, number: PositionNumber) -> Result<(), ViewError> {
        self.record(ViewCall::Remove(number))
    }

    fn on_reset(&self) -> Result<(), ViewError> {
        self.record(ViewCall::Reset)
    }
}
