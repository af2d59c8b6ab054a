//! Materialized open-position view reconciliation engine.
//!
//! Keeps a single deduplicated-by-number view of all currently open
//! positions across any number of independent journals, under two
//! partially redundant update paths:
//!
//! - **events**: journals push `PositionChanged` notifications from any
//!   task through an [`EventSender`];
//! - **polling**: a [`ReconcileScheduler`] periodically pulls every
//!   registered journal's full open-position set and converges the view
//!   to the union, self-healing missed or reordered events.
//!
//! Both paths funnel into one single-consumer actor that owns the row set,
//! so no two merges ever interleave. Conflicts on the same position number
//! resolve last-applied-wins at the actor queue, not by data recency.
//!
//! # Key Components
//!
//! - [`Journal`]: source collaborator producing [`PositionSnapshot`]s
//! - [`PositionBoardHandle`]: registration, teardown, and sync row reads
//! - [`EventSender`]: non-blocking event ingress for journals
//! - [`ReconcileScheduler`]: periodic full-state reconciliation loop
//! - [`PositionView`]: render-layer callbacks (upsert / remove / reset)
//! - [`Diagnostics`]: fire-and-forget sink for non-fatal errors
//!
//! [`PositionSnapshot`]: posboard_core::PositionSnapshot

pub mod board;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ingress;
pub mod journal;
pub mod scheduler;
pub mod view;

pub use board::{spawn_position_board, PositionBoardHandle, PositionBoardMsg, PositionBoardTask};
pub use config::BoardConfig;
pub use diagnostics::{
    CollectingDiagnostics, Diagnostics, DynDiagnostics, LogDiagnostics, Severity,
};
pub use error::{JournalError, ViewError};
pub use ingress::EventSender;
pub use journal::{BoxFuture, DynJournal, Journal, MockJournal};
pub use scheduler::ReconcileScheduler;
pub use view::{DynPositionView, PositionView, RecordingView, ViewCall};
