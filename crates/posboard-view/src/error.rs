//! Error types for the view reconciliation engine.

use thiserror::Error;

/// Errors a journal can raise when pulled for its open positions.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Journal unavailable: {0}")]
    Unavailable(String),

    #[error("Journal pull failed: {0}")]
    Pull(String),
}

/// Errors the render layer can raise from a view callback.
///
/// A view error never aborts the merge that triggered it; the row set is
/// the source of truth whether or not it was successfully displayed.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Render failed: {0}")]
    Render(String),
}
