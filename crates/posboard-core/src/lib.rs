//! Core domain types for the posboard position view.
//!
//! This crate provides the value types shared by the reconciliation engine:
//! - `PositionNumber`: globally unique position identity
//! - `PositionState`: position lifecycle states and displayability
//! - `PositionSnapshot`: immutable-per-update description of one position
//! - `Price`, `Volume`: precision-safe numeric types

pub mod decimal;
pub mod error;
pub mod position;

pub use decimal::{Price, Volume};
pub use error::{CoreError, Result};
pub use position::{Direction, PositionNumber, PositionSnapshot, PositionState};
