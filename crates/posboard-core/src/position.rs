//! Position identity, lifecycle state, and snapshot types.
//!
//! A `PositionSnapshot` is the unit of exchange between journals and the
//! position board: an immutable-per-update description of one position.
//! The board only ever inspects `number` and `state`; every other field is
//! opaque display payload replaced wholesale on each update.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::decimal::{Price, Volume};
use crate::error::CoreError;

/// Globally unique position identifier.
///
/// Assigned by the owning journal and stable for the lifetime of the
/// position; the sole identity key used for row matching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PositionNumber(pub u64);

impl PositionNumber {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PositionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PositionNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Position lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionState {
    /// Entry orders are working, nothing filled yet.
    Opening,
    /// Position has open volume.
    Open,
    /// Exit orders are working.
    Closing,
    /// Fully closed.
    Done,
    /// Entry failed before any fill.
    OpeningFail,
    /// An exit order failed; position still has open volume.
    ClosingFail,
    /// Closed with surplus volume on the exit side.
    ClosingSurplus,
    /// Removed by the journal.
    Deleted,
}

impl PositionState {
    /// Whether a position in this state belongs in the materialized view.
    ///
    /// Only live positions are shown: opening, open, closing, or stuck in
    /// a failed close. Everything else must not appear.
    #[must_use]
    pub fn is_displayable(&self) -> bool {
        matches!(
            self,
            Self::Opening | Self::Open | Self::Closing | Self::ClosingFail
        )
    }

    /// Whether this state is terminal for the position lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::OpeningFail | Self::Deleted)
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opening => "Opening",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Done => "Done",
            Self::OpeningFail => "OpeningFail",
            Self::ClosingFail => "ClosingFail",
            Self::ClosingSurplus => "ClosingSurplus",
            Self::Deleted => "Deleted",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PositionState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Opening" => Ok(Self::Opening),
            "Open" => Ok(Self::Open),
            "Closing" => Ok(Self::Closing),
            "Done" => Ok(Self::Done),
            "OpeningFail" => Ok(Self::OpeningFail),
            "ClosingFail" => Ok(Self::ClosingFail),
            "ClosingSurplus" => Ok(Self::ClosingSurplus),
            "Deleted" => Ok(Self::Deleted),
            other => Err(CoreError::InvalidState(other.to_string())),
        }
    }
}

/// Position direction: long or short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" | "Buy" => Ok(Self::Buy),
            "sell" | "Sell" => Ok(Self::Sell),
            other => Err(CoreError::InvalidDirection(other.to_string())),
        }
    }
}

/// Snapshot of one position at a point in time.
///
/// Produced by a journal, consumed by the position board. Replaced
/// wholesale on every update for the same `number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Identity key. Stable for the lifetime of the position.
    pub number: PositionNumber,
    /// Current lifecycle state.
    pub state: PositionState,
    /// When the position was created.
    pub time_create: DateTime<Utc>,
    /// When the position was closed, if it has been.
    pub time_close: Option<DateTime<Utc>>,
    /// Name of the strategy that owns the position.
    pub bot_name: String,
    /// Instrument the position is in.
    pub security: String,
    /// Long or short.
    pub direction: Direction,
    /// Largest volume the position has held.
    pub max_volume: Volume,
    /// Currently open volume.
    pub open_volume: Volume,
    /// Volume still waiting in working orders.
    pub wait_volume: Volume,
    /// Average entry price.
    pub entry_price: Price,
    /// Average close price.
    pub close_price: Price,
    /// Profit in portfolio points.
    pub profit: Decimal,
    /// Whether a protective stop order is active.
    pub stop_order_is_active: bool,
    /// Stop order trigger level.
    pub stop_order_red_line: Price,
    /// Stop order execution price.
    pub stop_order_price: Price,
    /// Whether a profit-taking order is active.
    pub profit_order_is_active: bool,
    /// Profit order trigger level.
    pub profit_order_red_line: Price,
    /// Profit order execution price.
    pub profit_order_price: Price,
}

impl PositionSnapshot {
    /// Create a snapshot with the identity fields set and an empty payload.
    ///
    /// Display fields default to zero/inactive; callers fill in what they
    /// track. Sufficient for journals that only report volumes later.
    #[must_use]
    pub fn new(
        number: PositionNumber,
        state: PositionState,
        bot_name: impl Into<String>,
        security: impl Into<String>,
        direction: Direction,
        time_create: DateTime<Utc>,
    ) -> Self {
        Self {
            number,
            state,
            time_create,
            time_close: None,
            bot_name: bot_name.into(),
            security: security.into(),
            direction,
            max_volume: Volume::ZERO,
            open_volume: Volume::ZERO,
            wait_volume: Volume::ZERO,
            entry_price: Price::ZERO,
            close_price: Price::ZERO,
            profit: Decimal::ZERO,
            stop_order_is_active: false,
            stop_order_red_line: Price::ZERO,
            stop_order_price: Price::ZERO,
            profit_order_is_active: false,
            profit_order_red_line: Price::ZERO,
            profit_order_price: Price::ZERO,
        }
    }

    /// Whether this snapshot belongs in the materialized view.
    #[must_use]
    pub fn is_displayable(&self) -> bool {
        self.state.is_displayable()
    }
}
