//! Position and trade record models.

use crate::models::signal::SignalDirection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the currently held position, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        !matches!(self, PositionState::Flat)
    }

    /// Direction that entering this side corresponds to.
    pub fn direction(&self) -> Option<SignalDirection> {
        match self {
            PositionState::Flat => None,
            PositionState::Long => Some(SignalDirection::Buy),
            PositionState::Short => Some(SignalDirection::Sell),
        }
    }

    pub fn from_direction(direction: SignalDirection) -> Self {
        match direction {
            SignalDirection::Buy => PositionState::Long,
            SignalDirection::Sell => PositionState::Short,
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Flat => write!(f, "Flat"),
            PositionState::Long => write!(f, "Long"),
            PositionState::Short => write!(f, "Short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "Open"),
            TradeStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// One round trip (or open leg) recorded in the trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Option<i64>,
    pub account: String,
    pub symbol: String,
    pub side: PositionState,
    pub quantity: f64,
    pub entry_price: f64,
    pub order_id: String,
    pub opened_at: DateTime<Utc>,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: TradeStatus,
}

impl TradeRecord {
    pub fn open(
        account: String,
        symbol: String,
        side: PositionState,
        quantity: f64,
        entry_price: f64,
        order_id: String,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            account,
            symbol,
            side,
            quantity,
            entry_price,
            order_id,
            opened_at,
            exit_price: None,
            pnl: None,
            closed_at: None,
            status: TradeStatus::Open,
        }
    }
}
