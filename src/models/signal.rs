//! Crossover signals and indicator snapshots produced by the feed.

use crate::models::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction implied by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Buy,
    Sell,
}

impl SignalDirection {
    pub fn opposite(&self) -> SignalDirection {
        match self {
            SignalDirection::Buy => SignalDirection::Sell,
            SignalDirection::Sell => SignalDirection::Buy,
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Buy => write!(f, "Buy"),
            SignalDirection::Sell => write!(f, "Sell"),
        }
    }
}

/// Which way the MACD line crossed its signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverKind {
    Bullish,
    Bearish,
}

impl CrossoverKind {
    pub fn direction(&self) -> SignalDirection {
        match self {
            CrossoverKind::Bullish => SignalDirection::Buy,
            CrossoverKind::Bearish => SignalDirection::Sell,
        }
    }
}

impl fmt::Display for CrossoverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossoverKind::Bullish => write!(f, "Bullish"),
            CrossoverKind::Bearish => write!(f, "Bearish"),
        }
    }
}

/// A MACD/signal-line crossover observed on a closed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverSignal {
    pub direction: SignalDirection,
    pub crossover_kind: CrossoverKind,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    pub timeframe: Timeframe,
}

/// Indicator values as of the most recently closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    pub closed_at: DateTime<Utc>,
}

impl IndicatorSnapshot {
    /// Whether the MACD posture still favors the given trade direction.
    pub fn supports(&self, direction: SignalDirection) -> bool {
        match direction {
            SignalDirection::Buy => self.macd_line > self.signal_line,
            SignalDirection::Sell => self.macd_line < self.signal_line,
        }
    }
}
