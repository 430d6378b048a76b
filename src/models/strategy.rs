//! Strategy configuration and runtime status models.

use crate::models::timeframe::Timeframe;
use crate::models::trade::PositionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision state of the signal gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyState {
    /// Flat, waiting for the first crossover of the current interval.
    WaitingFirstSignal,
    /// A position was opened this interval; further signals are blocked until
    /// the interval closes and the entry direction is confirmed.
    PositionOpened,
    /// Holding a confirmed position, acting only on opposite-direction signals.
    WaitingReverseSignal,
}

impl fmt::Display for StrategyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyState::WaitingFirstSignal => write!(f, "WaitingFirstSignal"),
            StrategyState::PositionOpened => write!(f, "PositionOpened"),
            StrategyState::WaitingReverseSignal => write!(f, "WaitingReverseSignal"),
        }
    }
}

/// How the order quantity is derived from account funds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SizingRule {
    /// Fixed amount of quote currency committed per trade.
    Fixed(f64),
    /// Percentage of the available balance committed per trade.
    Percentage(f64),
}

impl SizingRule {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SizingRule::Fixed(amount) if *amount <= 0.0 => Err(format!(
                "fixed sizing amount must be positive, got {}",
                amount
            )),
            SizingRule::Percentage(pct) if *pct <= 0.0 || *pct > 100.0 => {
                Err(format!("percentage sizing must be in (0, 100], got {}", pct))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SizingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingRule::Fixed(amount) => write!(f, "fixed {}", amount),
            SizingRule::Percentage(pct) => write!(f, "{}% of balance", pct),
        }
    }
}

/// Optional exchange-side take-profit / stop-loss brackets, expressed as price
/// point offsets from the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpSlSettings {
    pub enabled: bool,
    pub take_profit_points: f64,
    pub stop_loss_points: f64,
}

impl Default for TpSlSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            take_profit_points: 0.0,
            stop_loss_points: 0.0,
        }
    }
}

/// Per-account strategy settings loaded from the settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySettings {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub leverage: u32,
    pub sizing: SizingRule,
    #[serde(default)]
    pub tp_sl: TpSlSettings,
}

/// Runtime status exposed over the control API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub active: bool,
    pub strategy_name: Option<String>,
    pub symbol: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub position_state: PositionState,
    pub strategy_state: Option<StrategyState>,
    pub signals_received: u64,
    pub signals_processed: u64,
    pub last_signal_time: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for StatusInfo {
    fn default() -> Self {
        Self {
            active: false,
            strategy_name: None,
            symbol: None,
            timeframe: None,
            position_state: PositionState::Flat,
            strategy_state: None,
            signals_received: 0,
            signals_processed: 0,
            last_signal_time: None,
            started_at: None,
            last_error: None,
        }
    }
}
