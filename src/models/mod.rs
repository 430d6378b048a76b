//! Shared data models used across the service and engine layers.

pub mod candle;
pub mod signal;
pub mod strategy;
pub mod timeframe;
pub mod trade;

pub use candle::Candle;
pub use signal::{CrossoverKind, CrossoverSignal, IndicatorSnapshot, SignalDirection};
pub use strategy::{
    SizingRule, StatusInfo, StrategySettings, StrategyState, TpSlSettings,
};
pub use timeframe::{BaseInterval, Timeframe};
pub use trade::{PositionState, TradeRecord, TradeStatus};
