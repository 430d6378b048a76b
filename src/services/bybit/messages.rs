//! Wire types for the Bybit v5 REST and WebSocket APIs.

use crate::models::candle::Candle;
use crate::models::timeframe::BaseInterval;
use crate::services::exchange::ExchangeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every v5 REST response.
#[derive(Debug, Deserialize)]
pub struct RestResponse<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct WalletBalanceResult {
    pub list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub total_equity: String,
    pub total_available_balance: String,
}

#[derive(Debug, Deserialize)]
pub struct TickerResult {
    pub list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    pub last_price: String,
}

#[derive(Debug, Deserialize)]
pub struct PositionListResult {
    pub list: Vec<PositionEntry>,
}

/// One row of `/v5/position/list`. `side` is `"Buy"`, `"Sell"` or `"None"`
/// and `size` is `"0"` when flat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEntry {
    pub symbol: String,
    pub side: String,
    pub size: String,
    #[serde(default)]
    pub avg_price: String,
}

#[derive(Debug, Deserialize)]
pub struct InstrumentListResult {
    pub list: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub lot_size_filter: LotSizeFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    pub qty_step: String,
    pub min_order_qty: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

#[derive(Debug, Deserialize)]
pub struct KlineResult {
    pub list: Vec<RawKline>,
}

/// Kline row as returned by `/v5/market/kline`:
/// `[start_ms, open, high, low, close, volume, turnover]`, newest first.
#[derive(Debug, Deserialize)]
pub struct RawKline(
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
);

impl RawKline {
    pub fn to_candle(&self, interval: BaseInterval) -> Result<Candle, ExchangeError> {
        let start_ms: i64 = self
            .0
            .parse()
            .map_err(|_| invalid_field("kline start", &self.0))?;
        let start = millis_to_datetime(start_ms)?;
        Ok(Candle {
            open: parse_price(&self.1, "kline open")?,
            high: parse_price(&self.2, "kline high")?,
            low: parse_price(&self.3, "kline low")?,
            close: parse_price(&self.4, "kline close")?,
            volume: parse_price(&self.5, "kline volume")?,
            start,
            end: start + interval.duration(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub category: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageRequest {
    pub category: String,
    pub symbol: String,
    pub buy_leverage: String,
    pub sell_leverage: String,
}

/// Acknowledgement / pong frame on the public stream.
#[derive(Debug, Deserialize)]
pub struct WsAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub ret_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WsKlineMessage {
    pub topic: String,
    pub data: Vec<WsKline>,
}

/// Kline payload on `kline.{interval}.{symbol}`. `confirm` is true only on
/// the final update of a bar.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsKline {
    pub start: i64,
    pub end: i64,
    pub interval: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub confirm: bool,
    pub timestamp: i64,
}

impl WsKline {
    pub fn to_candle(&self) -> Result<Candle, ExchangeError> {
        let start = millis_to_datetime(self.start)?;
        // Bybit reports `end` as the last millisecond of the bar; round up to
        // the exclusive close time.
        let end = millis_to_datetime(self.end + 1)?;
        Ok(Candle {
            open: parse_price(&self.open, "kline open")?,
            high: parse_price(&self.high, "kline high")?,
            low: parse_price(&self.low, "kline low")?,
            close: parse_price(&self.close, "kline close")?,
            volume: parse_price(&self.volume, "kline volume")?,
            start,
            end,
        })
    }
}

pub fn kline_topic(interval: BaseInterval, symbol: &str) -> String {
    format!("kline.{}.{}", interval.code(), symbol)
}

pub fn parse_price(value: &str, field: &str) -> Result<f64, ExchangeError> {
    value.parse().map_err(|_| invalid_field(field, value))
}

fn invalid_field(field: &str, value: &str) -> ExchangeError {
    ExchangeError::InvalidResponse(format!("{} '{}' is not numeric", field, value))
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, ExchangeError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ExchangeError::InvalidResponse(format!("timestamp {} out of range", ms)))
}
