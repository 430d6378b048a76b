//! Candle sourcing interface for the indicator feed.

use crate::models::candle::Candle;
use crate::models::timeframe::BaseInterval;
use crate::services::bybit::rest::BybitRestClient;
use crate::services::bybit::ws::BybitWsClient;
use crate::services::exchange::ExchangeError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Recent closed candles, oldest first, for indicator warmup.
    async fn recent_candles(
        &self,
        symbol: &str,
        interval: BaseInterval,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Live stream of closed candles. The stream ends when the provider shuts
    /// down or the receiver is dropped.
    async fn candle_stream(
        &self,
        symbol: &str,
        interval: BaseInterval,
    ) -> Result<mpsc::Receiver<Candle>, ExchangeError>;

    /// Release any streaming resources. Default is a no-op.
    async fn shutdown(&self) {}
}

/// Live provider: REST klines for history, public WebSocket for the stream.
pub struct BybitMarketData {
    rest: Arc<BybitRestClient>,
    ws: BybitWsClient,
}

impl BybitMarketData {
    pub fn new(rest: Arc<BybitRestClient>, ws_url: String) -> Self {
        Self {
            rest,
            ws: BybitWsClient::new(ws_url),
        }
    }
}

#[async_trait]
impl MarketDataProvider for BybitMarketData {
    async fn recent_candles(
        &self,
        symbol: &str,
        interval: BaseInterval,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let candles = self.rest.klines(symbol, interval, limit).await?;
        info!(
            symbol,
            interval = %interval,
            count = candles.len(),
            "BybitMarketData: fetched candle history"
        );
        Ok(candles)
    }

    async fn candle_stream(
        &self,
        symbol: &str,
        interval: BaseInterval,
    ) -> Result<mpsc::Receiver<Candle>, ExchangeError> {
        Ok(self.ws.stream_closed_klines(symbol, interval).await)
    }

    async fn shutdown(&self) {
        self.ws.stop().await;
    }
}

/// Replay provider for tests and offline runs: fixed history plus a channel
/// the caller pushes live candles into.
pub struct ScriptedMarketData {
    history: Vec<Candle>,
    live: Mutex<Option<mpsc::Receiver<Candle>>>,
}

impl ScriptedMarketData {
    /// Returns the provider and the sender that feeds its live stream.
    pub fn new(history: Vec<Candle>) -> (Self, mpsc::Sender<Candle>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                history,
                live: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedMarketData {
    async fn recent_candles(
        &self,
        _symbol: &str,
        _interval: BaseInterval,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let skip = self.history.len().saturating_sub(limit);
        Ok(self.history[skip..].to_vec())
    }

    async fn candle_stream(
        &self,
        _symbol: &str,
        _interval: BaseInterval,
    ) -> Result<mpsc::Receiver<Candle>, ExchangeError> {
        self.live.lock().await.take().ok_or_else(|| {
            ExchangeError::InvalidResponse("scripted candle stream already consumed".to_string())
        })
    }
}
