//! Indicator feed: turns closed exchange candles into interval-close and
//! crossover events for the signal gate.
//!
//! The feed preloads history so the MACD state is converged before any live
//! bar is processed; preloaded bars never emit events. For every live closed
//! bar it emits `IntervalClose` first and, when the bar crossed, `Crossover`
//! second, so the gate always sees the boundary before the signal printed on
//! it.

pub mod aggregator;
pub mod macd;

use crate::models::candle::Candle;
use crate::models::signal::{CrossoverSignal, IndicatorSnapshot};
use crate::models::timeframe::Timeframe;
use crate::services::exchange::ExchangeError;
use crate::services::market_data::MarketDataProvider;
use aggregator::CandleAggregator;
use macd::{MacdParams, MacdTracker};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Depth of the event channel between the feed and the gate.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Extra bars fetched beyond the strict warmup so the EMAs settle.
const WARMUP_MARGIN: usize = 4;

/// Event delivered to the signal gate, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A bar of the decision timeframe closed; carries the indicator values
    /// as of that close.
    IntervalClose(IndicatorSnapshot),
    /// The MACD line crossed its signal line on the bar that just closed.
    Crossover(CrossoverSignal),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to preload candle history: {0}")]
    History(#[source] ExchangeError),
    #[error("failed to open candle stream: {0}")]
    Stream(#[source] ExchangeError),
    #[error("feed already started")]
    AlreadyStarted,
}

/// One symbol/timeframe MACD pipeline. `start` preloads and spawns the
/// streaming task; `stop` aborts it.
pub struct IndicatorFeed {
    market: Arc<dyn MarketDataProvider>,
    symbol: String,
    timeframe: Timeframe,
    params: MacdParams,
    snapshot: Arc<RwLock<Option<IndicatorSnapshot>>>,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl IndicatorFeed {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        symbol: String,
        timeframe: Timeframe,
        params: MacdParams,
    ) -> Self {
        Self {
            market,
            symbol,
            timeframe,
            params,
            snapshot: Arc::new(RwLock::new(None)),
            handle: Arc::new(RwLock::new(None)),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Indicator values as of the most recently closed bar.
    pub async fn current_values(&self) -> Option<IndicatorSnapshot> {
        *self.snapshot.read().await
    }

    /// Preload history, converge the MACD state and spawn the live streaming
    /// task. Events go to `events`.
    pub async fn start(&self, events: mpsc::Sender<FeedEvent>) -> Result<(), FeedError> {
        if self.handle.read().await.is_some() {
            return Err(FeedError::AlreadyStarted);
        }

        let base = self.timeframe.base_interval();
        let factor = self.timeframe.aggregation_factor() as usize;
        let history_limit = (self.params.warmup_bars() + WARMUP_MARGIN) * factor;
        let history = self
            .market
            .recent_candles(&self.symbol, base, history_limit)
            .await
            .map_err(FeedError::History)?;

        let mut tracker = MacdTracker::new(self.params);
        let mut aggregator = CandleAggregator::new(self.timeframe);
        let mut bars = 0usize;
        let mut last_snapshot = None;
        for candle in history {
            if let Some(bar) = aggregator.push(candle) {
                bars += 1;
                if let Some(update) = tracker.update(bar.close) {
                    last_snapshot = Some(snapshot_of(&bar, update.point));
                }
            }
        }
        match last_snapshot {
            Some(snapshot) => {
                *self.snapshot.write().await = Some(snapshot);
                info!(
                    symbol = %self.symbol,
                    timeframe = %self.timeframe,
                    bars,
                    macd = snapshot.macd_line,
                    signal = snapshot.signal_line,
                    "IndicatorFeed: MACD converged from history"
                );
            }
            None => {
                warn!(
                    symbol = %self.symbol,
                    timeframe = %self.timeframe,
                    bars,
                    needed = self.params.warmup_bars(),
                    "IndicatorFeed: insufficient history, converging from live bars"
                );
            }
        }

        let stream = self
            .market
            .candle_stream(&self.symbol, base)
            .await
            .map_err(FeedError::Stream)?;

        let task = FeedTask {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            tracker,
            aggregator,
            snapshot: self.snapshot.clone(),
            events,
        };
        *self.handle.write().await = Some(tokio::spawn(task.run(stream)));
        info!(
            symbol = %self.symbol,
            timeframe = %self.timeframe,
            "IndicatorFeed: started"
        );
        Ok(())
    }

    /// Abort the streaming task. Safe to call when not started.
    pub async fn stop(&self) {
        if let Some(handle) = self.handle.write().await.take() {
            handle.abort();
            info!(symbol = %self.symbol, "IndicatorFeed: stopped");
        }
    }
}

struct FeedTask {
    symbol: String,
    timeframe: Timeframe,
    tracker: MacdTracker,
    aggregator: CandleAggregator,
    snapshot: Arc<RwLock<Option<IndicatorSnapshot>>>,
    events: mpsc::Sender<FeedEvent>,
}

impl FeedTask {
    async fn run(mut self, mut stream: mpsc::Receiver<Candle>) {
        while let Some(candle) = stream.recv().await {
            let Some(bar) = self.aggregator.push(candle) else {
                continue;
            };
            let Some(update) = self.tracker.update(bar.close) else {
                debug!(
                    symbol = %self.symbol,
                    close = bar.close,
                    "FeedTask: MACD warming up"
                );
                continue;
            };
            let snapshot = snapshot_of(&bar, update.point);
            *self.snapshot.write().await = Some(snapshot);
            if self
                .events
                .send(FeedEvent::IntervalClose(snapshot))
                .await
                .is_err()
            {
                break;
            }
            if let Some(kind) = update.crossover {
                let signal = CrossoverSignal {
                    direction: kind.direction(),
                    crossover_kind: kind,
                    price: bar.close,
                    timestamp: bar.end,
                    macd_line: update.point.macd_line,
                    signal_line: update.point.signal_line,
                    histogram: update.point.histogram,
                    timeframe: self.timeframe,
                };
                info!(
                    symbol = %self.symbol,
                    direction = %signal.direction,
                    price = signal.price,
                    macd = signal.macd_line,
                    signal_line = signal.signal_line,
                    "FeedTask: crossover detected"
                );
                if self.events.send(FeedEvent::Crossover(signal)).await.is_err() {
                    break;
                }
            }
        }
        debug!(symbol = %self.symbol, "FeedTask: stream ended");
    }
}

fn snapshot_of(bar: &Candle, point: macd::MacdPoint) -> IndicatorSnapshot {
    IndicatorSnapshot {
        price: bar.close,
        macd_line: point.macd_line,
        signal_line: point.signal_line,
        histogram: point.histogram,
        closed_at: bar.end,
    }
}
