//! Merges closed exchange candles into bars of the decision timeframe.

use crate::engine::interval::{interval_end, interval_start};
use crate::models::candle::Candle;
use crate::models::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Stateful aggregator for one symbol and timeframe. Base candles must be
/// closed and arrive oldest-first; out-of-order duplicates are dropped.
#[derive(Debug)]
pub struct CandleAggregator {
    timeframe: Timeframe,
    current: Option<Candle>,
    last_base_start: Option<DateTime<Utc>>,
}

impl CandleAggregator {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            current: None,
            last_base_start: None,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Feed one closed base candle. Returns the completed decision bar when
    /// the candle fills its bucket up to the bucket end.
    pub fn push(&mut self, candle: Candle) -> Option<Candle> {
        if let Some(last) = self.last_base_start {
            if candle.start <= last {
                debug!(
                    start = %candle.start,
                    "CandleAggregator: dropping stale or duplicate base candle"
                );
                return None;
            }
        }
        self.last_base_start = Some(candle.start);

        if self.timeframe.is_native() {
            return Some(candle);
        }

        let bucket = interval_start(candle.start, self.timeframe);
        let bucket_end = interval_end(bucket, self.timeframe);

        match self.current.as_mut() {
            Some(bar) if bar.start == bucket => {
                bar.merge(&candle);
            }
            Some(bar) => {
                // A gap in the base stream skipped the rest of the previous
                // bucket; its partial bar cannot be trusted as a closed bar.
                warn!(
                    dropped_bucket = %bar.start,
                    new_bucket = %bucket,
                    "CandleAggregator: gap in candle stream, discarding partial bar"
                );
                self.current = Some(open_bar(&candle, bucket));
            }
            None => {
                self.current = Some(open_bar(&candle, bucket));
            }
        }

        match self.current.as_ref() {
            Some(bar) if bar.end >= bucket_end => self.current.take(),
            _ => None,
        }
    }

    /// Bar under construction, if any. Exposed for feed diagnostics.
    pub fn pending(&self) -> Option<&Candle> {
        self.current.as_ref()
    }
}

fn open_bar(candle: &Candle, bucket: DateTime<Utc>) -> Candle {
    Candle {
        open: candle.open,
        high: candle.high,
        low: candle.low,
        close: candle.close,
        volume: candle.volume,
        start: bucket,
        end: candle.end,
    }
}
