//! Incremental MACD calculation with crossover detection.

use crate::models::signal::CrossoverKind;
use serde::{Deserialize, Serialize};

/// MACD period configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl MacdParams {
    /// Closed bars needed before the tracker produces values: the slow EMA
    /// seeds after `slow` bars, the signal EMA after `signal` MACD samples.
    pub fn warmup_bars(&self) -> usize {
        self.slow + self.signal
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fast == 0 || self.slow == 0 || self.signal == 0 {
            return Err("MACD periods must be positive".to_string());
        }
        if self.fast >= self.slow {
            return Err(format!(
                "MACD fast period ({}) must be below the slow period ({})",
                self.fast, self.slow
            ));
        }
        Ok(())
    }
}

/// MACD values for one closed bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// Outcome of feeding one close into the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdUpdate {
    pub point: MacdPoint,
    pub crossover: Option<CrossoverKind>,
}

/// EMA seeded with the SMA of its first `period` samples, then updated with
/// the standard smoothing recurrence.
#[derive(Debug, Clone)]
struct EmaState {
    period: usize,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl EmaState {
    fn new(period: usize) -> Self {
        Self {
            period,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    fn update(&mut self, sample: f64) -> Option<f64> {
        match self.value {
            Some(previous) => {
                let k = 2.0 / (self.period as f64 + 1.0);
                let next = (sample - previous) * k + previous;
                self.value = Some(next);
                self.value
            }
            None => {
                self.seed_sum += sample;
                self.seed_count += 1;
                if self.seed_count >= self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
                self.value
            }
        }
    }
}

/// Streaming MACD state. Feed it closed-bar closes in order; it yields values
/// once the slow and signal EMAs have both seeded.
#[derive(Debug, Clone)]
pub struct MacdTracker {
    params: MacdParams,
    fast_ema: EmaState,
    slow_ema: EmaState,
    signal_ema: EmaState,
    last: Option<MacdPoint>,
}

impl MacdTracker {
    pub fn new(params: MacdParams) -> Self {
        Self {
            params,
            fast_ema: EmaState::new(params.fast),
            slow_ema: EmaState::new(params.slow),
            signal_ema: EmaState::new(params.signal),
            last: None,
        }
    }

    pub fn params(&self) -> MacdParams {
        self.params
    }

    /// True once at least one full MACD point has been produced.
    pub fn is_ready(&self) -> bool {
        self.last.is_some()
    }

    pub fn last_point(&self) -> Option<MacdPoint> {
        self.last
    }

    /// Advance the tracker with one closed-bar close. Returns `None` while
    /// still warming up.
    pub fn update(&mut self, close: f64) -> Option<MacdUpdate> {
        let fast = self.fast_ema.update(close);
        let slow = self.slow_ema.update(close);
        let (fast, slow) = match (fast, slow) {
            (Some(f), Some(s)) => (f, s),
            _ => return None,
        };
        let macd_line = fast - slow;
        let signal_line = self.signal_ema.update(macd_line)?;
        let point = MacdPoint {
            macd_line,
            signal_line,
            histogram: macd_line - signal_line,
        };
        let crossover = self.last.and_then(|prev| detect_crossover(prev, point));
        self.last = Some(point);
        Some(MacdUpdate { point, crossover })
    }
}

/// Crossover between two consecutive MACD points: the sign of
/// `macd_line - signal_line` flipping marks a signal.
pub fn detect_crossover(prev: MacdPoint, next: MacdPoint) -> Option<CrossoverKind> {
    let before = prev.macd_line - prev.signal_line;
    let after = next.macd_line - next.signal_line;
    if before <= 0.0 && after > 0.0 {
        Some(CrossoverKind::Bullish)
    } else if before >= 0.0 && after < 0.0 {
        Some(CrossoverKind::Bearish)
    } else {
        None
    }
}
