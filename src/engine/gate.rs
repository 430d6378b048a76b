//! Interval-gated signal decisions.
//!
//! The gate is the single consumer of the feed's event channel, so decisions
//! are strictly serialized. At most one position decision is taken per
//! decision interval; at the interval close the entry direction is either
//! confirmed by the MACD posture or reversed on the spot. Failures of
//! individual actions are logged and absorbed: a broken order never stops
//! the event loop.

use crate::engine::interval::interval_start;
use crate::engine::position::PositionManager;
use crate::feed::{FeedEvent, IndicatorFeed};
use crate::metrics::Metrics;
use crate::models::signal::{
    CrossoverKind, CrossoverSignal, IndicatorSnapshot, SignalDirection,
};
use crate::models::strategy::{StatusInfo, StrategyState};
use crate::models::timeframe::Timeframe;
use crate::models::trade::PositionState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

pub struct SignalGate {
    timeframe: Timeframe,
    min_operation_interval: Duration,
    position: PositionManager,
    feed: Arc<IndicatorFeed>,
    metrics: Arc<Metrics>,
    status: Arc<RwLock<StatusInfo>>,
    state: StrategyState,
    current_interval: Option<DateTime<Utc>>,
    entry_signal: Option<CrossoverSignal>,
    signals_received: u64,
    signals_processed: u64,
    last_signal_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl SignalGate {
    pub fn new(
        position: PositionManager,
        feed: Arc<IndicatorFeed>,
        initial_state: StrategyState,
        min_operation_interval: Duration,
        metrics: Arc<Metrics>,
        status: Arc<RwLock<StatusInfo>>,
    ) -> Self {
        Self {
            timeframe: feed.timeframe(),
            min_operation_interval,
            position,
            feed,
            metrics,
            status,
            state: initial_state,
            current_interval: None,
            entry_signal: None,
            signals_received: 0,
            signals_processed: 0,
            last_signal_time: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn position_state(&self) -> PositionState {
        self.position.position()
    }

    pub fn entry_direction(&self) -> Option<SignalDirection> {
        self.entry_signal.as_ref().map(|s| s.direction)
    }

    pub fn counters(&self) -> (u64, u64) {
        (self.signals_received, self.signals_processed)
    }

    /// Consume feed events until the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) {
        info!(
            symbol = %self.position.symbol(),
            timeframe = %self.timeframe,
            state = %self.state,
            "SignalGate: running"
        );
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!(
            signals_received = self.signals_received,
            signals_processed = self.signals_processed,
            "SignalGate: event stream drained"
        );
    }

    pub async fn handle_event(&mut self, event: FeedEvent) {
        let _timer = self.metrics.signal_handling_duration_seconds.start_timer();
        match event {
            FeedEvent::IntervalClose(snapshot) => self.on_interval_close(snapshot).await,
            FeedEvent::Crossover(signal) => self.on_signal(signal).await,
        }
        self.publish_status().await;
    }

    async fn on_interval_close(&mut self, snapshot: IndicatorSnapshot) {
        // A bar's close time is the first instant of the next interval.
        let new_interval = interval_start(snapshot.closed_at, self.timeframe);
        self.advance_interval(new_interval, Some(snapshot)).await;
    }

    /// Move the gate to a new interval: run the pending confirmation, clear
    /// the per-interval slate and resolve flat drift. Re-announcements of the
    /// current interval are no-ops.
    async fn advance_interval(
        &mut self,
        new_interval: DateTime<Utc>,
        snapshot: Option<IndicatorSnapshot>,
    ) {
        if self.current_interval == Some(new_interval) {
            return;
        }
        if self.state == StrategyState::PositionOpened {
            self.confirm_entry(snapshot).await;
        }
        self.entry_signal = None;
        self.current_interval = Some(new_interval);
        if !self.position.position().is_open() {
            self.state = StrategyState::WaitingFirstSignal;
        }
        debug!(
            interval = %new_interval,
            state = %self.state,
            "SignalGate: interval advanced"
        );
    }

    /// Interval-close verdict on a position opened mid-interval: keep it when
    /// the MACD posture still supports the entry direction, otherwise reverse
    /// immediately at the closing price.
    async fn confirm_entry(&mut self, snapshot: Option<IndicatorSnapshot>) {
        let snapshot = match snapshot {
            Some(s) => s,
            None => match self.feed.current_values().await {
                Some(s) => s,
                None => {
                    warn!("SignalGate: no indicator values for confirmation, holding position");
                    self.state = StrategyState::WaitingReverseSignal;
                    return;
                }
            },
        };
        let direction = self
            .entry_signal
            .as_ref()
            .map(|s| s.direction)
            .or_else(|| self.position.position().direction());
        let Some(direction) = direction else {
            self.state = StrategyState::WaitingFirstSignal;
            return;
        };
        if snapshot.supports(direction) {
            info!(
                direction = %direction,
                macd = snapshot.macd_line,
                signal_line = snapshot.signal_line,
                "SignalGate: entry confirmed at interval close"
            );
            self.state = StrategyState::WaitingReverseSignal;
        } else {
            info!(
                direction = %direction,
                macd = snapshot.macd_line,
                signal_line = snapshot.signal_line,
                "SignalGate: interval close contradicts entry, reversing"
            );
            let trigger = reversal_trigger(direction.opposite(), &snapshot, self.timeframe);
            self.reverse_position(trigger).await;
        }
    }

    async fn on_signal(&mut self, signal: CrossoverSignal) {
        self.signals_received += 1;
        self.metrics.signals_received_total.inc();
        self.last_signal_time = Some(signal.timestamp);

        let bucket = interval_start(signal.timestamp, self.timeframe);
        match self.current_interval {
            None => self.current_interval = Some(bucket),
            Some(current) if current == bucket => {}
            Some(_) => {
                // The feed emits interval closes ahead of signals; reaching
                // here means a boundary slipped through, so catch up first.
                debug!(bucket = %bucket, "SignalGate: boundary inferred from signal");
                self.advance_interval(bucket, None).await;
            }
        }

        if let Some(last) = self.position.last_operation() {
            let since = last.elapsed();
            if since < self.min_operation_interval {
                info!(
                    direction = %signal.direction,
                    since_last_op = ?since,
                    "SignalGate: signal ignored by operation rate limit"
                );
                return;
            }
        }
        self.signals_processed += 1;
        self.metrics.signals_processed_total.inc();

        match self.state {
            StrategyState::WaitingFirstSignal => {
                info!(
                    direction = %signal.direction,
                    price = signal.price,
                    "SignalGate: first signal of interval, opening position"
                );
                self.open_from_signal(signal).await;
            }
            StrategyState::PositionOpened => {
                debug!(
                    direction = %signal.direction,
                    "SignalGate: signal blocked until interval close"
                );
            }
            StrategyState::WaitingReverseSignal => match self.position.position().direction() {
                Some(held) if held != signal.direction => {
                    info!(
                        from = %held,
                        to = %signal.direction,
                        price = signal.price,
                        "SignalGate: reverse signal, flipping position"
                    );
                    self.reverse_position(signal).await;
                }
                Some(_) => {
                    debug!(
                        direction = %signal.direction,
                        "SignalGate: signal matches held side, ignoring"
                    );
                }
                None => {
                    // Nothing actually held; treat this as a fresh entry.
                    self.state = StrategyState::WaitingFirstSignal;
                    self.open_from_signal(signal).await;
                }
            },
        }
    }

    async fn open_from_signal(&mut self, signal: CrossoverSignal) {
        match self
            .position
            .open_position(signal.direction, signal.price)
            .await
        {
            Ok(()) => {
                self.metrics.orders_placed_total.inc();
                self.state = StrategyState::PositionOpened;
                self.entry_signal = Some(signal);
            }
            Err(e) => {
                self.metrics.order_failures_total.inc();
                self.last_error = Some(format!("open failed: {}", e));
                error!(error = %e, "SignalGate: open aborted, awaiting next signal");
            }
        }
    }

    /// Close the held position and open the opposite side. A failed close
    /// aborts the reversal and leaves the position untouched; a failed reopen
    /// after a successful close leaves the engine flat until the next signal.
    async fn reverse_position(&mut self, trigger: CrossoverSignal) {
        self.metrics.position_reversals_total.inc();
        if let Err(e) = self.position.close_with_retry().await {
            self.metrics.order_failures_total.inc();
            self.last_error = Some(format!("close failed: {}", e));
            error!(error = %e, "SignalGate: close failed, reversal aborted");
            return;
        }
        match self
            .position
            .open_position(trigger.direction, trigger.price)
            .await
        {
            Ok(()) => {
                self.metrics.orders_placed_total.inc();
                self.state = StrategyState::PositionOpened;
                self.entry_signal = Some(trigger);
            }
            Err(e) => {
                self.metrics.order_failures_total.inc();
                self.last_error = Some(format!("reopen failed: {}", e));
                error!(
                    error = %e,
                    "SignalGate: closed but reopen failed, flat until next signal"
                );
                self.state = StrategyState::WaitingFirstSignal;
                self.entry_signal = None;
            }
        }
    }

    async fn publish_status(&self) {
        let mut status = self.status.write().await;
        status.position_state = self.position.position();
        status.strategy_state = Some(self.state);
        status.signals_received = self.signals_received;
        status.signals_processed = self.signals_processed;
        status.last_signal_time = self.last_signal_time;
        if let Some(err) = &self.last_error {
            status.last_error = Some(err.clone());
        }
    }
}

/// Signal standing in for a crossover when a reversal is decided by the
/// confirmation check rather than by an emitted crossover.
fn reversal_trigger(
    direction: SignalDirection,
    snapshot: &IndicatorSnapshot,
    timeframe: Timeframe,
) -> CrossoverSignal {
    CrossoverSignal {
        direction,
        crossover_kind: match direction {
            SignalDirection::Buy => CrossoverKind::Bullish,
            SignalDirection::Sell => CrossoverKind::Bearish,
        },
        price: snapshot.price,
        timestamp: snapshot.closed_at,
        macd_line: snapshot.macd_line,
        signal_line: snapshot.signal_line,
        histogram: snapshot.histogram,
        timeframe,
    }
}
