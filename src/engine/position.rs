//! Position lifecycle: opening, retry-protected closing and adoption of
//! positions left open by a previous run.

use crate::db::TradeLedger;
use crate::engine::error::PositionError;
use crate::engine::sizing::PositionSizer;
use crate::models::signal::SignalDirection;
use crate::models::strategy::{StrategySettings, StrategyState, TpSlSettings};
use crate::models::trade::{PositionState, TradeRecord};
use crate::services::exchange::{ExchangeError, ExchangeGateway};
use backon::{ConstantBuilder, Retryable};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Retry budget for closes. `attempts` counts total attempts including the
/// first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenTrade {
    ledger_id: Option<i64>,
    quantity: f64,
    entry_price: f64,
}

/// Tracks the engine's view of the held position and performs all order
/// operations against the gateway.
pub struct PositionManager {
    gateway: Arc<dyn ExchangeGateway>,
    sizer: PositionSizer,
    ledger: Arc<dyn TradeLedger>,
    settings: StrategySettings,
    account: String,
    retry: RetryPolicy,
    state: PositionState,
    last_operation: Option<Instant>,
    open_trade: Option<OpenTrade>,
}

impl PositionManager {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Arc<dyn TradeLedger>,
        settings: StrategySettings,
        account: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sizer: PositionSizer::new(gateway.clone()),
            gateway,
            ledger,
            settings,
            account,
            retry,
            state: PositionState::Flat,
            last_operation: None,
            open_trade: None,
        }
    }

    pub fn position(&self) -> PositionState {
        self.state
    }

    pub fn symbol(&self) -> &str {
        &self.settings.symbol
    }

    /// Completion time of the most recent successful order operation.
    pub fn last_operation(&self) -> Option<Instant> {
        self.last_operation
    }

    /// Query the exchange for a position left open by an earlier run. An
    /// inherited position is adopted as-is and the gate starts waiting for a
    /// reverse signal; a flat account starts from scratch.
    pub async fn determine_initial_state(&mut self) -> Result<StrategyState, ExchangeError> {
        let positions = self.gateway.get_positions(&self.settings.symbol).await?;
        match positions.iter().find(|p| p.side.is_open() && p.size > 0.0) {
            Some(position) => {
                self.state = position.side;
                info!(
                    symbol = %self.settings.symbol,
                    side = %position.side,
                    size = position.size,
                    entry_price = position.entry_price,
                    "PositionManager: adopted existing position"
                );
                Ok(StrategyState::WaitingReverseSignal)
            }
            None => {
                self.state = PositionState::Flat;
                debug!(symbol = %self.settings.symbol, "PositionManager: no existing position");
                Ok(StrategyState::WaitingFirstSignal)
            }
        }
    }

    /// Size and place a market order in the signal direction. On failure the
    /// engine stays flat and nothing is recorded.
    pub async fn open_position(
        &mut self,
        direction: SignalDirection,
        signal_price: f64,
    ) -> Result<(), PositionError> {
        let quantity = self
            .sizer
            .calculate(&self.settings.sizing, self.settings.leverage, &self.settings.symbol)
            .await?;
        let (take_profit, stop_loss) =
            bracket_prices(&self.settings.tp_sl, direction, signal_price);
        let ack = self
            .gateway
            .place_market_order(
                &self.settings.symbol,
                direction,
                quantity,
                take_profit,
                stop_loss,
            )
            .await
            .map_err(PositionError::Order)?;

        self.state = PositionState::from_direction(direction);
        self.last_operation = Some(Instant::now());

        let record = TradeRecord::open(
            self.account.clone(),
            self.settings.symbol.clone(),
            self.state,
            quantity,
            signal_price,
            ack.order_id.clone(),
            Utc::now(),
        );
        let ledger_id = match self.ledger.create_trade(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "PositionManager: trade ledger write failed, trading continues");
                None
            }
        };
        self.open_trade = Some(OpenTrade {
            ledger_id,
            quantity,
            entry_price: signal_price,
        });

        info!(
            symbol = %self.settings.symbol,
            direction = %direction,
            quantity,
            order_id = %ack.order_id,
            "PositionManager: position opened"
        );
        Ok(())
    }

    /// Close the held position, retrying retryable errors up to the policy
    /// budget. The exchange reporting no position counts as success: the
    /// desired end state is flat either way.
    pub async fn close_with_retry(&mut self) -> Result<(), PositionError> {
        if self.state == PositionState::Flat {
            debug!(symbol = %self.settings.symbol, "PositionManager: close requested while flat");
            return Ok(());
        }

        let backoff = ConstantBuilder::default()
            .with_delay(self.retry.delay)
            .with_max_times(self.retry.attempts.saturating_sub(1) as usize);
        let gateway = self.gateway.clone();
        let symbol = self.settings.symbol.clone();
        let result = (|| {
            let gateway = gateway.clone();
            let symbol = symbol.clone();
            async move { gateway.close_position(&symbol).await }
        })
        .retry(backoff)
        .when(|e: &ExchangeError| e.is_retryable())
        .notify(|err: &ExchangeError, dur: Duration| {
            warn!(
                error = %err,
                retry_in = ?dur,
                "PositionManager: close attempt failed, retrying"
            );
        })
        .await;

        match result {
            Ok(ack) => {
                info!(
                    symbol = %self.settings.symbol,
                    order_id = %ack.order_id,
                    "PositionManager: position closed"
                );
                self.finish_close().await;
                Ok(())
            }
            Err(ExchangeError::PositionNotFound) => {
                info!(
                    symbol = %self.settings.symbol,
                    "PositionManager: no position on exchange, close treated as complete"
                );
                self.finish_close().await;
                Ok(())
            }
            Err(source) => Err(PositionError::CloseExhausted {
                attempts: self.retry.attempts,
                source,
            }),
        }
    }

    async fn finish_close(&mut self) {
        let closed_side = self.state;
        self.state = PositionState::Flat;
        self.last_operation = Some(Instant::now());

        let Some(open) = self.open_trade.take() else {
            return;
        };
        let Some(id) = open.ledger_id else {
            return;
        };
        let exit_price = match self.gateway.get_price(&self.settings.symbol).await {
            Ok(price) => price,
            Err(e) => {
                debug!(error = %e, "PositionManager: exit price unavailable, using entry");
                open.entry_price
            }
        };
        let pnl = match closed_side {
            PositionState::Long => (exit_price - open.entry_price) * open.quantity,
            PositionState::Short => (open.entry_price - exit_price) * open.quantity,
            PositionState::Flat => 0.0,
        };
        if let Err(e) = self.ledger.close_trade(id, exit_price, pnl, Utc::now()).await {
            error!(error = %e, trade = id, "PositionManager: failed to record trade close");
        }
    }
}

/// Exchange-side bracket prices from configured point offsets. Disabled or
/// non-positive offsets yield no bracket.
fn bracket_prices(
    tp_sl: &TpSlSettings,
    direction: SignalDirection,
    entry: f64,
) -> (Option<f64>, Option<f64>) {
    if !tp_sl.enabled {
        return (None, None);
    }
    let take_profit = (tp_sl.take_profit_points > 0.0).then(|| match direction {
        SignalDirection::Buy => entry + tp_sl.take_profit_points,
        SignalDirection::Sell => entry - tp_sl.take_profit_points,
    });
    let stop_loss = (tp_sl.stop_loss_points > 0.0).then(|| match direction {
        SignalDirection::Buy => entry - tp_sl.stop_loss_points,
        SignalDirection::Sell => entry + tp_sl.stop_loss_points,
    });
    (take_profit, stop_loss)
}
