//! Simulated exchange for paper trading and tests.
//!
//! Fills every market order instantly at the last known price, tracks one
//! position per symbol and applies realized PnL to the balance. Tests can
//! inject failures for upcoming orders or closes.

use crate::models::signal::SignalDirection;
use crate::models::trade::PositionState;
use crate::services::bybit::rest::BybitRestClient;
use crate::services::exchange::{
    Balance, ExchangeError, ExchangeGateway, OrderAck, PositionInfo, QuantityRules,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Order accepted by the paper exchange, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperOrder {
    pub symbol: String,
    pub side: SignalDirection,
    pub quantity: f64,
    pub reduce_only: bool,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

#[derive(Debug, Clone)]
struct PaperPosition {
    side: PositionState,
    size: f64,
    entry_price: f64,
}

#[derive(Debug, Default)]
struct PaperState {
    balance: Balance,
    prices: HashMap<String, f64>,
    positions: HashMap<String, PaperPosition>,
    leverage: HashMap<String, u32>,
    rules: QuantityRules,
    orders: Vec<PaperOrder>,
    next_order_id: u64,
    fail_orders: u32,
    fail_closes: u32,
}

pub struct PaperExchange {
    state: Mutex<PaperState>,
    // Optional live price lookup for paper runs against real market data.
    price_oracle: Option<Arc<BybitRestClient>>,
}

impl PaperExchange {
    pub fn new() -> Self {
        let mut state = PaperState::default();
        state.balance = Balance {
            free: 10_000.0,
            total: 10_000.0,
        };
        Self {
            state: Mutex::new(state),
            price_oracle: None,
        }
    }

    /// Resolve prices through the public ticker endpoint instead of the
    /// locally seeded map.
    pub fn with_price_oracle(mut self, rest: Arc<BybitRestClient>) -> Self {
        self.price_oracle = Some(rest);
        self
    }

    pub async fn set_balance(&self, free: f64, total: f64) {
        let mut state = self.state.lock().await;
        state.balance = Balance { free, total };
    }

    pub async fn set_price(&self, symbol: &str, price: f64) {
        self.state
            .lock()
            .await
            .prices
            .insert(symbol.to_string(), price);
    }

    pub async fn set_rules(&self, rules: QuantityRules) {
        self.state.lock().await.rules = rules;
    }

    /// Pre-seed an open position, as if left behind by an earlier run.
    pub async fn seed_position(&self, symbol: &str, side: PositionState, size: f64, entry: f64) {
        self.state.lock().await.positions.insert(
            symbol.to_string(),
            PaperPosition {
                side,
                size,
                entry_price: entry,
            },
        );
    }

    /// Fail the next `n` opening orders with a retryable venue error.
    pub async fn fail_next_orders(&self, n: u32) {
        self.state.lock().await.fail_orders = n;
    }

    /// Fail the next `n` close attempts with a retryable venue error.
    pub async fn fail_next_closes(&self, n: u32) {
        self.state.lock().await.fail_closes = n;
    }

    pub async fn orders(&self) -> Vec<PaperOrder> {
        self.state.lock().await.orders.clone()
    }

    pub async fn open_position(&self, symbol: &str) -> Option<PositionInfo> {
        let state = self.state.lock().await;
        state.positions.get(symbol).map(|p| PositionInfo {
            symbol: symbol.to_string(),
            side: p.side,
            size: p.size,
            entry_price: p.entry_price,
        })
    }

    async fn resolve_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        if let Some(oracle) = &self.price_oracle {
            return oracle.last_price(symbol).await;
        }
        self.state
            .lock()
            .await
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::PriceUnavailable(symbol.to_string()))
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeGateway for PaperExchange {
    async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        Ok(self.state.lock().await.balance)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.state
            .lock()
            .await
            .leverage
            .insert(symbol.to_string(), leverage);
        debug!(symbol, leverage, "PaperExchange: leverage set");
        Ok(())
    }

    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        self.resolve_price(symbol).await
    }

    async fn get_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, ExchangeError> {
        Ok(self
            .open_position(symbol)
            .await
            .into_iter()
            .collect())
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: SignalDirection,
        quantity: f64,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<OrderAck, ExchangeError> {
        let fill_price = self.resolve_price(symbol).await?;
        let mut state = self.state.lock().await;
        if state.fail_orders > 0 {
            state.fail_orders -= 1;
            return Err(ExchangeError::Api {
                code: 10016,
                message: "injected order failure".to_string(),
            });
        }
        if state.positions.contains_key(symbol) {
            return Err(ExchangeError::Api {
                code: 110044,
                message: format!("position already open for {}", symbol),
            });
        }
        state.orders.push(PaperOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
            reduce_only: false,
            take_profit,
            stop_loss,
        });
        state.positions.insert(
            symbol.to_string(),
            PaperPosition {
                side: PositionState::from_direction(side),
                size: quantity,
                entry_price: fill_price,
            },
        );
        state.next_order_id += 1;
        let order_id = format!("paper-{}", state.next_order_id);
        info!(
            symbol,
            side = %side,
            quantity,
            fill_price,
            order_id = %order_id,
            "PaperExchange: order filled"
        );
        Ok(OrderAck { order_id })
    }

    async fn close_position(&self, symbol: &str) -> Result<OrderAck, ExchangeError> {
        {
            let mut state = self.state.lock().await;
            if state.fail_closes > 0 {
                state.fail_closes -= 1;
                return Err(ExchangeError::Api {
                    code: 10016,
                    message: "injected close failure".to_string(),
                });
            }
        }
        let exit_price = self.resolve_price(symbol).await.ok();
        let mut state = self.state.lock().await;
        let position = state
            .positions
            .remove(symbol)
            .ok_or(ExchangeError::PositionNotFound)?;
        let exit_price = exit_price.unwrap_or(position.entry_price);
        let pnl = match position.side {
            PositionState::Long => (exit_price - position.entry_price) * position.size,
            PositionState::Short => (position.entry_price - exit_price) * position.size,
            PositionState::Flat => 0.0,
        };
        state.balance.free += pnl;
        state.balance.total += pnl;
        let exit_side = match position.side {
            PositionState::Long => SignalDirection::Sell,
            _ => SignalDirection::Buy,
        };
        state.orders.push(PaperOrder {
            symbol: symbol.to_string(),
            side: exit_side,
            quantity: position.size,
            reduce_only: true,
            take_profit: None,
            stop_loss: None,
        });
        state.next_order_id += 1;
        let order_id = format!("paper-{}", state.next_order_id);
        info!(
            symbol,
            closed_side = %position.side,
            size = position.size,
            exit_price,
            pnl,
            order_id = %order_id,
            "PaperExchange: position closed"
        );
        Ok(OrderAck { order_id })
    }

    async fn format_quantity(
        &self,
        _symbol: &str,
        raw_quantity: f64,
    ) -> Result<f64, ExchangeError> {
        Ok(self.state.lock().await.rules.apply(raw_quantity))
    }
}
