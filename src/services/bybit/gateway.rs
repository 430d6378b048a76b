//! `ExchangeGateway` implementation backed by the Bybit v5 REST API.

use crate::models::signal::SignalDirection;
use crate::services::bybit::messages::OrderRequest;
use crate::services::bybit::rest::BybitRestClient;
use crate::services::exchange::{
    Balance, ExchangeError, ExchangeGateway, OrderAck, PositionInfo, QuantityRules,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct BybitGateway {
    rest: Arc<BybitRestClient>,
    // Lot-size rules are static per instrument; fetched once and cached.
    quantity_rules: RwLock<HashMap<String, QuantityRules>>,
}

impl BybitGateway {
    pub fn new(rest: Arc<BybitRestClient>) -> Self {
        Self {
            rest,
            quantity_rules: RwLock::new(HashMap::new()),
        }
    }

    async fn rules_for(&self, symbol: &str) -> Result<QuantityRules, ExchangeError> {
        if let Some(rules) = self.quantity_rules.read().await.get(symbol) {
            return Ok(*rules);
        }
        let rules = self.rest.instrument_rules(symbol).await?;
        debug!(
            symbol,
            qty_step = rules.qty_step,
            min_order_qty = rules.min_order_qty,
            "BybitGateway: cached lot-size rules"
        );
        self.quantity_rules
            .write()
            .await
            .insert(symbol.to_string(), rules);
        Ok(rules)
    }

    async fn qty_string(&self, symbol: &str, quantity: f64) -> Result<String, ExchangeError> {
        let rules = self.rules_for(symbol).await?;
        Ok(format!(
            "{:.*}",
            rules.step_decimals(),
            quantity
        ))
    }
}

#[async_trait]
impl ExchangeGateway for BybitGateway {
    async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        self.rest.wallet_balance().await
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.rest.set_leverage(symbol, leverage).await
    }

    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        self.rest.last_price(symbol).await
    }

    async fn get_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, ExchangeError> {
        self.rest.positions(symbol).await
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: SignalDirection,
        quantity: f64,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<OrderAck, ExchangeError> {
        let request = OrderRequest {
            category: "linear".to_string(),
            symbol: symbol.to_string(),
            side: side.to_string(),
            order_type: "Market".to_string(),
            qty: self.qty_string(symbol, quantity).await?,
            take_profit: take_profit.map(|p| p.to_string()),
            stop_loss: stop_loss.map(|p| p.to_string()),
            reduce_only: None,
        };
        let ack = self.rest.place_order(&request).await?;
        info!(
            symbol,
            side = %side,
            quantity,
            order_id = %ack.order_id,
            "BybitGateway: market order placed"
        );
        Ok(ack)
    }

    async fn close_position(&self, symbol: &str) -> Result<OrderAck, ExchangeError> {
        let positions = self.rest.positions(symbol).await?;
        let position = positions
            .into_iter()
            .find(|p| p.side.is_open() && p.size > 0.0)
            .ok_or(ExchangeError::PositionNotFound)?;
        let exit_side = match position.side.direction() {
            Some(direction) => direction.opposite(),
            None => return Err(ExchangeError::PositionNotFound),
        };
        let request = OrderRequest {
            category: "linear".to_string(),
            symbol: symbol.to_string(),
            side: exit_side.to_string(),
            order_type: "Market".to_string(),
            qty: self.qty_string(symbol, position.size).await?,
            take_profit: None,
            stop_loss: None,
            reduce_only: Some(true),
        };
        let ack = self.rest.place_order(&request).await?;
        info!(
            symbol,
            closed_side = %position.side,
            size = position.size,
            order_id = %ack.order_id,
            "BybitGateway: position closed"
        );
        Ok(ack)
    }

    async fn format_quantity(
        &self,
        symbol: &str,
        raw_quantity: f64,
    ) -> Result<f64, ExchangeError> {
        let rules = self.rules_for(symbol).await?;
        Ok(rules.apply(raw_quantity))
    }
}
