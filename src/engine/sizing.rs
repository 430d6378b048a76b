//! Order quantity calculation.
//!
//! quantity = committed quote amount x leverage / price, floored to the
//! instrument's step grid and clamped up to its minimum order quantity.

use crate::engine::error::SizingError;
use crate::models::strategy::SizingRule;
use crate::services::exchange::{ExchangeError, ExchangeGateway};
use std::sync::Arc;
use tracing::debug;

pub struct PositionSizer {
    gateway: Arc<dyn ExchangeGateway>,
}

impl PositionSizer {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self { gateway }
    }

    /// Compute the base-currency quantity for one order at the current market
    /// price. Fails without side effects; callers treat any error as "skip
    /// this order".
    pub async fn calculate(
        &self,
        rule: &SizingRule,
        leverage: u32,
        symbol: &str,
    ) -> Result<f64, SizingError> {
        rule.validate().map_err(SizingError::InvalidRule)?;

        let price = self
            .gateway
            .get_price(symbol)
            .await
            .map_err(SizingError::Price)?;
        if price <= 0.0 {
            return Err(SizingError::Price(ExchangeError::PriceUnavailable(
                symbol.to_string(),
            )));
        }

        let quote_amount = match rule {
            SizingRule::Fixed(amount) => *amount,
            SizingRule::Percentage(pct) => {
                let balance = self
                    .gateway
                    .get_balance()
                    .await
                    .map_err(SizingError::Balance)?;
                if balance.free <= 0.0 {
                    return Err(SizingError::NonPositiveBalance(balance.free));
                }
                balance.free * pct / 100.0
            }
        };

        let raw_quantity = quote_amount * leverage as f64 / price;
        let quantity = self
            .gateway
            .format_quantity(symbol, raw_quantity)
            .await
            .map_err(SizingError::Quantity)?;

        debug!(
            symbol,
            rule = %rule,
            leverage,
            price,
            quote_amount,
            raw_quantity,
            quantity,
            "PositionSizer: order sized"
        );
        Ok(quantity)
    }
}
