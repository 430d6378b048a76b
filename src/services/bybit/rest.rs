//! Signed REST client for the Bybit v5 API.
//!
//! Private endpoints are signed with HMAC-SHA256 over
//! `timestamp + api_key + recv_window + payload`, where the payload is the
//! query string for GETs and the exact JSON body for POSTs.

use crate::models::candle::Candle;
use crate::models::timeframe::BaseInterval;
use crate::services::bybit::messages::{
    parse_price, InstrumentListResult, KlineResult, LeverageRequest, OrderRequest, OrderResult,
    PositionListResult, RestResponse, TickerResult, WalletBalanceResult,
};
use crate::services::exchange::{Balance, ExchangeError, OrderAck, PositionInfo, QuantityRules};
use crate::models::trade::PositionState;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW: &str = "5000";
const CATEGORY: &str = "linear";

/// Bybit error code for "leverage not modified"; setting the current value
/// again is treated as success.
const RET_LEVERAGE_NOT_MODIFIED: i64 = 110043;
/// Bybit error code raised when a reduce-only order finds no position.
const RET_ZERO_POSITION: i64 = 110017;

pub struct BybitRestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BybitRestClient {
    pub fn new(base_url: String, api_key: String, api_secret: String) -> Self {
        Self::with_client(base_url, api_key, api_secret, reqwest::Client::new())
    }

    /// Injectable HTTP client, used by tests pointing at a mock server.
    pub fn with_client(
        base_url: String,
        api_key: String,
        api_secret: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }

    pub async fn wallet_balance(&self) -> Result<Balance, ExchangeError> {
        let result: WalletBalanceResult = self
            .get_private("/v5/account/wallet-balance", "accountType=UNIFIED")
            .await?;
        let account = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::InvalidResponse("empty wallet list".to_string()))?;
        Ok(Balance {
            free: parse_price(&account.total_available_balance, "available balance")?,
            total: parse_price(&account.total_equity, "total equity")?,
        })
    }

    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let request = LeverageRequest {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
            buy_leverage: leverage.to_string(),
            sell_leverage: leverage.to_string(),
        };
        match self
            .post_private::<_, serde_json::Value>("/v5/position/set-leverage", &request)
            .await
        {
            Ok(_) => Ok(()),
            Err(ExchangeError::Api {
                code: RET_LEVERAGE_NOT_MODIFIED,
                ..
            }) => {
                debug!(symbol, leverage, "leverage already set");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn last_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let result: TickerResult = self.get_public("/v5/market/tickers", &query).await?;
        let ticker = result
            .list
            .into_iter()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| ExchangeError::PriceUnavailable(symbol.to_string()))?;
        parse_price(&ticker.last_price, "last price")
    }

    pub async fn positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, ExchangeError> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let result: PositionListResult = self.get_private("/v5/position/list", &query).await?;
        let mut positions = Vec::new();
        for entry in result.list {
            let side = match entry.side.as_str() {
                "Buy" => PositionState::Long,
                "Sell" => PositionState::Short,
                _ => continue,
            };
            let size = parse_price(&entry.size, "position size")?;
            if size <= 0.0 {
                continue;
            }
            let entry_price = if entry.avg_price.is_empty() {
                0.0
            } else {
                parse_price(&entry.avg_price, "position avg price")?
            };
            positions.push(PositionInfo {
                symbol: entry.symbol,
                side,
                size,
                entry_price,
            });
        }
        Ok(positions)
    }

    pub async fn instrument_rules(&self, symbol: &str) -> Result<QuantityRules, ExchangeError> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let result: InstrumentListResult = self
            .get_public("/v5/market/instruments-info", &query)
            .await?;
        let instrument = result.list.into_iter().next().ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("no instrument info for {}", symbol))
        })?;
        Ok(QuantityRules {
            qty_step: parse_price(&instrument.lot_size_filter.qty_step, "qty step")?,
            min_order_qty: parse_price(
                &instrument.lot_size_filter.min_order_qty,
                "min order qty",
            )?,
        })
    }

    pub async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let result: OrderResult = self.post_private("/v5/order/create", request).await?;
        Ok(OrderAck {
            order_id: result.order_id,
        })
    }

    /// Recent closed klines, oldest first. Bybit returns newest first and may
    /// include the still-forming bar; callers drop candles they already hold.
    pub async fn klines(
        &self,
        symbol: &str,
        interval: BaseInterval,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let query = format!(
            "category={}&symbol={}&interval={}&limit={}",
            CATEGORY,
            symbol,
            interval.code(),
            limit
        );
        let result: KlineResult = self.get_public("/v5/market/kline", &query).await?;
        let mut candles = Vec::with_capacity(result.list.len());
        for raw in result.list.iter().rev() {
            candles.push(raw.to_candle(interval)?);
        }
        Ok(candles)
    }

    fn sign(&self, timestamp: &str, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Auth(format!("invalid API secret: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(RECV_WINDOW.as_bytes());
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(%url, "BybitRestClient: GET");
        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn get_private<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, ExchangeError> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, query)?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(%url, "BybitRestClient: signed GET");
        let response = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", signature)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_private<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ExchangeError> {
        let payload = serde_json::to_string(body)
            .map_err(|e| ExchangeError::InvalidResponse(format!("request encoding: {}", e)))?;
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, &payload)?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "BybitRestClient: signed POST");
        let response = self
            .http
            .post(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ExchangeError> {
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ExchangeError::Auth(format!("http status {}", status)));
        }
        let envelope: RestResponse<T> = response.json().await?;
        if envelope.ret_code != 0 {
            return Err(map_api_error(envelope.ret_code, envelope.ret_msg));
        }
        envelope
            .result
            .ok_or_else(|| ExchangeError::InvalidResponse("missing result field".to_string()))
    }
}

/// Map a non-zero `retCode` to the error taxonomy.
fn map_api_error(code: i64, message: String) -> ExchangeError {
    match code {
        RET_ZERO_POSITION => ExchangeError::PositionNotFound,
        10003 | 10004 | 10005 | 33004 => {
            ExchangeError::Auth(format!("code {}: {}", code, message))
        }
        _ if message.to_lowercase().contains("position is zero") => {
            ExchangeError::PositionNotFound
        }
        _ => ExchangeError::Api { code, message },
    }
}
