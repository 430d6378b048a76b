//! Exchange-facing services: live Bybit clients, market data, paper trading.

pub mod bybit;
pub mod exchange;
pub mod market_data;
pub mod paper;

pub use exchange::{Balance, ExchangeError, ExchangeGateway, OrderAck, PositionInfo, QuantityRules};
pub use market_data::{BybitMarketData, MarketDataProvider, ScriptedMarketData};
pub use paper::{PaperExchange, PaperOrder};
