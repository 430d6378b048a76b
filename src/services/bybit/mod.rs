//! Bybit v5 exchange integration: signed REST, public kline stream, gateway.

pub mod gateway;
pub mod messages;
pub mod rest;
pub mod ws;

pub use gateway::BybitGateway;
pub use rest::BybitRestClient;
pub use ws::BybitWsClient;
