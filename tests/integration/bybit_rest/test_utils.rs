//! Test utilities for Bybit REST integration tests

use macdrix::services::bybit::rest::BybitRestClient;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SYMBOL: &str = "BTCUSDT";

pub fn client_for(server: &MockServer) -> Arc<BybitRestClient> {
    Arc::new(BybitRestClient::with_client(
        server.uri(),
        "test-key".to_string(),
        "test-secret".to_string(),
        reqwest::Client::new(),
    ))
}

pub async fn mock_wallet_balance(server: &MockServer) {
    let response = json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "list": [{
                "totalEquity": "12500.50",
                "totalAvailableBalance": "10000.25"
            }]
        }
    });

    Mock::given(method("GET"))
        .and(path("/v5/account/wallet-balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

pub async fn mock_set_leverage(server: &MockServer, ret_code: i64, ret_msg: &str) {
    let response = json!({
        "retCode": ret_code,
        "retMsg": ret_msg,
        "result": {}
    });

    Mock::given(method("POST"))
        .and(path("/v5/position/set-leverage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

pub async fn mock_positions(server: &MockServer, list: serde_json::Value) {
    let response = json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": { "list": list }
    });

    Mock::given(method("GET"))
        .and(path("/v5/position/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

pub async fn mock_instrument_rules(server: &MockServer, qty_step: &str, min_order_qty: &str) {
    let response = json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "list": [{
                "symbol": SYMBOL,
                "lotSizeFilter": {
                    "qtyStep": qty_step,
                    "minOrderQty": min_order_qty
                }
            }]
        }
    });

    Mock::given(method("GET"))
        .and(path("/v5/market/instruments-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

pub async fn mock_order_create(server: &MockServer) {
    let response = json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": { "orderId": "1234567890", "orderLinkId": "" }
    });

    Mock::given(method("POST"))
        .and(path("/v5/order/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

pub async fn mock_klines(server: &MockServer, rows: serde_json::Value) {
    let response = json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": { "list": rows }
    });

    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}
