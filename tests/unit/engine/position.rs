//! Unit tests for the position lifecycle manager

use macdrix::db::MemoryLedger;
use macdrix::engine::error::PositionError;
use macdrix::engine::position::{PositionManager, RetryPolicy};
use macdrix::models::signal::SignalDirection;
use macdrix::models::strategy::{SizingRule, StrategySettings, StrategyState, TpSlSettings};
use macdrix::models::timeframe::Timeframe;
use macdrix::models::trade::{PositionState, TradeStatus};
use macdrix::services::exchange::ExchangeGateway;
use macdrix::services::paper::PaperExchange;
use std::sync::Arc;

const SYMBOL: &str = "BTCUSDT";
const ACCOUNT: &str = "test-account";

fn settings(tp_sl: TpSlSettings) -> StrategySettings {
    StrategySettings {
        symbol: SYMBOL.to_string(),
        timeframe: Timeframe::H1,
        leverage: 2,
        sizing: SizingRule::Fixed(500.0),
        tp_sl,
    }
}

async fn manager_with(
    tp_sl: TpSlSettings,
) -> (PositionManager, Arc<PaperExchange>, Arc<MemoryLedger>) {
    let paper = Arc::new(PaperExchange::new());
    paper.set_price(SYMBOL, 100.0).await;
    let ledger = Arc::new(MemoryLedger::new());
    let manager = PositionManager::new(
        paper.clone(),
        ledger.clone(),
        settings(tp_sl),
        ACCOUNT.to_string(),
        RetryPolicy::default(),
    );
    (manager, paper, ledger)
}

async fn manager() -> (PositionManager, Arc<PaperExchange>, Arc<MemoryLedger>) {
    manager_with(TpSlSettings::default()).await
}

#[tokio::test]
async fn flat_account_starts_waiting_for_the_first_signal() {
    let (mut manager, _paper, _ledger) = manager().await;

    let state = manager
        .determine_initial_state()
        .await
        .expect("initial state");
    assert_eq!(state, StrategyState::WaitingFirstSignal);
    assert_eq!(manager.position(), PositionState::Flat);
}

#[tokio::test]
async fn existing_position_is_adopted_for_reverse_watching() {
    let (mut manager, paper, _ledger) = manager().await;
    paper
        .seed_position(SYMBOL, PositionState::Long, 1.0, 95.0)
        .await;

    let state = manager
        .determine_initial_state()
        .await
        .expect("initial state");
    assert_eq!(state, StrategyState::WaitingReverseSignal);
    assert_eq!(manager.position(), PositionState::Long);
}

#[tokio::test]
async fn opening_records_the_trade_in_the_ledger() {
    let (mut manager, paper, ledger) = manager().await;

    manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect("open");
    assert_eq!(manager.position(), PositionState::Long);
    assert!(manager.last_operation().is_some());

    let trades = ledger.trades().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].account, ACCOUNT);
    assert_eq!(trades[0].side, PositionState::Long);
    assert_eq!(trades[0].status, TradeStatus::Open);
    // 500 quote x 2 leverage / 100 price.
    assert!((trades[0].quantity - 10.0).abs() < 1e-9);

    let orders = paper.orders().await;
    assert_eq!(orders.len(), 1);
    assert!(!orders[0].reduce_only);
    assert_eq!(orders[0].take_profit, None);
    assert_eq!(orders[0].stop_loss, None);
}

#[tokio::test]
async fn failed_open_leaves_no_trace() {
    let (mut manager, paper, ledger) = manager().await;
    paper.fail_next_orders(1).await;

    let err = manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect_err("injected failure");
    assert!(matches!(err, PositionError::Order(_)));
    assert_eq!(manager.position(), PositionState::Flat);
    assert!(manager.last_operation().is_none());
    assert!(ledger.trades().await.is_empty());
    assert!(paper.orders().await.is_empty());
}

#[tokio::test]
async fn closing_completes_the_ledger_round_trip() {
    let (mut manager, paper, ledger) = manager().await;
    manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect("open");
    paper.set_price(SYMBOL, 110.0).await;

    manager.close_with_retry().await.expect("close");
    assert_eq!(manager.position(), PositionState::Flat);

    let trades = ledger.trades().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Closed);
    assert_eq!(trades[0].exit_price, Some(110.0));
    // 10 point move on a 10 unit long.
    assert!((trades[0].pnl.unwrap() - 100.0).abs() < 1e-9);

    let orders = paper.orders().await;
    assert_eq!(orders.len(), 2);
    assert!(orders[1].reduce_only);
    assert_eq!(orders[1].side, SignalDirection::Sell);
}

#[tokio::test(start_paused = true)]
async fn close_retries_through_transient_venue_errors() {
    let (mut manager, paper, _ledger) = manager().await;
    manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect("open");
    paper.fail_next_closes(2).await;

    manager.close_with_retry().await.expect("third attempt");
    assert_eq!(manager.position(), PositionState::Flat);
    assert!(paper.open_position(SYMBOL).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn close_gives_up_after_the_retry_budget() {
    let (mut manager, paper, _ledger) = manager().await;
    manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect("open");
    paper.fail_next_closes(3).await;

    let err = manager.close_with_retry().await.expect_err("budget spent");
    assert!(matches!(err, PositionError::CloseExhausted { attempts: 3, .. }));
    // The position is assumed still open and the engine keeps tracking it.
    assert_eq!(manager.position(), PositionState::Long);
    assert!(paper.open_position(SYMBOL).await.is_some());
}

#[tokio::test]
async fn missing_position_on_the_exchange_counts_as_closed() {
    let (mut manager, paper, ledger) = manager().await;
    manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect("open");

    // Position vanishes out of band, e.g. closed manually on the venue UI.
    paper.close_position(SYMBOL).await.expect("external close");

    manager.close_with_retry().await.expect("already flat");
    assert_eq!(manager.position(), PositionState::Flat);
    assert_eq!(ledger.trades().await[0].status, TradeStatus::Closed);
}

#[tokio::test]
async fn close_while_flat_is_a_no_op() {
    let (mut manager, paper, _ledger) = manager().await;

    manager.close_with_retry().await.expect("nothing to close");
    assert!(paper.orders().await.is_empty());
}

#[tokio::test]
async fn buy_brackets_sit_above_and_below_entry() {
    let (mut manager, paper, _ledger) = manager_with(TpSlSettings {
        enabled: true,
        take_profit_points: 50.0,
        stop_loss_points: 25.0,
    })
    .await;

    manager
        .open_position(SignalDirection::Buy, 100.0)
        .await
        .expect("open");

    let orders = paper.orders().await;
    assert_eq!(orders[0].take_profit, Some(150.0));
    assert_eq!(orders[0].stop_loss, Some(75.0));
}

#[tokio::test]
async fn sell_brackets_mirror_the_buy_side() {
    let (mut manager, paper, _ledger) = manager_with(TpSlSettings {
        enabled: true,
        take_profit_points: 50.0,
        stop_loss_points: 25.0,
    })
    .await;

    manager
        .open_position(SignalDirection::Sell, 100.0)
        .await
        .expect("open");

    let orders = paper.orders().await;
    assert_eq!(orders[0].take_profit, Some(50.0));
    assert_eq!(orders[0].stop_loss, Some(125.0));
}
