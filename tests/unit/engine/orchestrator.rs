//! Unit tests for the strategy run lifecycle

use macdrix::db::{EnvSettings, MemoryLedger, SettingsStore};
use macdrix::engine::error::{StartError, StopError};
use macdrix::engine::orchestrator::{OrchestratorConfig, StrategyOrchestrator};
use macdrix::metrics::Metrics;
use macdrix::models::candle::Candle;
use macdrix::models::strategy::{SizingRule, StrategySettings, StrategyState, TpSlSettings};
use macdrix::models::timeframe::{BaseInterval, Timeframe};
use macdrix::models::trade::PositionState;
use macdrix::services::market_data::{MarketDataProvider, ScriptedMarketData};
use macdrix::services::paper::PaperExchange;
use std::sync::Arc;
use tokio::sync::mpsc;

const SYMBOL: &str = "BTCUSDT";

fn settings() -> StrategySettings {
    StrategySettings {
        symbol: SYMBOL.to_string(),
        timeframe: Timeframe::H1,
        leverage: 2,
        sizing: SizingRule::Fixed(500.0),
        tp_sl: TpSlSettings::default(),
    }
}

struct Harness {
    orchestrator: StrategyOrchestrator,
    paper: Arc<PaperExchange>,
    store: Arc<EnvSettings>,
    market: Arc<ScriptedMarketData>,
    metrics: Arc<Metrics>,
    // Keeps the scripted live stream open while a strategy runs.
    _live: mpsc::Sender<Candle>,
}

async fn harness_with(settings: StrategySettings) -> Harness {
    let paper = Arc::new(PaperExchange::new());
    paper.set_price(SYMBOL, 100.0).await;
    let store = Arc::new(EnvSettings::new(settings));
    let ledger = Arc::new(MemoryLedger::new());
    let (market, live) = ScriptedMarketData::new(Vec::new());
    let market = Arc::new(market);
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let orchestrator = StrategyOrchestrator::new(
        paper.clone(),
        market.clone(),
        store.clone(),
        ledger,
        metrics.clone(),
        OrchestratorConfig::default(),
    );
    Harness {
        orchestrator,
        paper,
        store,
        market,
        metrics,
        _live: live,
    }
}

async fn harness() -> Harness {
    harness_with(settings()).await
}

#[tokio::test]
async fn zero_leverage_settings_are_rejected() {
    let h = harness_with(StrategySettings {
        leverage: 0,
        ..settings()
    })
    .await;

    let err = h.orchestrator.start().await.expect_err("invalid leverage");
    assert!(matches!(err, StartError::InvalidConfig(_)));
    assert!(!h.orchestrator.is_active().await);
}

#[tokio::test]
async fn degenerate_sizing_settings_are_rejected() {
    let h = harness_with(StrategySettings {
        sizing: SizingRule::Percentage(0.0),
        ..settings()
    })
    .await;

    let err = h.orchestrator.start().await.expect_err("invalid sizing");
    assert!(matches!(err, StartError::InvalidConfig(_)));
    assert!(!h.orchestrator.is_active().await);
}

#[tokio::test]
async fn second_start_reports_already_active() {
    let h = harness().await;
    h.orchestrator.start().await.expect("first start");

    let err = h.orchestrator.start().await.expect_err("second start");
    assert!(matches!(err, StartError::AlreadyActive));
}

#[tokio::test]
async fn recorded_active_run_blocks_a_new_start() {
    let h = harness().await;
    h.store
        .set_active_run("default", "BTCUSDT_1h_macd-cross")
        .await
        .expect("mark run");

    let err = h.orchestrator.start().await.expect_err("stale run marker");
    assert!(matches!(err, StartError::ActiveRunRecorded(name) if name == "BTCUSDT_1h_macd-cross"));
    assert!(!h.orchestrator.is_active().await);
}

#[tokio::test]
async fn start_and_stop_roundtrip() {
    let h = harness().await;

    let name = h.orchestrator.start().await.expect("start");
    assert_eq!(name, "BTCUSDT_1h_macd-cross");
    assert!(h.orchestrator.is_active().await);
    assert_eq!(h.metrics.strategy_active.get(), 1);
    assert_eq!(
        h.store.active_run("default").await.expect("marker"),
        Some(name.clone())
    );

    let status = h.orchestrator.get_status().await;
    assert!(status.active);
    assert_eq!(status.strategy_name, Some(name.clone()));
    assert_eq!(status.symbol, Some(SYMBOL.to_string()));
    assert_eq!(status.timeframe, Some(Timeframe::H1));
    assert_eq!(status.strategy_state, Some(StrategyState::WaitingFirstSignal));
    assert!(status.started_at.is_some());

    let stopped = h.orchestrator.stop("test teardown").await.expect("stop");
    assert_eq!(stopped, name);
    assert!(!h.orchestrator.is_active().await);
    assert_eq!(h.metrics.strategy_active.get(), 0);
    assert_eq!(h.store.active_run("default").await.expect("marker"), None);
    assert!(!h.orchestrator.get_status().await.active);

    let err = h.orchestrator.stop("again").await.expect_err("nothing runs");
    assert!(matches!(err, StopError::NotActive));
}

#[tokio::test]
async fn broken_sizing_aborts_the_start() {
    let h = harness().await;
    // No price for the symbol, so the dry-run sizing cannot complete.
    let paper = Arc::new(PaperExchange::new());
    let orchestrator = StrategyOrchestrator::new(
        paper,
        h.market.clone(),
        h.store.clone(),
        Arc::new(MemoryLedger::new()),
        h.metrics.clone(),
        OrchestratorConfig::default(),
    );

    let err = orchestrator.start().await.expect_err("no price");
    assert!(matches!(err, StartError::DryRunSizing(_)));
    assert!(!orchestrator.is_active().await);
}

#[tokio::test]
async fn feed_failure_rolls_the_start_back() {
    let h = harness().await;
    // Consume the scripted stream so the feed cannot open it.
    h.market
        .candle_stream(SYMBOL, BaseInterval::H1)
        .await
        .expect("first consumer");

    let err = h.orchestrator.start().await.expect_err("stream gone");
    assert!(matches!(err, StartError::Feed(_)));
    assert!(!h.orchestrator.is_active().await);
    assert_eq!(h.store.active_run("default").await.expect("marker"), None);
    assert!(!h.orchestrator.get_status().await.active);
    assert_eq!(h.metrics.strategy_active.get(), 0);
}

#[tokio::test]
async fn inherited_position_starts_in_reverse_watch() {
    let h = harness().await;
    h.paper
        .seed_position(SYMBOL, PositionState::Long, 10.0, 95.0)
        .await;

    h.orchestrator.start().await.expect("start");
    let status = h.orchestrator.get_status().await;
    assert_eq!(status.strategy_state, Some(StrategyState::WaitingReverseSignal));
    assert_eq!(status.position_state, PositionState::Long);

    h.orchestrator.stop("test teardown").await.expect("stop");
}
