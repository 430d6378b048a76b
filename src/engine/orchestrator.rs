//! Strategy run lifecycle: start, stop, status.
//!
//! One orchestrator owns at most one running strategy instance. The run slot
//! is a mutex-held `Option`, so concurrent start calls serialize and the
//! second one fails cleanly instead of racing.

use crate::db::{SettingsStore, TradeLedger};
use crate::engine::error::{StartError, StopError};
use crate::engine::gate::SignalGate;
use crate::engine::position::{PositionManager, RetryPolicy};
use crate::engine::sizing::PositionSizer;
use crate::feed::macd::MacdParams;
use crate::feed::{IndicatorFeed, EVENT_QUEUE_DEPTH};
use crate::metrics::Metrics;
use crate::models::strategy::{StatusInfo, StrategySettings};
use crate::services::exchange::ExchangeGateway;
use crate::services::market_data::MarketDataProvider;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Engine knobs that come from deployment configuration rather than the
/// per-account settings store.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub account: String,
    pub retry: RetryPolicy,
    pub min_operation_interval: Duration,
    pub macd: MacdParams,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            account: "default".to_string(),
            retry: RetryPolicy::default(),
            min_operation_interval: Duration::from_secs(5),
            macd: MacdParams::default(),
        }
    }
}

struct RunInstance {
    name: String,
    feed: Arc<IndicatorFeed>,
    gate: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

pub struct StrategyOrchestrator {
    gateway: Arc<dyn ExchangeGateway>,
    market: Arc<dyn MarketDataProvider>,
    store: Arc<dyn SettingsStore>,
    ledger: Arc<dyn TradeLedger>,
    metrics: Arc<Metrics>,
    config: OrchestratorConfig,
    run: Mutex<Option<RunInstance>>,
    status: Arc<RwLock<StatusInfo>>,
}

impl StrategyOrchestrator {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        market: Arc<dyn MarketDataProvider>,
        store: Arc<dyn SettingsStore>,
        ledger: Arc<dyn TradeLedger>,
        metrics: Arc<Metrics>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            market,
            store,
            ledger,
            metrics,
            config,
            run: Mutex::new(None),
            status: Arc::new(RwLock::new(StatusInfo::default())),
        }
    }

    /// Start the strategy for the configured account. Every step must pass
    /// before the instance is marked active; any failure leaves nothing
    /// running.
    pub async fn start(&self) -> Result<String, StartError> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(StartError::AlreadyActive);
        }
        if let Some(existing) = self
            .store
            .active_run(&self.config.account)
            .await
            .map_err(StartError::Store)?
        {
            return Err(StartError::ActiveRunRecorded(existing));
        }

        let settings = self
            .store
            .strategy_settings(&self.config.account)
            .await
            .map_err(StartError::Store)?;
        validate_settings(&settings)?;

        let balance = self
            .gateway
            .get_balance()
            .await
            .map_err(StartError::Connectivity)?;
        info!(
            free = balance.free,
            total = balance.total,
            "StrategyOrchestrator: exchange connectivity verified"
        );

        self.gateway
            .set_leverage(&settings.symbol, settings.leverage)
            .await
            .map_err(StartError::Leverage)?;
        info!(
            symbol = %settings.symbol,
            leverage = settings.leverage,
            "StrategyOrchestrator: leverage set"
        );

        // Dry-run sizing: surface broken sizing settings now, not on the
        // first live signal.
        let sizer = PositionSizer::new(self.gateway.clone());
        let quantity = sizer
            .calculate(&settings.sizing, settings.leverage, &settings.symbol)
            .await
            .map_err(StartError::DryRunSizing)?;
        info!(
            quantity,
            sizing = %settings.sizing,
            "StrategyOrchestrator: dry-run sizing succeeded"
        );

        let feed = Arc::new(IndicatorFeed::new(
            self.market.clone(),
            settings.symbol.clone(),
            settings.timeframe,
            self.config.macd,
        ));
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        feed.start(events_tx).await.map_err(StartError::Feed)?;

        let mut manager = PositionManager::new(
            self.gateway.clone(),
            self.ledger.clone(),
            settings.clone(),
            self.config.account.clone(),
            self.config.retry,
        );
        let initial_state = match manager.determine_initial_state().await {
            Ok(state) => state,
            Err(e) => {
                feed.stop().await;
                return Err(StartError::Connectivity(e));
            }
        };

        let name = format!("{}_{}_macd-cross", settings.symbol, settings.timeframe);
        let started_at = Utc::now();
        {
            let mut status = self.status.write().await;
            *status = StatusInfo {
                active: true,
                strategy_name: Some(name.clone()),
                symbol: Some(settings.symbol.clone()),
                timeframe: Some(settings.timeframe),
                position_state: manager.position(),
                strategy_state: Some(initial_state),
                started_at: Some(started_at),
                ..StatusInfo::default()
            };
        }

        if let Err(e) = self.store.set_active_run(&self.config.account, &name).await {
            feed.stop().await;
            *self.status.write().await = StatusInfo::default();
            return Err(StartError::Store(e));
        }

        let gate = SignalGate::new(
            manager,
            feed.clone(),
            initial_state,
            self.config.min_operation_interval,
            self.metrics.clone(),
            self.status.clone(),
        );
        let gate_handle = tokio::spawn(gate.run(events_rx));

        self.metrics.strategy_active.set(1);
        *run = Some(RunInstance {
            name: name.clone(),
            feed,
            gate: gate_handle,
            started_at,
        });
        info!(
            strategy = %name,
            state = %initial_state,
            "StrategyOrchestrator: strategy started"
        );
        Ok(name)
    }

    /// Stop the running strategy. Teardown steps are independent: one failing
    /// is logged and the rest still run. An in-flight decision cycle finishes
    /// before the gate task is joined.
    pub async fn stop(&self, reason: &str) -> Result<String, StopError> {
        let mut run_slot = self.run.lock().await;
        let run = run_slot.take().ok_or(StopError::NotActive)?;
        info!(strategy = %run.name, reason, "StrategyOrchestrator: stopping");

        run.feed.stop().await;
        self.market.shutdown().await;

        if let Err(e) = run.gate.await {
            error!(error = %e, "StrategyOrchestrator: gate task join failed");
        }

        if let Err(e) = self.store.clear_active_run(&self.config.account).await {
            error!(error = %e, "StrategyOrchestrator: failed to clear active run record");
        }

        let (received, processed) = {
            let mut status = self.status.write().await;
            status.active = false;
            (status.signals_received, status.signals_processed)
        };
        self.metrics.strategy_active.set(0);
        info!(
            strategy = %run.name,
            reason,
            signals_received = received,
            signals_processed = processed,
            uptime_secs = (Utc::now() - run.started_at).num_seconds(),
            "StrategyOrchestrator: strategy stopped"
        );
        Ok(run.name)
    }

    pub async fn is_active(&self) -> bool {
        self.run.lock().await.is_some()
    }

    pub async fn get_status(&self) -> StatusInfo {
        self.status.read().await.clone()
    }
}

fn validate_settings(settings: &StrategySettings) -> Result<(), StartError> {
    if settings.symbol.trim().is_empty() {
        return Err(StartError::InvalidConfig("symbol is empty".to_string()));
    }
    if settings.leverage == 0 || settings.leverage > 100 {
        return Err(StartError::InvalidConfig(format!(
            "leverage {} outside 1..=100",
            settings.leverage
        )));
    }
    settings
        .sizing
        .validate()
        .map_err(StartError::InvalidConfig)?;
    Ok(())
}
