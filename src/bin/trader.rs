//! Macdrix Trader
//!
//! Single-process trading engine: indicator feed, signal gate, position
//! manager, and the HTTP control surface, wired to one exchange account.

use dotenvy::dotenv;
use macdrix::config::{self, Config, TradingMode};
use macdrix::core::http::{start_server, AppState, HealthStatus};
use macdrix::db::postgres::PostgresStore;
use macdrix::db::{EnvSettings, MemoryLedger, SettingsStore, TradeLedger};
use macdrix::engine::orchestrator::StrategyOrchestrator;
use macdrix::logging;
use macdrix::metrics::Metrics;
use macdrix::services::bybit::{BybitGateway, BybitRestClient};
use macdrix::services::exchange::ExchangeGateway;
use macdrix::services::market_data::{BybitMarketData, MarketDataProvider};
use macdrix::services::paper::PaperExchange;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    // Initialize logging based on environment
    logging::init_logging();

    let config = Config::from_env()?;
    let port = config::get_http_port();
    let env = config::get_environment();

    info!("Starting Macdrix Trader");
    info!(environment = %env, "Environment");
    info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        mode = ?config.mode,
        account = %config.account,
        "Strategy target"
    );

    let metrics = Arc::new(Metrics::new()?);

    let (store, ledger) = build_stores(&config, &metrics).await?;

    let rest = Arc::new(BybitRestClient::new(
        config.rest_url.clone(),
        config.api_key.clone(),
        config.api_secret.clone(),
    ));

    let gateway: Arc<dyn ExchangeGateway> = match config.mode {
        TradingMode::Live => Arc::new(BybitGateway::new(rest.clone())),
        TradingMode::Paper => {
            warn!("Paper mode: orders are simulated in process, nothing reaches the exchange");
            Arc::new(PaperExchange::new().with_price_oracle(rest.clone()))
        }
    };

    let market: Arc<dyn MarketDataProvider> = Arc::new(BybitMarketData::new(
        rest.clone(),
        config.ws_public_url.clone(),
    ));

    let orchestrator = Arc::new(StrategyOrchestrator::new(
        gateway,
        market,
        store,
        ledger,
        metrics.clone(),
        config.orchestrator_config(),
    ));

    if config.autostart {
        match orchestrator.start().await {
            Ok(name) => info!(strategy = %name, "Strategy autostarted"),
            Err(e) => warn!(error = %e, "Autostart failed; strategy can be started over the API"),
        }
    }

    let state = AppState {
        orchestrator: orchestrator.clone(),
        metrics,
        start_time: Arc::new(Instant::now()),
        health: Arc::new(RwLock::new(HealthStatus::default())),
    };

    // Start HTTP server
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!(error = %e, "HTTP server error");
        }
    });

    // Graceful shutdown
    info!(port = port, "Trader started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down trader...");
            if orchestrator.is_active().await {
                if let Err(e) = orchestrator.stop("shutdown signal").await {
                    error!(error = %e, "Stop on shutdown failed");
                }
            }
            info!("Trader stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}

/// Postgres-backed stores when `DATABASE_URL` is set and reachable, otherwise
/// the in-memory fallbacks. A database outage at boot downgrades with an
/// error log instead of refusing to start.
async fn build_stores(
    config: &Config,
    metrics: &Arc<Metrics>,
) -> Result<(Arc<dyn SettingsStore>, Arc<dyn TradeLedger>), Box<dyn std::error::Error>> {
    if let Some(url) = config::get_database_url() {
        match PostgresStore::connect(&url).await {
            Ok(pg) => {
                pg.seed_settings_if_missing(&config.account, &config.strategy_settings())
                    .await?;
                metrics.database_connected.set(1.0);
                info!("Postgres store ready");
                let pg = Arc::new(pg);
                return Ok((pg.clone() as Arc<dyn SettingsStore>, pg as Arc<dyn TradeLedger>));
            }
            Err(e) => {
                error!(error = %e, "Postgres unavailable, falling back to in-memory stores");
                metrics.database_connected.set(0.0);
            }
        }
    } else {
        info!("DATABASE_URL not set, using in-memory stores");
    }

    Ok((
        Arc::new(EnvSettings::new(config.strategy_settings())) as Arc<dyn SettingsStore>,
        Arc::new(MemoryLedger::new()) as Arc<dyn TradeLedger>,
    ))
}
