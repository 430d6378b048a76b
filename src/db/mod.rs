//! Settings store and trade ledger interfaces with in-process fallbacks.
//!
//! The orchestrator reads strategy settings and the active-run marker from a
//! [`SettingsStore`] and appends fills to a [`TradeLedger`]. Production wires
//! both to Postgres; tests and database-less deployments use the in-memory
//! implementations here.

pub mod postgres;

use crate::models::strategy::StrategySettings;
use crate::models::trade::{TradeRecord, TradeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Strategy settings for an account.
    async fn strategy_settings(&self, account: &str) -> Result<StrategySettings, StoreError>;

    /// Name of the strategy recorded as running for the account, if any.
    async fn active_run(&self, account: &str) -> Result<Option<String>, StoreError>;

    async fn set_active_run(&self, account: &str, strategy_name: &str) -> Result<(), StoreError>;

    async fn clear_active_run(&self, account: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TradeLedger: Send + Sync {
    /// Record an opened trade, returning its ledger id.
    async fn create_trade(&self, record: &TradeRecord) -> Result<i64, StoreError>;

    /// Mark a recorded trade closed.
    async fn close_trade(
        &self,
        id: i64,
        exit_price: f64,
        pnl: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Settings store holding one fixed settings snapshot, used when no database
/// is configured. The active-run marker lives in process memory, so restart
/// recovery relies on the exchange position instead.
pub struct EnvSettings {
    settings: StrategySettings,
    active: RwLock<Option<String>>,
}

impl EnvSettings {
    pub fn new(settings: StrategySettings) -> Self {
        Self {
            settings,
            active: RwLock::new(None),
        }
    }
}

#[async_trait]
impl SettingsStore for EnvSettings {
    async fn strategy_settings(&self, _account: &str) -> Result<StrategySettings, StoreError> {
        Ok(self.settings.clone())
    }

    async fn active_run(&self, _account: &str) -> Result<Option<String>, StoreError> {
        Ok(self.active.read().await.clone())
    }

    async fn set_active_run(&self, _account: &str, strategy_name: &str) -> Result<(), StoreError> {
        *self.active.write().await = Some(strategy_name.to_string());
        Ok(())
    }

    async fn clear_active_run(&self, _account: &str) -> Result<(), StoreError> {
        *self.active.write().await = None;
        Ok(())
    }
}

/// In-memory trade ledger.
pub struct MemoryLedger {
    trades: RwLock<Vec<TradeRecord>>,
    next_id: AtomicI64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            trades: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn trades(&self) -> Vec<TradeRecord> {
        self.trades.read().await.clone()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeLedger for MemoryLedger {
    async fn create_trade(&self, record: &TradeRecord) -> Result<i64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = record.clone();
        stored.id = Some(id);
        self.trades.write().await.push(stored);
        Ok(id)
    }

    async fn close_trade(
        &self,
        id: i64,
        exit_price: f64,
        pnl: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut trades = self.trades.write().await;
        let trade = trades
            .iter_mut()
            .find(|t| t.id == Some(id))
            .ok_or_else(|| StoreError::NotFound(format!("trade {}", id)))?;
        trade.exit_price = Some(exit_price);
        trade.pnl = Some(pnl);
        trade.closed_at = Some(closed_at);
        trade.status = TradeStatus::Closed;
        Ok(())
    }
}
