//! Postgres-backed settings store and trade ledger.

use crate::db::{SettingsStore, StoreError, TradeLedger};
use crate::models::strategy::{SizingRule, StrategySettings, TpSlSettings};
use crate::models::timeframe::Timeframe;
use crate::models::trade::TradeRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::{Client, NoTls};
use tracing::info;

pub struct PostgresStore {
    client: Arc<RwLock<Option<Client>>>,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Postgres connection error");
            }
        });

        let store = Self {
            client: Arc::new(RwLock::new(Some(client))),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;

        c.batch_execute(
            "CREATE TABLE IF NOT EXISTS strategy_settings (
                account TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                leverage INT NOT NULL,
                sizing_type TEXT NOT NULL,
                sizing_value DOUBLE PRECISION NOT NULL,
                tp_enabled BOOLEAN NOT NULL DEFAULT FALSE,
                tp_points DOUBLE PRECISION NOT NULL DEFAULT 0,
                sl_points DOUBLE PRECISION NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS active_runs (
                account TEXT PRIMARY KEY,
                strategy_name TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trades (
                id BIGSERIAL PRIMARY KEY,
                account TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity DOUBLE PRECISION NOT NULL,
                entry_price DOUBLE PRECISION NOT NULL,
                order_id TEXT NOT NULL,
                opened_at TIMESTAMPTZ NOT NULL,
                exit_price DOUBLE PRECISION,
                pnl DOUBLE PRECISION,
                closed_at TIMESTAMPTZ,
                status TEXT NOT NULL
            );",
        )
        .await
        .map_err(|e| query_err("schema creation", e))?;

        Ok(())
    }

    /// Write the given settings for the account unless a row already exists.
    /// Lets a fresh deployment boot from environment defaults while keeping
    /// operator edits authoritative afterwards.
    pub async fn seed_settings_if_missing(
        &self,
        account: &str,
        settings: &StrategySettings,
    ) -> Result<(), StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        let (sizing_type, sizing_value) = encode_sizing(&settings.sizing);
        let inserted = c
            .execute(
                "INSERT INTO strategy_settings
                    (account, symbol, timeframe, leverage, sizing_type, sizing_value,
                     tp_enabled, tp_points, sl_points)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (account) DO NOTHING",
                &[
                    &account,
                    &settings.symbol,
                    &settings.timeframe.to_string(),
                    &(settings.leverage as i32),
                    &sizing_type,
                    &sizing_value,
                    &settings.tp_sl.enabled,
                    &settings.tp_sl.take_profit_points,
                    &settings.tp_sl.stop_loss_points,
                ],
            )
            .await
            .map_err(|e| query_err("seed settings", e))?;
        if inserted > 0 {
            info!(account, symbol = %settings.symbol, "PostgresStore: seeded strategy settings");
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for PostgresStore {
    async fn strategy_settings(&self, account: &str) -> Result<StrategySettings, StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        let row = c
            .query_opt(
                "SELECT symbol, timeframe, leverage, sizing_type, sizing_value,
                        tp_enabled, tp_points, sl_points
                 FROM strategy_settings
                 WHERE account = $1",
                &[&account],
            )
            .await
            .map_err(|e| query_err("settings lookup", e))?
            .ok_or_else(|| StoreError::NotFound(format!("settings for account {}", account)))?;

        let symbol: String = row.get(0);
        let timeframe_raw: String = row.get(1);
        let timeframe = Timeframe::from_str(&timeframe_raw)
            .map_err(|e| StoreError::Query(format!("stored timeframe: {}", e)))?;
        let leverage: i32 = row.get(2);
        let sizing_type: String = row.get(3);
        let sizing_value: f64 = row.get(4);
        let sizing = decode_sizing(&sizing_type, sizing_value)?;

        Ok(StrategySettings {
            symbol,
            timeframe,
            leverage: leverage.max(1) as u32,
            sizing,
            tp_sl: TpSlSettings {
                enabled: row.get(5),
                take_profit_points: row.get(6),
                stop_loss_points: row.get(7),
            },
        })
    }

    async fn active_run(&self, account: &str) -> Result<Option<String>, StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        let row = c
            .query_opt(
                "SELECT strategy_name FROM active_runs WHERE account = $1",
                &[&account],
            )
            .await
            .map_err(|e| query_err("active run lookup", e))?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn set_active_run(&self, account: &str, strategy_name: &str) -> Result<(), StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        c.execute(
            "INSERT INTO active_runs (account, strategy_name, started_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (account)
             DO UPDATE SET strategy_name = EXCLUDED.strategy_name,
                           started_at = EXCLUDED.started_at",
            &[&account, &strategy_name, &Utc::now()],
        )
        .await
        .map_err(|e| query_err("record active run", e))?;
        Ok(())
    }

    async fn clear_active_run(&self, account: &str) -> Result<(), StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        c.execute("DELETE FROM active_runs WHERE account = $1", &[&account])
            .await
            .map_err(|e| query_err("clear active run", e))?;
        Ok(())
    }
}

#[async_trait]
impl TradeLedger for PostgresStore {
    async fn create_trade(&self, record: &TradeRecord) -> Result<i64, StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        let row = c
            .query_one(
                "INSERT INTO trades
                    (account, symbol, side, quantity, entry_price, order_id, opened_at, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id",
                &[
                    &record.account,
                    &record.symbol,
                    &record.side.to_string(),
                    &record.quantity,
                    &record.entry_price,
                    &record.order_id,
                    &record.opened_at,
                    &record.status.to_string(),
                ],
            )
            .await
            .map_err(|e| query_err("create trade", e))?;
        Ok(row.get(0))
    }

    async fn close_trade(
        &self,
        id: i64,
        exit_price: f64,
        pnl: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let client = self.client.read().await;
        let c = require_client(&client)?;
        let updated = c
            .execute(
                "UPDATE trades
                 SET exit_price = $1, pnl = $2, closed_at = $3, status = 'Closed'
                 WHERE id = $4",
                &[&exit_price, &pnl, &closed_at, &id],
            )
            .await
            .map_err(|e| query_err("close trade", e))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("trade {}", id)));
        }
        Ok(())
    }
}

fn require_client<'a>(
    guard: &'a tokio::sync::RwLockReadGuard<'_, Option<Client>>,
) -> Result<&'a Client, StoreError> {
    guard
        .as_ref()
        .ok_or_else(|| StoreError::Connection("database connection not available".to_string()))
}

fn query_err(context: &str, e: tokio_postgres::Error) -> StoreError {
    StoreError::Query(format!("{}: {}", context, e))
}

fn encode_sizing(sizing: &SizingRule) -> (String, f64) {
    match sizing {
        SizingRule::Fixed(amount) => ("fixed".to_string(), *amount),
        SizingRule::Percentage(pct) => ("percentage".to_string(), *pct),
    }
}

fn decode_sizing(sizing_type: &str, value: f64) -> Result<SizingRule, StoreError> {
    match sizing_type {
        "fixed" => Ok(SizingRule::Fixed(value)),
        "percentage" => Ok(SizingRule::Percentage(value)),
        other => Err(StoreError::Query(format!(
            "unknown sizing type '{}'",
            other
        ))),
    }
}
