//! Environment-driven runtime configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::orchestrator::OrchestratorConfig;
use crate::engine::position::RetryPolicy;
use crate::feed::macd::MacdParams;
use crate::models::strategy::{SizingRule, StrategySettings, TpSlSettings};
use crate::models::timeframe::Timeframe;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("missing required variable {0}")]
    Missing(&'static str),
}

/// Deployment environment name, used to pick the log format.
pub fn get_environment() -> String {
    env::var("MACDRIX_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_http_port() -> u16 {
    env::var("MACDRIX_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

/// Postgres connection string. Absent means the process runs on in-memory
/// stores only.
pub fn get_database_url() -> Option<String> {
    env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    /// Orders go to the real exchange account.
    Live,
    /// Orders are simulated in process; market data is still real.
    Paper,
}

impl FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(TradingMode::Live),
            "paper" => Ok(TradingMode::Paper),
            other => Err(format!("unknown trading mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub account: String,
    pub mode: TradingMode,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub leverage: u32,
    pub sizing: SizingRule,
    pub tp_sl: TpSlSettings,
    pub macd: MacdParams,
    pub retry: RetryPolicy,
    pub min_operation_interval: Duration,
    pub api_key: String,
    pub api_secret: String,
    pub rest_url: String,
    pub ws_public_url: String,
    pub autostart: bool,
}

impl Config {
    /// Read and validate the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let account = env::var("MACDRIX_ACCOUNT").unwrap_or_else(|_| "default".to_string());

        let mode = env::var("MACDRIX_MODE")
            .unwrap_or_else(|_| "paper".to_string())
            .parse::<TradingMode>()
            .map_err(|reason| ConfigError::Invalid {
                var: "MACDRIX_MODE",
                reason,
            })?;

        let symbol = env::var("MACDRIX_SYMBOL")
            .unwrap_or_else(|_| "BTCUSDT".to_string())
            .to_uppercase();
        if symbol.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "MACDRIX_SYMBOL",
                reason: "symbol must not be empty".to_string(),
            });
        }

        let timeframe = env::var("MACDRIX_TIMEFRAME")
            .unwrap_or_else(|_| "1h".to_string())
            .parse::<Timeframe>()
            .map_err(|reason| ConfigError::Invalid {
                var: "MACDRIX_TIMEFRAME",
                reason,
            })?;

        let leverage: u32 = env::var("MACDRIX_LEVERAGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        if leverage == 0 || leverage > 100 {
            return Err(ConfigError::Invalid {
                var: "MACDRIX_LEVERAGE",
                reason: format!("leverage {} outside 1..=100", leverage),
            });
        }

        let sizing = read_sizing()?;
        sizing.validate().map_err(|reason| ConfigError::Invalid {
            var: "MACDRIX_SIZING_VALUE",
            reason,
        })?;

        let tp_sl = TpSlSettings {
            enabled: read_bool("MACDRIX_TP_ENABLED", false),
            take_profit_points: read_f64("MACDRIX_TP_POINTS", 0.0),
            stop_loss_points: read_f64("MACDRIX_SL_POINTS", 0.0),
        };

        let macd = MacdParams {
            fast: read_usize("MACDRIX_MACD_FAST", 12),
            slow: read_usize("MACDRIX_MACD_SLOW", 26),
            signal: read_usize("MACDRIX_MACD_SIGNAL", 9),
        };
        macd.validate().map_err(|reason| ConfigError::Invalid {
            var: "MACDRIX_MACD_FAST",
            reason,
        })?;

        let retry = RetryPolicy {
            attempts: env::var("MACDRIX_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            delay: Duration::from_millis(
                env::var("MACDRIX_RETRY_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
        };
        if retry.attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MACDRIX_RETRY_ATTEMPTS",
                reason: "at least one attempt is required".to_string(),
            });
        }

        let min_operation_interval = Duration::from_secs(
            env::var("MACDRIX_MIN_OPERATION_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        );

        let api_key = env::var("BYBIT_API_KEY").unwrap_or_default();
        let api_secret = env::var("BYBIT_API_SECRET").unwrap_or_default();
        if mode == TradingMode::Live {
            if api_key.is_empty() {
                return Err(ConfigError::Missing("BYBIT_API_KEY"));
            }
            if api_secret.is_empty() {
                return Err(ConfigError::Missing("BYBIT_API_SECRET"));
            }
        }

        let testnet = read_bool("BYBIT_TESTNET", false);
        let rest_url =
            env::var("BYBIT_REST_URL").unwrap_or_else(|_| default_rest_url(testnet).to_string());
        let ws_public_url = env::var("BYBIT_WS_PUBLIC_URL")
            .unwrap_or_else(|_| default_ws_public_url(testnet).to_string());

        Ok(Self {
            account,
            mode,
            symbol,
            timeframe,
            leverage,
            sizing,
            tp_sl,
            macd,
            retry,
            min_operation_interval,
            api_key,
            api_secret,
            rest_url,
            ws_public_url,
            autostart: read_bool("MACDRIX_AUTOSTART", false),
        })
    }

    /// Settings row seeded into the store on first boot.
    pub fn strategy_settings(&self) -> StrategySettings {
        StrategySettings {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            leverage: self.leverage,
            sizing: self.sizing,
            tp_sl: self.tp_sl,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            account: self.account.clone(),
            retry: self.retry,
            min_operation_interval: self.min_operation_interval,
            macd: self.macd,
        }
    }
}

fn read_sizing() -> Result<SizingRule, ConfigError> {
    let kind = env::var("MACDRIX_SIZING_TYPE").unwrap_or_else(|_| "percentage".to_string());
    let value = read_f64("MACDRIX_SIZING_VALUE", 100.0);
    match kind.to_ascii_lowercase().as_str() {
        "fixed" => Ok(SizingRule::Fixed(value)),
        "percentage" => Ok(SizingRule::Percentage(value)),
        other => Err(ConfigError::Invalid {
            var: "MACDRIX_SIZING_TYPE",
            reason: format!("unknown sizing type '{}'", other),
        }),
    }
}

fn read_bool(var: &str, default: bool) -> bool {
    env::var(var)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn read_f64(var: &str, default: f64) -> f64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn read_usize(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_rest_url(testnet: bool) -> &'static str {
    if testnet {
        "https://api-testnet.bybit.com"
    } else {
        "https://api.bybit.com"
    }
}

fn default_ws_public_url(testnet: bool) -> &'static str {
    if testnet {
        "wss://stream-testnet.bybit.com/v5/public/linear"
    } else {
        "wss://stream.bybit.com/v5/public/linear"
    }
}
