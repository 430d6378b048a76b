//! Decision timeframes and the exchange intervals they aggregate from.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval the strategy makes decisions on. Frames the exchange does
/// not serve natively are merged from a smaller base interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "45m")]
    M45,
    #[serde(rename = "50m")]
    M50,
    #[serde(rename = "55m")]
    M55,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "3h")]
    H3,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::M45 => 45,
            Timeframe::M50 => 50,
            Timeframe::M55 => 55,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H3 => 180,
            Timeframe::H4 => 240,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Exchange-native interval this frame is built from.
    pub fn base_interval(&self) -> BaseInterval {
        match self {
            Timeframe::M1 => BaseInterval::M1,
            Timeframe::M5 | Timeframe::M50 | Timeframe::M55 => BaseInterval::M5,
            Timeframe::M15 | Timeframe::M45 => BaseInterval::M15,
            Timeframe::M30 => BaseInterval::M30,
            Timeframe::H1 | Timeframe::H2 | Timeframe::H3 | Timeframe::H4 => BaseInterval::H1,
        }
    }

    /// Base candles per full bar of this frame. Day-end buckets of frames that
    /// do not divide 24h evenly hold fewer.
    pub fn aggregation_factor(&self) -> u32 {
        (self.minutes() / self.base_interval().minutes()) as u32
    }

    /// True when every bar is a single base candle passed through unchanged.
    pub fn is_native(&self) -> bool {
        self.aggregation_factor() == 1
    }

    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::M45,
            Timeframe::M50,
            Timeframe::M55,
            Timeframe::H1,
            Timeframe::H2,
            Timeframe::H3,
            Timeframe::H4,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::M45 => "45m",
            Timeframe::M50 => "50m",
            Timeframe::M55 => "55m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H3 => "3h",
            Timeframe::H4 => "4h",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "45m" => Ok(Timeframe::M45),
            "50m" => Ok(Timeframe::M50),
            "55m" => Ok(Timeframe::M55),
            "1h" | "60m" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "3h" => Ok(Timeframe::H3),
            "4h" => Ok(Timeframe::H4),
            other => Err(format!("unknown timeframe '{}'", other)),
        }
    }
}

/// Interval granularity requested from the exchange candle APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseInterval {
    M1,
    M5,
    M15,
    M30,
    H1,
}

impl BaseInterval {
    pub fn minutes(&self) -> i64 {
        match self {
            BaseInterval::M1 => 1,
            BaseInterval::M5 => 5,
            BaseInterval::M15 => 15,
            BaseInterval::M30 => 30,
            BaseInterval::H1 => 60,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Interval code used by the Bybit v5 kline endpoints.
    pub fn code(&self) -> &'static str {
        match self {
            BaseInterval::M1 => "1",
            BaseInterval::M5 => "5",
            BaseInterval::M15 => "15",
            BaseInterval::M30 => "30",
            BaseInterval::H1 => "60",
        }
    }
}

impl fmt::Display for BaseInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}
