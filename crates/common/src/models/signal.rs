use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::sample::Candle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    Long,
    Short,
    Wait,
    Other(String),
}

impl SignalAction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            "HOLD" => Self::Hold,
            "LONG" => Self::Long,
            "SHORT" => Self::Short,
            "WAIT" => Self::Wait,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::Buy | Self::Long)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::Sell | Self::Short)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
            Self::Hold => f.write_str("HOLD"),
            Self::Long => f.write_str("LONG"),
            Self::Short => f.write_str("SHORT"),
            Self::Wait => f.write_str("WAIT"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Successful answer of a market signal route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub action: Option<SignalAction>,
    pub price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub risk_percent: Option<f64>,
    pub greed_percent: Option<f64>,
    pub reason: Option<String>,
    pub rsi: Option<f64>,
    pub risk_reward: Option<f64>,
    pub chart: Vec<Candle>,
}

/// Answer of `POST /signal`, the quick lookup of the single-page dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickSignal {
    pub symbol: String,
    pub action: Option<SignalAction>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub last_price: Option<f64>,
    pub confidence: Option<f64>,
    pub timestamp: Option<String>,
    pub indicators: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// Answer of `POST /analyze`: a human-readable summary for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub pair: String,
    pub analysis: String,
}
