use serde::{Deserialize, Serialize};

use common::models::{QuickSignal, SignalAction};

use crate::remote::lenient;
use crate::traits::RemoteResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalRequest {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_type: Option<String>,
    /// Candle interval, e.g. `1h`. The service defaults to `1h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

impl SignalRequest {
    pub fn new(symbol: impl Into<String>, market_type: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            market_type,
            timeframe: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: Option<String>) -> Self {
        self.timeframe = timeframe;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct QuickSignalResponse {
    #[serde(default, alias = "pair", deserialize_with = "lenient::string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub signal: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub take_profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub stop_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sl: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::number_map")]
    pub indicators: Vec<(String, f64)>,
}

impl RemoteResponse<QuickSignal> for QuickSignalResponse {
    fn into_domain(self) -> QuickSignal {
        QuickSignal {
            symbol: self.symbol.unwrap_or_default(),
            action: self.signal.as_deref().map(SignalAction::parse),
            take_profit: self.take_profit.or(self.tp),
            stop_loss: self.stop_loss.or(self.sl),
            last_price: self.last_price,
            confidence: self.confidence,
            timestamp: self.timestamp,
            indicators: self.indicators.into_iter().collect(),
        }
    }
}
