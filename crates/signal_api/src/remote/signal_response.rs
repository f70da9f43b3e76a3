use serde::{Deserialize, Deserializer};
use serde_json::Value;

use common::models::{Candle, SignalAction, SignalReport};

use crate::remote::lenient;
use crate::traits::RemoteResponse;

#[derive(Debug, Default, Deserialize)]
pub struct CandleResponse {
    #[serde(default, deserialize_with = "lenient::epoch_seconds")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub close: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rsi: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ema50: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ema200: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub volume: Option<f64>,
}

impl RemoteResponse<Candle> for CandleResponse {
    fn into_domain(self) -> Candle {
        Candle {
            time: self.time,
            close: self.close,
            rsi: self.rsi,
            ema50: self.ema50,
            ema200: self.ema200,
            volume: self.volume,
        }
    }
}

/// Scalar part of a signal payload. The `/trade` route nests these under
/// `signal`, the market routes send them flat.
#[derive(Debug, Default, Deserialize)]
pub struct SignalFields {
    #[serde(default)]
    pub signal: Option<Value>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub stop_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub take_profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub risk_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub greed_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rsi: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub risk_reward: Option<f64>,
}

impl SignalFields {
    fn split_nested(mut self) -> (Self, Option<Self>) {
        match self.signal.take() {
            Some(Value::Object(map)) => {
                let nested = serde_json::from_value::<SignalFields>(Value::Object(map)).ok();
                (self, nested)
            }
            other => {
                self.signal = other;
                (self, None)
            }
        }
    }

    fn or(self, other: Self) -> Self {
        Self {
            signal: self.signal.or(other.signal),
            price: self.price.or(other.price),
            stop_loss: self.stop_loss.or(other.stop_loss),
            take_profit: self.take_profit.or(other.take_profit),
            risk_percent: self.risk_percent.or(other.risk_percent),
            greed_percent: self.greed_percent.or(other.greed_percent),
            reason: self.reason.or(other.reason),
            rsi: self.rsi.or(other.rsi),
            risk_reward: self.risk_reward.or(other.risk_reward),
        }
    }

    fn action(&self) -> Option<SignalAction> {
        match &self.signal {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(SignalAction::parse(s)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignalResponse {
    #[serde(default, alias = "chartData", deserialize_with = "candles")]
    pub chart: Vec<CandleResponse>,
    #[serde(flatten)]
    pub fields: SignalFields,
}

impl RemoteResponse<SignalReport> for SignalResponse {
    fn into_domain(self) -> SignalReport {
        let (top, nested) = self.fields.split_nested();
        let fields = match nested {
            Some(nested) => top.or(nested),
            None => top,
        };

        SignalReport {
            action: fields.action(),
            price: fields.price,
            stop_loss: fields.stop_loss,
            take_profit: fields.take_profit,
            risk_percent: fields.risk_percent,
            greed_percent: fields.greed_percent,
            reason: fields.reason,
            rsi: fields.rsi,
            risk_reward: fields.risk_reward,
            chart: self.chart.into_iter().map(RemoteResponse::into_domain).collect(),
        }
    }
}

/// Keeps the usable rows of `chart` and drops the rest.
fn candles<'de, D>(deserializer: D) -> Result<Vec<CandleResponse>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(rows)) => rows
            .into_iter()
            .filter_map(|row| serde_json::from_value::<CandleResponse>(row).ok())
            .collect(),
        _ => Vec::new(),
    })
}
