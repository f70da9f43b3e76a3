use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferPolicy {
    /// Append one sample per fetch, keep the newest `capacity`.
    Rolling { capacity: usize },
    /// Replace the whole buffer with the chart of each fetch.
    Snapshot,
}

/// One chart row as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: Option<i64>,
    pub close: Option<f64>,
    pub rsi: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
    pub volume: Option<f64>,
}

impl Candle {
    pub fn indicators(&self) -> BTreeMap<String, f64> {
        [
            ("rsi", self.rsi),
            ("ema50", self.ema50),
            ("ema200", self.ema200),
            ("volume", self.volume),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sequence_index: u64,
    /// Candle time in epoch seconds, when the service sent one.
    pub time: Option<i64>,
    pub received_at: DateTime<Utc>,
    pub price: f64,
    pub indicators: BTreeMap<String, f64>,
}

impl Sample {
    pub fn from_candle(
        sequence_index: u64,
        candle: &Candle,
        received_at: DateTime<Utc>,
    ) -> Option<Self> {
        let price = candle.close.filter(|p| p.is_finite())?;
        Some(Self {
            sequence_index,
            time: candle.time,
            received_at,
            price,
            indicators: candle.indicators(),
        })
    }

    pub fn from_price(sequence_index: u64, price: f64, received_at: DateTime<Utc>) -> Option<Self> {
        price.is_finite().then(|| Self {
            sequence_index,
            time: None,
            received_at,
            price,
            indicators: BTreeMap::new(),
        })
    }
}
