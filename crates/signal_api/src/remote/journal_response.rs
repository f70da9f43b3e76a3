use serde::Deserialize;

use common::models::JournalEntry;

use crate::remote::lenient;
use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct JournalRowResponse {
    #[serde(default, deserialize_with = "lenient::string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub signal: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sl: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
}

impl RemoteResponse<JournalEntry> for JournalRowResponse {
    fn into_domain(self) -> JournalEntry {
        JournalEntry {
            timestamp: self.timestamp,
            symbol: self.symbol,
            signal: self.signal,
            last_price: self.last_price,
            tp: self.tp,
            sl: self.sl,
            confidence: self.confidence,
        }
    }
}
