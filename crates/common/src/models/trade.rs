use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeKind {
    Buy,
    Sell,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// Manual trade inputs. Changing these never touches the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeParams {
    pub amount: f64,
    pub tp_pct: f64,
    pub sl_pct: f64,
}

impl Default for TradeParams {
    fn default() -> Self {
        Self {
            amount: 0.001,
            tp_pct: 2.0,
            sl_pct: 1.0,
        }
    }
}

impl TradeParams {
    pub fn new(amount: f64, tp_pct: f64, sl_pct: f64) -> Result<Self, SyncError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SyncError::Validation(format!(
                "Amount must be a positive number, got {}",
                amount
            )));
        }
        for (name, pct) in [("TP %", tp_pct), ("SL %", sl_pct)] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(SyncError::Validation(format!(
                    "{} must be zero or positive, got {}",
                    name, pct
                )));
            }
        }
        Ok(Self {
            amount,
            tp_pct,
            sl_pct,
        })
    }

    /// Parses the raw text of the three trade inputs.
    pub fn parse(amount: &str, tp_pct: &str, sl_pct: &str) -> Result<Self, SyncError> {
        let field = |name: &str, raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| SyncError::Validation(format!("{} is not a number: {:?}", name, raw)))
        };
        Self::new(
            field("Amount", amount)?,
            field("TP %", tp_pct)?,
            field("SL %", sl_pct)?,
        )
    }
}

/// Body of `POST /execute_trade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub symbol: String,
    pub action: TradeKind,
    pub amount: f64,
    pub tp_pct: f64,
    pub sl_pct: f64,
}

impl TradeOrder {
    pub fn new(symbol: String, action: TradeKind, params: TradeParams) -> Self {
        Self {
            symbol,
            action,
            amount: params.amount,
            tp_pct: params.tp_pct,
            sl_pct: params.sl_pct,
        }
    }
}
