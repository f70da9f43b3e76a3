use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

const MAX_SYMBOL_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Stocks,
    Crypto,
    Forex,
    Trade,
}

impl Market {
    pub fn route(&self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Crypto => "crypto",
            Self::Forex => "forex",
            Self::Trade => "trade",
        }
    }

    pub fn mode(&self) -> QueryMode {
        match self {
            Self::Forex => QueryMode::PairedAsset,
            _ => QueryMode::SingleAsset,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    SingleAsset,
    PairedAsset,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolParams {
    Single(String),
    Pair { base: String, quote: String },
}

impl SymbolParams {
    pub fn as_segments(&self) -> Vec<&str> {
        match self {
            Self::Single(symbol) => vec![symbol.as_str()],
            Self::Pair { base, quote } => vec![base.as_str(), quote.as_str()],
        }
    }
}

/// A fully validated request target. Equality is target identity: two queries
/// are equal exactly when they hit the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    market: Market,
    symbols: SymbolParams,
}

impl Query {
    pub fn single(market: Market, symbol: &str) -> Result<Self, SyncError> {
        if market.mode() == QueryMode::PairedAsset {
            return match symbol.split_once('/') {
                Some((base, quote)) => Self::pair(base, quote),
                None => Err(SyncError::Validation(format!(
                    "{} needs a base and a quote, e.g. EUR/USD",
                    market
                ))),
            };
        }

        Ok(Self {
            market,
            symbols: SymbolParams::Single(normalize_symbol(symbol)?),
        })
    }

    pub fn pair(base: &str, quote: &str) -> Result<Self, SyncError> {
        let base = normalize_leg(base, "base")?;
        let quote = normalize_leg(quote, "quote")?;
        Ok(Self {
            market: Market::Forex,
            symbols: SymbolParams::Pair { base, quote },
        })
    }

    /// Picks the market from the shape of free-form input:
    /// `EUR/USD` is forex, `*USDT` is crypto, anything else is a stock.
    pub fn infer(input: &str) -> Result<Self, SyncError> {
        let trimmed = input.trim();
        if let Some((base, quote)) = trimmed.split_once('/') {
            return Self::pair(base, quote);
        }
        let symbol = normalize_symbol(trimmed)?;
        let market = if symbol.ends_with("USDT") {
            Market::Crypto
        } else {
            Market::Stocks
        };
        Ok(Self {
            market,
            symbols: SymbolParams::Single(symbol),
        })
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn mode(&self) -> QueryMode {
        self.market.mode()
    }

    pub fn symbols(&self) -> &SymbolParams {
        &self.symbols
    }

    /// The symbol as sent to the trade and signal endpoints (`EURUSD` for pairs).
    pub fn symbol(&self) -> String {
        match &self.symbols {
            SymbolParams::Single(symbol) => symbol.clone(),
            SymbolParams::Pair { base, quote } => format!("{}{}", base, quote),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbols {
            SymbolParams::Single(symbol) => write!(f, "{}", symbol),
            SymbolParams::Pair { base, quote } => write!(f, "{}/{}", base, quote),
        }
    }
}

fn normalize_symbol(raw: &str) -> Result<String, SyncError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(SyncError::Validation("Please enter a symbol".to_string()));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(SyncError::Validation(format!(
            "Symbol {:?} is longer than {} characters",
            symbol, MAX_SYMBOL_LEN
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(SyncError::Validation(format!(
            "Symbol {:?} contains invalid characters",
            symbol
        )));
    }
    Ok(symbol)
}

fn normalize_leg(raw: &str, leg: &str) -> Result<String, SyncError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(SyncError::Validation(format!("Please enter a {} currency", leg)));
    }
    if symbol.len() > MAX_SYMBOL_LEN || !symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(SyncError::Validation(format!(
            "Invalid {} currency {:?}",
            leg, symbol
        )));
    }
    Ok(symbol)
}
