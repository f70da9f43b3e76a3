use serde_json::Value;

use common::error::SyncError;
use common::models::{BufferPolicy, Query, SignalReport, TradeParams};

use super::chart_buffer::ChartBuffer;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SignalState {
    #[default]
    Empty,
    Pending,
    Ready(SignalReport),
    Failed(SyncError),
}

impl SignalState {
    pub fn report(&self) -> Option<&SignalReport> {
        match self {
            Self::Ready(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Everything the view reads. Only the controller writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub query: Option<Query>,
    pub trade_params: TradeParams,
    pub buffer: ChartBuffer,
    pub latest: SignalState,
    /// Fetches issued and not yet settled.
    pub in_flight: usize,
    /// Bumped whenever the query target changes or the controller is disposed.
    pub generation: u64,
    pub polling: bool,
    pub portfolio: Option<Value>,
    /// Alert-style message: validation failures and trade acknowledgements.
    pub notice: Option<String>,
    pub disposed: bool,
}

impl UiState {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            query: None,
            trade_params: TradeParams::default(),
            buffer: ChartBuffer::new(policy),
            latest: SignalState::Empty,
            in_flight: 0,
            generation: 0,
            polling: false,
            portfolio: None,
            notice: None,
            disposed: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}
