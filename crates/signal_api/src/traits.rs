use async_trait::async_trait;
use serde_json::Value;

use common::error::SyncError;
use common::models::{
    Analysis, ChatReply, JournalEntry, Query, QuickSignal, SignalReport, TradeOrder,
};

use crate::remote::{AnalysisRequest, ChatRequest, SignalRequest};

/// Conversion from a wire payload into the domain model.
pub trait RemoteResponse<T> {
    fn into_domain(self) -> T;
}

impl<T, R: RemoteResponse<T>> RemoteResponse<Vec<T>> for Vec<R> {
    fn into_domain(self) -> Vec<T> {
        self.into_iter().map(RemoteResponse::into_domain).collect()
    }
}

/// Everything the dashboard asks of the trading-signal service.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait SignalApi: Send + Sync {
    /// `GET /{stocks|crypto|trade}/{symbol}` or `GET /forex/{base}/{quote}`.
    async fn market_signal(&self, query: &Query) -> Result<SignalReport, SyncError>;

    /// `GET /portfolio`, returned verbatim.
    async fn portfolio(&self) -> Result<Value, SyncError>;

    /// `POST /execute_trade`, acknowledgement returned verbatim.
    async fn execute_trade(&self, order: &TradeOrder) -> Result<Value, SyncError>;

    /// `POST /signal`.
    async fn post_signal(&self, request: &SignalRequest) -> Result<QuickSignal, SyncError>;

    /// `POST /analyze`.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, SyncError>;

    /// `POST /ask`.
    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, SyncError>;

    /// `GET /journal`.
    async fn journal(&self) -> Result<Vec<JournalEntry>, SyncError>;
}
