use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use common::config::DashboardConfig;
use common::error::SyncError;
use common::models::{
    Analysis, ChatReply, JournalEntry, Query, QuickSignal, SignalReport, TradeOrder,
};

use crate::remote::{
    AnalysisRequest, AnalysisResponse, ChatRequest, ChatResponse, JournalRowResponse,
    QuickSignalResponse, SignalRequest, SignalResponse,
};
use crate::traits::{RemoteResponse, SignalApi};

const USER_AGENT: &str = "signal_dashboard/0.1.0";

#[derive(Clone)]
pub struct SignalClient {
    client: Client,
    base_url: Url,
}

impl SignalClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid signal API url: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Signal API url cannot be a base: {}", base_url);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client.")?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &DashboardConfig) -> anyhow::Result<Self> {
        Self::new(&config.api_url, config.http_timeout)
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::transport(format!("Bad base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, SyncError> {
        let response = request.send().await.map_err(|e| {
            warn!("Signal service unreachable: {}", e);
            SyncError::transport(format!("Failed to send request: {}", e))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(format!("Failed to read response: {}", e)))?;
        let value = serde_json::from_str::<Value>(&body).ok();

        // The service reports its own failures as `{"error": ...}`, often with a 5xx.
        if let Some(message) = value.as_ref().and_then(service_error) {
            debug!("Service error ({}): {}", status, message);
            return Err(SyncError::Service(message));
        }

        if !status.is_success() {
            warn!("Signal service answered HTTP {}", status);
            return Err(SyncError::transport(format!("HTTP {}", status)));
        }

        value.ok_or_else(|| SyncError::transport("Failed to parse JSON response"))
    }

    async fn fetch<R, T>(&self, request: RequestBuilder) -> Result<T, SyncError>
    where
        R: DeserializeOwned + RemoteResponse<T>,
    {
        let value = self.send(request).await?;
        let response = serde_json::from_value::<R>(value)
            .map_err(|e| SyncError::transport(format!("Unexpected response shape: {}", e)))?;
        Ok(response.into_domain())
    }
}

fn service_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl SignalApi for SignalClient {
    async fn market_signal(&self, query: &Query) -> Result<SignalReport, SyncError> {
        let mut segments = vec![query.market().route()];
        segments.extend(query.symbols().as_segments());
        let url = self.endpoint(&segments)?;

        debug!("GET {}", url);
        self.fetch::<SignalResponse, _>(self.client.get(url)).await
    }

    async fn portfolio(&self) -> Result<Value, SyncError> {
        let url = self.endpoint(&["portfolio"])?;
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    async fn execute_trade(&self, order: &TradeOrder) -> Result<Value, SyncError> {
        let url = self.endpoint(&["execute_trade"])?;
        debug!("POST {} {} {} {}", url, order.action, order.amount, order.symbol);
        self.send(self.client.post(url).json(order)).await
    }

    async fn post_signal(&self, request: &SignalRequest) -> Result<QuickSignal, SyncError> {
        let url = self.endpoint(&["signal"])?;
        debug!("POST {} {}", url, request.symbol);
        let mut quick = self
            .fetch::<QuickSignalResponse, _>(self.client.post(url).json(request))
            .await?;
        if quick.symbol.is_empty() {
            quick.symbol = request.symbol.clone();
        }
        Ok(quick)
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, SyncError> {
        let url = self.endpoint(&["analyze"])?;
        debug!("POST {} {}", url, request.pair);
        let mut analysis = self
            .fetch::<AnalysisResponse, _>(self.client.post(url).json(request))
            .await?;
        if analysis.pair.is_empty() {
            analysis.pair = request.pair.clone();
        }
        Ok(analysis)
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, SyncError> {
        let url = self.endpoint(&["ask"])?;
        debug!("POST {}", url);
        self.fetch::<ChatResponse, _>(self.client.post(url).json(request))
            .await
    }

    async fn journal(&self) -> Result<Vec<JournalEntry>, SyncError> {
        let url = self.endpoint(&["journal"])?;
        debug!("GET {}", url);
        self.fetch::<Vec<JournalRowResponse>, _>(self.client.get(url))
            .await
    }
}
