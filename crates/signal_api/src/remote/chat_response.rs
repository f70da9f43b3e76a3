use serde::{Deserialize, Serialize};

use common::models::ChatReply;

use crate::traits::RemoteResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Lets the service enrich the prompt with the latest snapshot of this pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, model: Option<String>) -> Self {
        Self {
            message: message.into(),
            model,
            pair: None,
            timeframe: None,
        }
    }

    pub fn with_pair(mut self, pair: impl Into<String>, timeframe: Option<String>) -> Self {
        self.pair = Some(pair.into());
        self.timeframe = timeframe;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
}

impl RemoteResponse<ChatReply> for ChatResponse {
    fn into_domain(self) -> ChatReply {
        ChatReply {
            response: self.response.unwrap_or_default(),
        }
    }
}
