use serde::{Deserialize, Serialize};

use common::models::Analysis;

use crate::remote::lenient;
use crate::traits::RemoteResponse;

/// Body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    pub pair: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

impl AnalysisRequest {
    pub fn new(pair: impl Into<String>, timeframe: Option<String>) -> Self {
        Self {
            pair: pair.into(),
            timeframe,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default, deserialize_with = "lenient::string")]
    pub pair: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub analysis: Option<String>,
}

impl RemoteResponse<Analysis> for AnalysisResponse {
    fn into_domain(self) -> Analysis {
        Analysis {
            pair: self.pair.unwrap_or_default(),
            analysis: self.analysis.unwrap_or_default(),
        }
    }
}
