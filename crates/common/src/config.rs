use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;
use crate::models::BufferPolicy;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_CHART_CAPACITY: usize = 30;
pub const MAX_CHART_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_url: String,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    pub buffer_policy: BufferPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            buffer_policy: BufferPolicy::Rolling {
                capacity: DEFAULT_CHART_CAPACITY,
            },
        }
    }
}

impl DashboardConfig {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("SIGNAL_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_ms = parse_or(&lookup, "SIGNAL_HTTP_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let poll_ms = parse_or(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MS",
                expected: "a positive number of milliseconds",
                value: poll_ms.to_string(),
            });
        }

        let capacity = parse_or(&lookup, "CHART_CAPACITY", DEFAULT_CHART_CAPACITY)?;
        if capacity > MAX_CHART_CAPACITY {
            return Err(ConfigError::Invalid {
                key: "CHART_CAPACITY",
                expected: "at most 10000 samples",
                value: capacity.to_string(),
            });
        }
        let buffer_policy = match lookup("CHART_MODE").as_deref().map(str::trim) {
            None | Some("") | Some("rolling") => BufferPolicy::Rolling {
                capacity: capacity.max(1),
            },
            Some("snapshot") => BufferPolicy::Snapshot,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CHART_MODE",
                    expected: "`rolling` or `snapshot`",
                    value: other.to_string(),
                });
            }
        };

        let config = Self {
            api_url,
            http_timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_ms),
            buffer_policy,
        };
        debug!("Loaded dashboard config: {:?}", config);
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            expected: "an unsigned integer",
            value: raw,
        }),
    }
}
