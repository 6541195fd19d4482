//! Retrying log fetcher
//!
//! Wraps a single `eth_getLogs` request in bounded exponential backoff. A
//! chunk that keeps failing does not abort the scan: the fetcher gives up,
//! logs the range, and reports [`FetchOutcome::Exhausted`] so the caller can
//! carry on with an empty page while still counting the gap.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, warn};

use crate::rpc::{LogFilter, RawLog, RpcClient, RpcError};

/// Source of event logs and chain head
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn head_block(&self) -> Result<u64, RpcError>;
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError>;
}

#[async_trait]
impl LogSource for RpcClient {
    async fn head_block(&self) -> Result<u64, RpcError> {
        self.block_number().await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        RpcClient::get_logs(self, filter).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-indexed): `2^attempt * base_delay`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(20))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Logs(Vec<RawLog>),
    /// Every attempt failed; this is "no data", not "no events"
    Exhausted { attempts: u32, last_error: String },
}

impl FetchOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, FetchOutcome::Exhausted { .. })
    }

    /// Records fetched, empty when retries were exhausted
    pub fn into_logs(self) -> Vec<RawLog> {
        match self {
            FetchOutcome::Logs(logs) => logs,
            FetchOutcome::Exhausted { .. } => Vec::new(),
        }
    }
}

/// Fetch one filter's logs, retrying transport, HTTP, RPC and shape errors.
pub async fn fetch_with_retry(
    source: &dyn LogSource,
    filter: &LogFilter,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let range = filter.range;
    let mut last_error = String::from("no attempts made");

    for attempt in 0..policy.max_attempts {
        match source.get_logs(filter).await {
            Ok(logs) => return FetchOutcome::Logs(logs),
            Err(e) => {
                last_error = e.to_string();
                if attempt + 1 == policy.max_attempts {
                    break;
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    "Attempt {} failed for block range {} - {}: {}, retrying in {}ms",
                    attempt + 1,
                    range.from,
                    range.to,
                    last_error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    error!(
        "Failed to fetch logs for block range {} - {} after {} attempts: {}",
        range.from, range.to, policy.max_attempts, last_error
    );

    FetchOutcome::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    }
}
