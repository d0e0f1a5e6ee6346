use std::time::Duration;

use crate::{config::ExecutionConfig, workflow::node::Node};

/// Retry budget and backoff for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    /// Node `retry` settings override the engine defaults.
    pub fn for_node(
        node: &Node,
        config: &ExecutionConfig,
    ) -> Self {
        let max_retries = node.retry.map(|r| r.times).unwrap_or(config.max_retries);
        let base = node.retry.and_then(|r| r.interval_ms).unwrap_or(config.retry_backoff_ms);
        Self {
            max_retries,
            base: Duration::from_millis(base),
            cap: Duration::from_millis(config.retry_max_backoff_ms.max(base)),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay(
        &self,
        attempt: u32,
    ) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.cap)
    }
}
