// Bounded polling for a terminal execution result.
//
// Fixed interval, fixed attempt ceiling, terminal predicate on the status
// id. A transient fetch failure is swallowed and the loop proceeds to the
// next attempt; only the ceiling ends the loop without a result.

use async_trait::async_trait;
use prepd_common::types::ExecutionResult;
use std::time::Duration;

pub const DEFAULT_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

/// Retry policy for the poll loop; both knobs are CLI flags.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    /// A result with a terminal status was observed.
    Completed(ExecutionResult),
    /// The attempt ceiling was reached with no terminal status. Reported
    /// distinctly from execution failures.
    TimedOut { attempts: u32 },
}

/// Where poll results come from; injected so the loop is testable with a
/// fake source and a zero interval.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn fetch(&self, token: &str) -> anyhow::Result<ExecutionResult>;
}

pub async fn poll(source: &dyn ResultSource, token: &str, policy: &PollPolicy) -> PollOutcome {
    for attempt in 1..=policy.max_attempts {
        // Isolated network blips must not kill the loop.
        if let Ok(result) = source.fetch(token).await {
            if result.status.is_terminal() {
                return PollOutcome::Completed(result);
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    PollOutcome::TimedOut {
        attempts: policy.max_attempts,
    }
}
