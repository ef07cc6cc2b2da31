//! Fixed-step transaction status poller
//!
//! After a USSD push the subscriber has a short window to approve the payment on
//! their phone. The poller re-checks the status a fixed number of times at a
//! fixed interval and stops as soon as the transaction settles.

use crate::error::AppResult;
use crate::payments::TransactionStatus;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub steps: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            steps: 10,
            interval: Duration::from_millis(18_000),
        }
    }
}

impl PollConfig {
    /// Longest time a poll can take
    pub fn timeout(&self) -> Duration {
        self.interval * self.steps
    }
}

/// Result of a single status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStatus {
    pub status: TransactionStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Succeeded { step: u32, message: String },
    Failed { step: u32, message: String },
    TimedOut { steps: u32 },
    Cancelled { step: u32 },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Poll `check` until the transaction settles, the steps run out, or `shutdown` flips to `true`
///
/// The first check runs one `interval` after the call. A check error is logged
/// and the loop moves on to the next step.
pub async fn poll_until_settled<F, Fut>(
    config: &PollConfig,
    mut check: F,
    mut shutdown: watch::Receiver<bool>,
) -> PollOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<CheckStatus>>,
{
    for step in 1..=config.steps {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = cancelled(&mut shutdown) => {
                info!(step, "Transaction polling cancelled");
                return PollOutcome::Cancelled { step };
            }
        }

        match check(step).await {
            Ok(CheckStatus {
                status: TransactionStatus::Success,
                message,
            }) => return PollOutcome::Succeeded { step, message },
            Ok(CheckStatus {
                status: TransactionStatus::Failed,
                message,
            }) => return PollOutcome::Failed { step, message },
            Ok(CheckStatus { status, .. }) => {
                debug!(step, status = %status, "Transaction not settled yet");
            }
            Err(e) => {
                warn!(step, error = %e, "Transaction status check failed");
            }
        }
    }

    PollOutcome::TimedOut {
        steps: config.steps,
    }
}

async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender can never cancel us.
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
