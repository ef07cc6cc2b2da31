//! Removes tracking rows for payments that were never completed

use crate::error::AppResult;
use crate::services::host::TransactionStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub interval: Duration,
    /// Open rows younger than this are left alone
    pub max_age: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            max_age: Duration::from_secs(86_400),
        }
    }
}

pub struct CleanupWorker {
    store: Arc<dyn TransactionStore>,
    config: CleanupConfig,
}

impl CleanupWorker {
    pub fn new(store: Arc<dyn TransactionStore>, config: CleanupConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_age_secs = self.config.max_age.as_secs(),
            "transaction cleanup worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("transaction cleanup worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "transaction cleanup cycle failed");
                    }
                }
            }
        }

        info!("transaction cleanup worker stopped");
    }

    /// Delete stale open rows once, returning how many went
    pub async fn run_cycle(&self) -> AppResult<u64> {
        let max_age = chrono::Duration::from_std(self.config.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let cutoff = Utc::now() - max_age;

        let deleted = self.store.delete_incomplete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, %cutoff, "Deleted incomplete Airtel transactions");
        }
        Ok(deleted)
    }
}
