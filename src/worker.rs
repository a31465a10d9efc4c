use crate::collector::{CollectError, Collector};
use crate::metrics::Publisher;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("collecting copilot premium usage: {0}")]
    Collect(#[from] CollectError),
    #[error("publishing metrics: {0}")]
    Publish(#[from] prometheus::Error),
}

/// Outcome of a cycle that reached the publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub seat_holders: usize,
    pub observations: usize,
    pub skipped_users: usize,
}

pub struct Worker {
    collector: Collector,
    publisher: Arc<Publisher>,
    enterprise: String,
    interval: Duration,
}

impl Worker {
    pub fn new(
        collector: Collector,
        publisher: Arc<Publisher>,
        enterprise: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            collector,
            publisher,
            enterprise: enterprise.into(),
            interval,
        }
    }

    /// Collect and publish once. On failure the previous snapshot stays published.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let snapshot = self.collector.collect(&self.enterprise).await?;
        self.publisher.publish(&snapshot)?;
        Ok(CycleReport {
            seat_holders: snapshot.seat_holders,
            observations: snapshot.observations.len(),
            skipped_users: snapshot.skipped_users.len(),
        })
    }

    /// Runs cycles back to back, sleeping the full interval after each one.
    pub async fn run(self) {
        loop {
            info!(
                "collecting copilot premium usage metrics for enterprise {}",
                self.enterprise
            );
            match self.run_cycle().await {
                Ok(report) => {
                    if report.skipped_users > 0 {
                        warn!(
                            "usage missing for {} of {} seat holders",
                            report.skipped_users, report.seat_holders
                        );
                    }
                    info!(
                        "metrics published: {} observations from {} seat holders",
                        report.observations, report.seat_holders
                    );
                }
                Err(err) => error!("failed to collect metrics: {}", err),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
