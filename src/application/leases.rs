use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{LeaseError, LeaseSnapshot};
use crate::ports::LeaseSource;

/// Main application service for lease monitoring
pub struct LeaseService {
    source: Arc<dyn LeaseSource>,
}

impl LeaseService {
    pub fn new(source: Arc<dyn LeaseSource>) -> Self {
        Self { source }
    }

    /// Bring the leases up to date, then return them
    pub async fn current(&self) -> Result<Arc<LeaseSnapshot>, LeaseError> {
        self.source.refresh().await?;
        Ok(self.source.snapshot())
    }

    /// Last published leases, without touching the file
    pub fn cached(&self) -> Arc<LeaseSnapshot> {
        self.source.snapshot()
    }

    /// Refresh every `period` until the task is dropped. Failures are logged
    /// and the previous leases stay in place.
    pub async fn poll(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.source.refresh().await {
                Ok(()) => debug!("Lease poll complete"),
                Err(e) => warn!("Lease refresh failed: {}", e),
            }
        }
    }
}
