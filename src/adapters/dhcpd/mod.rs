mod parser;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use store::LeaseStore;

use crate::domain::{LeaseError, LeaseSnapshot};
use crate::ports::LeaseSource;

/// Where dhcpd keeps its lease database on Debian-style systems
pub const DEFAULT_LEASES_FILE: &str = "/var/lib/dhcp/dhcpd.leases";

/// Configuration for the dhcpd leases file (useful for Docker mounts)
#[derive(Debug, Clone)]
pub struct DhcpdConfig {
    pub leases_file: PathBuf,
    pub debug: bool,
}

impl DhcpdConfig {
    pub fn new(leases_file: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            leases_file: leases_file.into(),
            debug,
        }
    }
}

impl Default for DhcpdConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LEASES_FILE, false)
    }
}

/// Lease source backed by a dhcpd leases file
#[derive(Clone)]
pub struct DhcpdLeaseSource {
    store: Arc<LeaseStore>,
}

impl DhcpdLeaseSource {
    pub fn new(store: Arc<LeaseStore>) -> Self {
        Self { store }
    }

    /// Open the configured file and parse it once
    pub fn open(config: &DhcpdConfig) -> Result<Self, LeaseError> {
        let store = LeaseStore::open(config.leases_file.clone(), config.debug)?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn store(&self) -> &Arc<LeaseStore> {
        &self.store
    }
}

#[async_trait]
impl LeaseSource for DhcpdLeaseSource {
    async fn refresh(&self) -> Result<(), LeaseError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.read())
            .await
            .map_err(|e| LeaseError::Task(e.to_string()))?
    }

    fn snapshot(&self) -> Arc<LeaseSnapshot> {
        self.store.snapshot()
    }
}
