use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{LeaseError, LeaseSnapshot};

/// Port for a lease collection that can be re-synchronized with its origin
#[async_trait]
pub trait LeaseSource: Send + Sync {
    /// Bring the collection up to date; a no-op when nothing changed
    async fn refresh(&self) -> Result<(), LeaseError>;

    /// The most recently published collection
    fn snapshot(&self) -> Arc<LeaseSnapshot>;
}
