use std::path::PathBuf;

use thiserror::Error;

/// Failure of a lease refresh. A failed refresh never replaces the
/// previously published leases.
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refresh task failed: {0}")]
    Task(String),
}

impl LeaseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
