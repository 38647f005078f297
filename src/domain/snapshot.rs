use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Lease;

/// Everything produced by one parse pass of the leases file.
///
/// A snapshot is immutable once built; the store publishes a new one on
/// every successful refresh, so the mapping and the counters always come
/// from the same pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseSnapshot {
    /// Modification time of the file version this snapshot was parsed from
    pub modified: Option<DateTime<Utc>>,
    /// The "now" every lease was classified against
    pub parsed_at: Option<NaiveDateTime>,
    pub leases: HashMap<String, Lease>,
    pub valid: usize,
    pub expired: usize,
    /// Lines skipped with a non-fatal warning
    pub warnings: usize,
}

impl LeaseSnapshot {
    /// Classify every lease against a single `now` and build the snapshot.
    pub fn classify(
        leases: HashMap<String, Lease>,
        now: NaiveDateTime,
        modified: Option<DateTime<Utc>>,
        warnings: usize,
    ) -> Self {
        let valid = leases.values().filter(|l| l.is_valid(now)).count();
        let expired = leases.len() - valid;

        Self {
            modified,
            parsed_at: Some(now),
            leases,
            valid,
            expired,
            warnings,
        }
    }

    pub fn get(&self, client: &str) -> Option<&Lease> {
        self.leases.get(client)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Leases ordered by client identifier
    pub fn sorted(&self) -> Vec<(&String, &Lease)> {
        let mut entries: Vec<_> = self.leases.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}
