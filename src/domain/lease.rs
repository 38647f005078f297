use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single lease block from a dhcpd leases file.
///
/// Timestamps are UTC-naive, exactly as dhcpd writes them. Every field is
/// optional: `None` means the block did not carry that statement (or it
/// could not be parsed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub hostname: Option<String>,
    pub starts: Option<NaiveDateTime>,
    pub ends: Option<NaiveDateTime>,
    pub cltt: Option<NaiveDateTime>,
    pub uid: Option<String>,
    pub binding_state: Option<String>,
    pub next_binding_state: Option<String>,
    pub rewind_binding_state: Option<String>,
    pub hardware_type: Option<String>,
    pub hardware_address: Option<String>,
    pub ddns_fwd_name: Option<String>,
    pub ddns_rev_name: Option<String>,
    pub ddns_dhcid: Option<String>,
    pub vendor_class_identifier: Option<String>,
}

impl Lease {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lease is expired when its end time lies strictly before `now`.
    /// A lease without an end time is treated as expired.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        match self.ends {
            Some(ends) => ends < now,
            None => true,
        }
    }

    pub fn is_valid(&self, now: NaiveDateTime) -> bool {
        !self.is_expired(now)
    }
}
