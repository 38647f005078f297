use chrono::NaiveDateTime;

/// Port for reading the wall clock
pub trait Clock: Send + Sync {
    /// Current UTC time without a zone, comparable to dhcpd timestamps
    fn now(&self) -> NaiveDateTime;
}
