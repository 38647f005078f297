pub mod dhcpd;
pub mod local;

pub use dhcpd::{DhcpdConfig, DhcpdLeaseSource};
pub use local::{LocalFs, SystemClock};
