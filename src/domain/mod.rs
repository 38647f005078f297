pub mod error;
pub mod lease;
pub mod snapshot;

pub use error::LeaseError;
pub use lease::Lease;
pub use snapshot::LeaseSnapshot;
