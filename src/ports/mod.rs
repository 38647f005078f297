pub mod clock;
pub mod lease_file;
pub mod lease_source;

pub use clock::Clock;
pub use lease_file::LeaseFile;
pub use lease_source::LeaseSource;
