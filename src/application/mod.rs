pub mod leases;

pub use leases::LeaseService;
