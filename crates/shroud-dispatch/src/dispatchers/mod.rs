//! Shipped dispatcher implementations

pub mod legacy;
pub mod lookup;
pub mod master;

pub use legacy::LegacyDispatcher;
pub use lookup::LookupDispatcher;
pub use master::MasterDispatcher;
