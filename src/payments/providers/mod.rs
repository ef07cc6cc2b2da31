//! Payment provider implementations

pub mod airtel;

pub use airtel::{AirtelProvider, AirtelProviderConfig};
