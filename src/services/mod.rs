//! Gateway business logic

pub mod gateway;
pub mod host;
pub mod poller;
pub mod pricing;

#[cfg(test)]
pub(crate) mod testing;

pub use gateway::{GatewayService, GatewaySettings};
pub use poller::{PollConfig, PollOutcome};
