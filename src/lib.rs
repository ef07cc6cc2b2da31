//! Airtel Africa mobile-money gateway
//!
//! Pushes USSD payment prompts through the Airtel Africa collection API,
//! tracks started transactions and records the payment with the hosting
//! platform once Airtel reports success.

#[cfg(feature = "database")]
pub mod api;
#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod workers;
