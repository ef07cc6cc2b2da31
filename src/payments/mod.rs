//! Mobile-money provider integration
//!
//! Provider-neutral request/response types, the [`traits::PaymentProvider`] seam
//! and the Airtel Africa implementation.

pub mod codes;
pub mod providers;
pub mod token;
pub mod traits;
pub mod types;

pub use providers::AirtelProvider;
pub use traits::PaymentProvider;
pub use types::{AirtelEnvironment, TransactionStatus};
