//! Notch Pay payment gateway for an e-commerce order system.
//!
//! Initializes payments on the provider's hosted page, confirms them through
//! the customer's return and the provider's signed webhook, and reconciles
//! each transaction against its order exactly once.

pub mod api;
#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod orders;
pub mod payments;
