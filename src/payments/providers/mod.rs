//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait.

pub mod notchpay;

pub use notchpay::{NotchPayConfig, NotchPayProvider};
