//! Notch Pay payment gateway
//!
//! Initializes payments, confirms them through the customer's return and the
//! provider's signed webhook, and reconciles each confirmed transaction
//! against its order exactly once.

pub mod dispatch;
pub mod gateway;
pub mod initiator;
pub mod notes;
pub mod providers;
pub mod reconcile;
pub mod reference;
pub mod settings;
pub mod signature;
pub mod traits;
pub mod types;

pub use gateway::NotchPayGateway;
pub use initiator::TransactionInitiator;
pub use reconcile::Reconciler;
pub use settings::GatewaySettings;
pub use traits::{PaymentGateway, PaymentProvider};
