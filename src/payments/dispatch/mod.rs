//! Delivery dispatchers
//!
//! The customer's return from the hosted page and the provider's webhook are
//! two independent ways of learning about the same transaction. Both end in
//! the same [`Reconciler`](crate::payments::Reconciler), whose
//! compare-and-set makes them converge on one effective transition.

pub mod journal;
pub mod return_path;
pub mod webhook;

pub use journal::{DeliveryJournal, NoJournal};
pub use return_path::{ReturnNotice, ReturnOutcome};
pub use webhook::{WebhookAck, WebhookDispatcher};
