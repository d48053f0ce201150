//! Payment trait definitions
//!
//! `PaymentProvider` is the HTTP seam to the processor; `PaymentGateway` is
//! the capability the rest of the service consumes.

use crate::error::AppResult;
use crate::orders::{Order, OrderId};
use crate::payments::types::{
    InitializeRequest, InitializeResponse, Initiation, Outcome, Transaction,
};
use async_trait::async_trait;

/// Client for the payment provider's API
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a transaction and obtain the hosted payment page.
    ///
    /// Succeeds only on HTTP 201. Never retried: a second attempt with the
    /// same reference would be rejected by the provider anyway.
    async fn initialize_transaction(&self, request: &InitializeRequest) -> AppResult<InitializeResponse>;

    /// Fetch the authoritative state of a transaction by reference
    async fn fetch_transaction(&self, reference: &str) -> AppResult<Transaction>;

    /// Verify that a webhook body was produced by the provider
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body exactly as received
    /// * `signature` - Signature from the webhook header
    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}

/// What a checkout integration needs from a payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start paying for `order`
    async fn initialize(&self, order: &Order) -> AppResult<Initiation>;

    /// Confirm a transaction by re-fetching it from the provider and
    /// reconciling it against its order
    async fn verify(&self, reference: &str) -> AppResult<(OrderId, Outcome)>;

    /// Decide and apply the order's next state for a provider transaction
    async fn reconcile(&self, order: &Order, txn: &Transaction) -> AppResult<Outcome>;
}
