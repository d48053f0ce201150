//! Asynchronous webhook path
//!
//! Checks run in a fixed order and the first failure stops processing:
//! method and signature header, signature over the raw bytes, JSON shape,
//! event type, reference, order, stored reference. Every rejection produces
//! the same [`WebhookAck::Rejected`] so a caller cannot tell which check
//! failed.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::orders::{Order, OrderId};
use crate::payments::dispatch::journal::DeliveryJournal;
use crate::payments::gateway::NotchPayGateway;
use crate::payments::reference;
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{Outcome, WebhookPayload};

/// Events the gateway acts on; anything else is acknowledged and ignored
pub const HANDLED_EVENTS: [&str; 4] = [
    "transaction.complete",
    "transaction.canceled",
    "transaction.cancelled",
    "transaction.failed",
];

/// How a delivery was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    Processed(Outcome),
    /// Already processed earlier according to the delivery journal
    Duplicate,
    /// Authentic, but not an event the gateway acts on
    Ignored,
    /// Failed a check; dropped without saying why
    Rejected,
    /// Could not be processed now; the provider should deliver again
    RetryLater,
}

impl WebhookAck {
    /// Whether the provider should consider the delivery done
    pub fn is_final(&self) -> bool {
        !matches!(self, WebhookAck::RetryLater)
    }
}

pub struct WebhookDispatcher {
    gateway: Arc<NotchPayGateway>,
    journal: Arc<dyn DeliveryJournal>,
}

impl WebhookDispatcher {
    pub fn new(gateway: Arc<NotchPayGateway>, journal: Arc<dyn DeliveryJournal>) -> Self {
        Self { gateway, journal }
    }

    pub async fn handle(&self, method: &str, signature: Option<&str>, raw_body: &[u8]) -> WebhookAck {
        if !method.eq_ignore_ascii_case("POST") {
            debug!(method, "Webhook rejected: method");
            return WebhookAck::Rejected;
        }

        let Some(signature) = signature.filter(|s| !s.is_empty()) else {
            warn!("Webhook rejected: missing signature header");
            return WebhookAck::Rejected;
        };

        if !self
            .gateway
            .provider()
            .validate_webhook_signature(raw_body, signature)
        {
            warn!("Webhook rejected: invalid signature");
            return WebhookAck::Rejected;
        }

        let payload: WebhookPayload = match serde_json::from_slice(raw_body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Webhook rejected: unreadable payload: {}", e);
                return WebhookAck::Rejected;
            }
        };

        if !HANDLED_EVENTS.contains(&payload.event.as_str()) {
            info!(event = %payload.event, "Webhook event ignored");
            return WebhookAck::Ignored;
        }

        let Some(txn_reference) = payload.data.binding_reference().map(str::to_string) else {
            warn!(event = %payload.event, "Webhook rejected: no reference");
            return WebhookAck::Rejected;
        };

        let order_id = match reference::decode(&txn_reference) {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!("Webhook rejected: {}", e);
                return WebhookAck::Rejected;
            }
        };

        if self.journal.is_delivered(&payload.event, &txn_reference).await {
            info!(event = %payload.event, reference = %txn_reference, "Duplicate webhook delivery acknowledged");
            return WebhookAck::Duplicate;
        }

        let budget = self.gateway.settings().webhook_timeout;
        let work = self.process(order_id, &txn_reference, &payload);
        let result = match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => {
                error!(reference = %txn_reference, "Webhook processing exceeded {:?}", budget);
                return WebhookAck::RetryLater;
            }
        };

        match result {
            Ok(Some(outcome)) => {
                // A pending outcome changed nothing; a later delivery may still settle it
                if outcome != Outcome::Pending {
                    self.journal
                        .mark_delivered(&payload.event, &txn_reference)
                        .await;
                }
                info!(event = %payload.event, reference = %txn_reference, outcome = %outcome, "Webhook processed");
                WebhookAck::Processed(outcome)
            }
            Ok(None) => WebhookAck::Rejected,
            Err(e) if e.is_retryable() => {
                error!(reference = %txn_reference, "Webhook processing failed, asking for redelivery: {}", e);
                WebhookAck::RetryLater
            }
            Err(e) => {
                warn!(reference = %txn_reference, "Webhook rejected: {}", e);
                WebhookAck::Rejected
            }
        }
    }

    /// Load the order, cross-check its stored reference and reconcile.
    /// `None` means the delivery does not belong to the order.
    async fn process(
        &self,
        order_id: OrderId,
        txn_reference: &str,
        payload: &WebhookPayload,
    ) -> AppResult<Option<Outcome>> {
        let order = self.gateway.load_order(order_id).await?;
        if !stored_reference_matches(&order, txn_reference) {
            warn!(order_id = %order_id, reference = %txn_reference, "Webhook rejected: reference does not match order");
            return Ok(None);
        }
        let outcome = self.gateway.reconcile(&order, &payload.data).await?;
        Ok(Some(outcome))
    }
}

fn stored_reference_matches(order: &Order, reference: &str) -> bool {
    order.transaction_reference() == Some(reference)
}
