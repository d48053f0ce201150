//! Transaction initiator
//!
//! Turns an order into a Notch Pay transaction and a hosted payment page.
//! The reference is recorded on the order before the redirect is returned:
//! it is the only key later confirmations can use to find the order again.

use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::{AppResult, DomainError};
use crate::orders::{Order, OrderNote, OrderStatus, OrderStore, Transition, TRANSACTION_REFERENCE_KEY};
use crate::payments::notes;
use crate::payments::reference;
use crate::payments::settings::GatewaySettings;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{InitializeRequest, Initiation, RedirectTarget};

pub struct TransactionInitiator {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn OrderStore>,
    settings: GatewaySettings,
}

impl TransactionInitiator {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn OrderStore>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
        }
    }

    /// Start paying for `order`.
    ///
    /// On any provider failure the order keeps its status, an admin note
    /// records the reason and the error is returned to the caller.
    pub async fn initialize(&self, order: &Order) -> AppResult<Initiation> {
        validate_order(order)?;

        if order.status.is_finalized() {
            info!(order_id = %order.id, status = %order.status, "Order already paid, not starting a new payment");
            return Ok(Initiation::NoPaymentRequired);
        }

        if order.total_amount.is_zero() {
            return self.mark_paid_without_payment(order).await;
        }

        let reference = reference::generate(order.id);
        let request = build_request(order, &reference, &self.settings);

        let response = match self.provider.initialize_transaction(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(order_id = %order.id, reference = %reference, "Payment initialization failed: {}", e);
                let note = notes::initiation_failed(&e.to_string());
                if let Err(note_err) = self
                    .store
                    .add_note(order.id, &note.text, note.customer_visible)
                    .await
                {
                    warn!(order_id = %order.id, "Failed to record initialization failure: {}", note_err);
                }
                return Err(e);
            }
        };

        self.store
            .set_metadata(order.id, TRANSACTION_REFERENCE_KEY, &reference)
            .await?;

        if let Some(provider_reference) = &response.provider_reference {
            self.store
                .set_transaction_id(order.id, provider_reference)
                .await?;
        }

        info!(order_id = %order.id, reference = %reference, "Payment initialized, redirecting customer");

        Ok(Initiation::Redirect(RedirectTarget {
            redirect_url: response.authorization_url,
            reference,
        }))
    }

    async fn mark_paid_without_payment(&self, order: &Order) -> AppResult<Initiation> {
        let to = if self.settings.autocompletes(order) {
            OrderStatus::Completed
        } else {
            OrderStatus::Processing
        };
        let transition = Transition {
            to,
            notes: vec![OrderNote::admin("Order total is zero, no payment required.")],
            reduce_stock: true,
            empty_cart: true,
        };

        let applied = self
            .store
            .apply_transition(order.id, order.status, &transition)
            .await?;
        info!(order_id = %order.id, applied, "Zero-total order marked paid");

        Ok(Initiation::NoPaymentRequired)
    }
}

fn validate_order(order: &Order) -> AppResult<()> {
    if order.total_amount < BigDecimal::zero() {
        return Err(DomainError::InvalidOrder {
            message: format!("order {} has a negative total", order.id),
        }
        .into());
    }
    if order.currency.trim().is_empty() {
        return Err(DomainError::InvalidOrder {
            message: format!("order {} has no currency", order.id),
        }
        .into());
    }
    Ok(())
}

/// Initialize body for `order`, forwarding only the enabled customer fields
pub fn build_request(order: &Order, reference: &str, settings: &GatewaySettings) -> InitializeRequest {
    let fields = &settings.customer_fields;
    let customer = &order.customer;

    let non_empty = |value: String| Some(value).filter(|v| !v.trim().is_empty());

    let mut metadata = serde_json::Map::new();
    metadata.insert("order_id".to_string(), json!(order.id.get()));
    if fields.billing_address {
        if let Some(address) = &customer.billing_address {
            metadata.insert("billing_address".to_string(), json!(address.to_string()));
        }
    }
    if fields.shipping_address {
        if let Some(address) = &customer.shipping_address {
            metadata.insert("shipping_address".to_string(), json!(address.to_string()));
        }
    }

    InitializeRequest {
        amount: order.total_amount.clone(),
        currency: order.currency.clone(),
        reference: reference.to_string(),
        callback: settings.callback_url.clone(),
        description: order.description(),
        email: fields
            .email
            .then(|| customer.email.clone())
            .and_then(non_empty),
        name: fields.name.then(|| customer.full_name()).and_then(non_empty),
        phone: fields
            .phone
            .then(|| customer.phone.clone())
            .flatten()
            .and_then(non_empty),
        metadata: Some(serde_json::Value::Object(metadata)),
    }
}
