//! Notch Pay gateway
//!
//! Binds the provider client, the order store and the gateway settings into
//! the [`PaymentGateway`] capability consumed by the HTTP layer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{AppError, AppResult, DomainError};
use crate::orders::{Order, OrderId, OrderStore};
use crate::payments::initiator::TransactionInitiator;
use crate::payments::reconcile::Reconciler;
use crate::payments::reference;
use crate::payments::settings::GatewaySettings;
use crate::payments::traits::{PaymentGateway, PaymentProvider};
use crate::payments::types::{Initiation, Outcome, Transaction};

pub struct NotchPayGateway {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn OrderStore>,
    initiator: TransactionInitiator,
    reconciler: Reconciler,
}

impl NotchPayGateway {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn OrderStore>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            initiator: TransactionInitiator::new(provider.clone(), store.clone(), settings.clone()),
            reconciler: Reconciler::new(store.clone(), settings),
            provider,
            store,
        }
    }

    pub fn provider(&self) -> &dyn PaymentProvider {
        self.provider.as_ref()
    }

    pub fn store(&self) -> &dyn OrderStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &GatewaySettings {
        self.reconciler.settings()
    }

    /// Load the order a transaction points at
    pub async fn order_for(&self, txn: &Transaction) -> AppResult<Order> {
        let reference = txn
            .binding_reference()
            .ok_or_else(|| AppError::malformed_reference(""))?;
        let order_id = reference::decode(reference)?;
        self.load_order(order_id).await
    }

    pub async fn load_order(&self, order_id: OrderId) -> AppResult<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| {
                DomainError::OrderNotFound {
                    order_id: order_id.get(),
                }
                .into()
            })
    }
}

#[async_trait]
impl PaymentGateway for NotchPayGateway {
    async fn initialize(&self, order: &Order) -> AppResult<Initiation> {
        self.initiator.initialize(order).await
    }

    async fn verify(&self, reference: &str) -> AppResult<(OrderId, Outcome)> {
        // Only the reference is taken from the caller; status and amount come
        // from the provider.
        let txn = self.provider.fetch_transaction(reference).await?;
        let order = self.order_for(&txn).await?;
        let outcome = self.reconciler.reconcile(&order, &txn).await?;

        info!(order_id = %order.id, reference = %reference, outcome = %outcome, "Transaction verified");
        Ok((order.id, outcome))
    }

    async fn reconcile(&self, order: &Order, txn: &Transaction) -> AppResult<Outcome> {
        self.reconciler.reconcile(order, txn).await
    }
}
