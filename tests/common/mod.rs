//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use notchpay_gateway::error::AppResult;
use notchpay_gateway::orders::{
    CustomerDetails, MemoryOrderStore, Order, OrderId, OrderItem, OrderStatus, OrderStore,
    Transition, TRANSACTION_REFERENCE_KEY,
};
use notchpay_gateway::payments::providers::{NotchPayConfig, NotchPayProvider};
use notchpay_gateway::payments::types::{Transaction, TransactionStatus};
use notchpay_gateway::payments::{GatewaySettings, NotchPayGateway};

pub const SECRET: &str = "hsk_test_secret";
pub const SESSION: &str = "sess-1";
pub const PRODUCT: i64 = 501;

pub fn order(id: i64) -> Order {
    Order {
        id: OrderId(id),
        total_amount: BigDecimal::from(5000),
        currency: "XAF".to_string(),
        status: OrderStatus::Pending,
        payment_method: "notchpay".to_string(),
        customer: CustomerDetails {
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            email: "ama@example.com".to_string(),
            phone: Some("+237600000000".to_string()),
            billing_address: None,
            shipping_address: None,
        },
        items: vec![OrderItem {
            product_id: PRODUCT,
            name: "Mug".to_string(),
            quantity: 2,
        }],
        session_id: Some(SESSION.to_string()),
        transaction_id: None,
        metadata: HashMap::new(),
    }
}

/// Order that went through initialization with `reference`
pub fn initiated_order(id: i64, reference: &str) -> Order {
    let mut order = order(id);
    order
        .metadata
        .insert(TRANSACTION_REFERENCE_KEY.to_string(), reference.to_string());
    order
}

pub fn txn(reference: &str, status: TransactionStatus, amount: i64, currency: &str) -> Transaction {
    Transaction {
        reference: Some(reference.to_string()),
        merchant_reference: None,
        status,
        amount: BigDecimal::from(amount),
        currency: currency.to_string(),
    }
}

/// Memory store seeded with one order, stock and a filled cart
pub async fn seeded_store(order: Order) -> Arc<MemoryOrderStore> {
    let store = Arc::new(MemoryOrderStore::new());
    store.set_stock(PRODUCT, 10).await;
    if let Some(session) = &order.session_id {
        store.fill_cart(session, vec![PRODUCT]).await;
    }
    store.insert(order).await;
    store
}

pub fn provider(base_url: &str) -> Arc<NotchPayProvider> {
    Arc::new(
        NotchPayProvider::new(NotchPayConfig {
            api_key: "pk.test_key".to_string(),
            webhook_secret: SECRET.to_string(),
            base_url: base_url.to_string(),
            timeout_secs: 5,
            max_retries: 1,
            retry_base_delay: Duration::from_millis(10),
        })
        .unwrap(),
    )
}

pub fn gateway(
    base_url: &str,
    store: Arc<dyn OrderStore>,
    settings: GatewaySettings,
) -> Arc<NotchPayGateway> {
    Arc::new(NotchPayGateway::new(provider(base_url), store, settings))
}

/// Order store wrapper counting every call, to prove what was not touched
pub struct CountingStore<S> {
    pub inner: Arc<S>,
    pub gets: AtomicUsize,
    pub transitions: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            transitions: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: OrderStore> OrderStore for CountingStore<S> {
    async fn get(&self, id: OrderId) -> AppResult<Option<Order>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn save(&self, order: &Order) -> AppResult<()> {
        self.inner.save(order).await
    }

    async fn set_transaction_id(&self, id: OrderId, transaction_id: &str) -> AppResult<()> {
        self.inner.set_transaction_id(id, transaction_id).await
    }

    async fn set_metadata(&self, id: OrderId, key: &str, value: &str) -> AppResult<()> {
        self.inner.set_metadata(id, key, value).await
    }

    async fn add_note(&self, id: OrderId, text: &str, customer_visible: bool) -> AppResult<()> {
        self.inner.add_note(id, text, customer_visible).await
    }

    async fn reduce_stock(&self, id: OrderId) -> AppResult<()> {
        self.inner.reduce_stock(id).await
    }

    async fn empty_cart(&self, session_id: &str) -> AppResult<()> {
        self.inner.empty_cart(session_id).await
    }

    async fn apply_transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        transition: &Transition,
    ) -> AppResult<bool> {
        self.transitions.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_transition(id, expected, transition).await
    }
}

/// Order store wrapper whose lookups take `delay`
pub struct SlowStore<S> {
    pub inner: Arc<S>,
    pub delay: Duration,
}

#[async_trait]
impl<S: OrderStore> OrderStore for SlowStore<S> {
    async fn get(&self, id: OrderId) -> AppResult<Option<Order>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(id).await
    }

    async fn save(&self, order: &Order) -> AppResult<()> {
        self.inner.save(order).await
    }

    async fn set_transaction_id(&self, id: OrderId, transaction_id: &str) -> AppResult<()> {
        self.inner.set_transaction_id(id, transaction_id).await
    }

    async fn set_metadata(&self, id: OrderId, key: &str, value: &str) -> AppResult<()> {
        self.inner.set_metadata(id, key, value).await
    }

    async fn add_note(&self, id: OrderId, text: &str, customer_visible: bool) -> AppResult<()> {
        self.inner.add_note(id, text, customer_visible).await
    }

    async fn reduce_stock(&self, id: OrderId) -> AppResult<()> {
        self.inner.reduce_stock(id).await
    }

    async fn empty_cart(&self, session_id: &str) -> AppResult<()> {
        self.inner.empty_cart(session_id).await
    }

    async fn apply_transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        transition: &Transition,
    ) -> AppResult<bool> {
        self.inner.apply_transition(id, expected, transition).await
    }
}
