//! Webhook dispatch: authentication, routing and exactly-once application

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{
    gateway, initiated_order, seeded_store, CountingStore, SlowStore, PRODUCT, SECRET, SESSION,
};
use notchpay_gateway::orders::{MemoryOrderStore, OrderId, OrderStatus, OrderStore};
use notchpay_gateway::payments::dispatch::{DeliveryJournal, NoJournal, WebhookAck, WebhookDispatcher};
use notchpay_gateway::payments::signature;
use notchpay_gateway::payments::types::Outcome;
use notchpay_gateway::payments::GatewaySettings;
use serde_json::json;
use tokio::sync::Mutex;

const REF: &str = "42_1700000000";
// Never contacted: the webhook path trusts the signed payload
const UNUSED_API: &str = "http://127.0.0.1:9";

fn body(event: &str, reference: &str, status: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": event,
        "data": {
            "reference": reference,
            "status": status,
            "amount": 5000,
            "currency": "XAF"
        }
    }))
    .unwrap()
}

async fn counting_store() -> (Arc<MemoryOrderStore>, Arc<CountingStore<MemoryOrderStore>>) {
    let inner = seeded_store(initiated_order(42, REF)).await;
    let counting = Arc::new(CountingStore::new(inner.clone()));
    (inner, counting)
}

fn dispatcher(store: Arc<dyn OrderStore>) -> WebhookDispatcher {
    WebhookDispatcher::new(
        gateway(UNUSED_API, store, GatewaySettings::default()),
        Arc::new(NoJournal),
    )
}

/// Journal kept in memory, standing in for the Redis one
#[derive(Default)]
struct MemoryJournal {
    seen: Mutex<HashSet<String>>,
}

#[async_trait]
impl DeliveryJournal for MemoryJournal {
    async fn is_delivered(&self, event: &str, reference: &str) -> bool {
        self.seen
            .lock()
            .await
            .contains(&format!("{}:{}", event, reference))
    }

    async fn mark_delivered(&self, event: &str, reference: &str) {
        self.seen
            .lock()
            .await
            .insert(format!("{}:{}", event, reference));
    }
}

#[tokio::test]
async fn test_signed_completion_is_processed() {
    let (inner, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    let raw = body("transaction.complete", REF, "complete");
    let sig = signature::sign(&raw, SECRET).unwrap();

    let ack = dispatcher.handle("POST", Some(sig.as_str()), &raw).await;

    assert_eq!(ack, WebhookAck::Processed(Outcome::Completed));
    let order = inner.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(inner.stock_level(PRODUCT).await, Some(8));
    assert_eq!(inner.cart_clears(SESSION).await, 1);
}

#[tokio::test]
async fn test_cancellation_event_cancels_order() {
    let (inner, store) = counting_store().await;
    let dispatcher = dispatcher(store);
    let raw = body("transaction.cancelled", REF, "canceled");
    let sig = signature::sign(&raw, SECRET).unwrap();

    let ack = dispatcher.handle("POST", Some(sig.as_str()), &raw).await;

    assert_eq!(ack, WebhookAck::Processed(Outcome::Cancelled));
    let order = inner.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(inner.stock_level(PRODUCT).await, Some(10));
}

#[tokio::test]
async fn test_wrong_signature_never_reaches_store() {
    let (_, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    let raw = body("transaction.complete", REF, "complete");

    let forged = signature::sign(&raw, "not_the_secret").unwrap();
    assert_eq!(
        dispatcher.handle("POST", Some(forged.as_str()), &raw).await,
        WebhookAck::Rejected
    );
    assert_eq!(
        dispatcher.handle("POST", Some("zz-not-hex"), &raw).await,
        WebhookAck::Rejected
    );

    // Signature over different bytes than the ones delivered
    let other = body("transaction.complete", REF, "failed");
    let sig = signature::sign(&other, SECRET).unwrap();
    assert_eq!(dispatcher.handle("POST", Some(sig.as_str()), &raw).await, WebhookAck::Rejected);

    assert_eq!(store.gets(), 0);
    assert_eq!(store.transitions(), 0);
}

#[tokio::test]
async fn test_missing_header_and_wrong_method_are_rejected() {
    let (_, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    let raw = body("transaction.complete", REF, "complete");
    let sig = signature::sign(&raw, SECRET).unwrap();

    assert_eq!(dispatcher.handle("POST", None, &raw).await, WebhookAck::Rejected);
    assert_eq!(dispatcher.handle("POST", Some(""), &raw).await, WebhookAck::Rejected);
    assert_eq!(dispatcher.handle("GET", Some(sig.as_str()), &raw).await, WebhookAck::Rejected);
    assert_eq!(store.gets(), 0);
}

#[tokio::test]
async fn test_malformed_reference_is_rejected_before_lookup() {
    let (_, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());

    for reference in ["abc_123", "42", "-42_1700000000"] {
        let raw = body("transaction.complete", reference, "complete");
        let sig = signature::sign(&raw, SECRET).unwrap();
        assert_eq!(
            dispatcher.handle("POST", Some(sig.as_str()), &raw).await,
            WebhookAck::Rejected,
            "reference '{}' should be rejected",
            reference
        );
    }
    assert_eq!(store.gets(), 0);
}

#[tokio::test]
async fn test_unparseable_body_is_rejected() {
    let (_, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    let raw = b"{not json".to_vec();
    let sig = signature::sign(&raw, SECRET).unwrap();

    assert_eq!(dispatcher.handle("POST", Some(sig.as_str()), &raw).await, WebhookAck::Rejected);
    assert_eq!(store.gets(), 0);
}

#[tokio::test]
async fn test_unknown_event_is_ignored() {
    let (_, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    let raw = body("payment.refunded", REF, "refunded");
    let sig = signature::sign(&raw, SECRET).unwrap();

    let ack = dispatcher.handle("POST", Some(sig.as_str()), &raw).await;

    assert_eq!(ack, WebhookAck::Ignored);
    assert!(ack.is_final());
    assert_eq!(store.gets(), 0);
}

#[tokio::test]
async fn test_reference_not_stored_on_order_is_rejected() {
    let (inner, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    // Same order id, but not the attempt the order recorded
    let raw = body("transaction.complete", "42_1800000000", "complete");
    let sig = signature::sign(&raw, SECRET).unwrap();

    assert_eq!(dispatcher.handle("POST", Some(sig.as_str()), &raw).await, WebhookAck::Rejected);
    assert_eq!(store.gets(), 1);
    assert_eq!(store.transitions(), 0);
    let order = inner.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_unknown_order_is_rejected() {
    let (_, store) = counting_store().await;
    let dispatcher = dispatcher(store.clone());
    let raw = body("transaction.complete", "77_1700000000", "complete");
    let sig = signature::sign(&raw, SECRET).unwrap();

    assert_eq!(dispatcher.handle("POST", Some(sig.as_str()), &raw).await, WebhookAck::Rejected);
    assert_eq!(store.transitions(), 0);
}

#[tokio::test]
async fn test_journal_short_circuits_repeated_delivery() {
    let (inner, store) = counting_store().await;
    let dispatcher = WebhookDispatcher::new(
        gateway(UNUSED_API, store.clone(), GatewaySettings::default()),
        Arc::new(MemoryJournal::default()),
    );
    let raw = body("transaction.complete", REF, "complete");
    let sig = signature::sign(&raw, SECRET).unwrap();

    let first = dispatcher.handle("POST", Some(sig.as_str()), &raw).await;
    let second = dispatcher.handle("POST", Some(sig.as_str()), &raw).await;

    assert_eq!(first, WebhookAck::Processed(Outcome::Completed));
    assert_eq!(second, WebhookAck::Duplicate);
    assert_eq!(store.gets(), 1);
    assert_eq!(inner.notes(OrderId(42)).await.len(), 1);
}

#[tokio::test]
async fn test_pending_delivery_does_not_block_later_settlement() {
    let (inner, store) = counting_store().await;
    let dispatcher = WebhookDispatcher::new(
        gateway(UNUSED_API, store, GatewaySettings::default()),
        Arc::new(MemoryJournal::default()),
    );

    let pending = body("transaction.complete", REF, "pending");
    let sig = signature::sign(&pending, SECRET).unwrap();
    assert_eq!(
        dispatcher.handle("POST", Some(sig.as_str()), &pending).await,
        WebhookAck::Processed(Outcome::Pending)
    );

    let settled = body("transaction.complete", REF, "complete");
    let sig = signature::sign(&settled, SECRET).unwrap();
    assert_eq!(
        dispatcher.handle("POST", Some(sig.as_str()), &settled).await,
        WebhookAck::Processed(Outcome::Completed)
    );
    let order = inner.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_slow_processing_asks_for_redelivery() {
    let inner = seeded_store(initiated_order(42, REF)).await;
    let slow = Arc::new(SlowStore {
        inner: inner.clone(),
        delay: Duration::from_millis(500),
    });
    let settings = GatewaySettings {
        webhook_timeout: Duration::from_millis(50),
        ..GatewaySettings::default()
    };
    let dispatcher = WebhookDispatcher::new(
        gateway(UNUSED_API, slow, settings),
        Arc::new(MemoryJournal::default()),
    );
    let raw = body("transaction.complete", REF, "complete");
    let sig = signature::sign(&raw, SECRET).unwrap();

    let ack = dispatcher.handle("POST", Some(sig.as_str()), &raw).await;

    assert_eq!(ack, WebhookAck::RetryLater);
    assert!(!ack.is_final());
    let order = inner.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(inner.notes(OrderId(42)).await.is_empty());

    // Nothing was half-applied, so a later delivery settles the order
    let fast = WebhookDispatcher::new(
        gateway(UNUSED_API, inner.clone(), GatewaySettings::default()),
        Arc::new(NoJournal),
    );
    assert_eq!(
        fast.handle("POST", Some(sig.as_str()), &raw).await,
        WebhookAck::Processed(Outcome::Completed)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_deliveries_apply_once() {
    let (inner, store) = counting_store().await;
    let dispatcher = Arc::new(dispatcher(store.clone()));
    let raw = Arc::new(body("transaction.complete", REF, "complete"));
    let sig = Arc::new(signature::sign(&raw, SECRET).unwrap());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let raw = raw.clone();
            let sig = sig.clone();
            tokio::spawn(async move { dispatcher.handle("POST", Some(sig.as_str()), &raw).await })
        })
        .collect();

    let mut acks = Vec::new();
    for handle in handles {
        acks.push(handle.await.unwrap());
    }

    let completed = acks
        .iter()
        .filter(|a| **a == WebhookAck::Processed(Outcome::Completed))
        .count();
    let finalized = acks
        .iter()
        .filter(|a| **a == WebhookAck::Processed(Outcome::AlreadyFinalized))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(finalized, 5);

    let order = inner.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(inner.notes(OrderId(42)).await.len(), 1);
    assert_eq!(inner.stock_level(PRODUCT).await, Some(8));
    assert_eq!(inner.cart_clears(SESSION).await, 1);
}
