//! Reconciliation scenarios against the in-memory order store

mod common;

use std::sync::Arc;

use common::{order, seeded_store, txn, PRODUCT, SESSION};
use notchpay_gateway::error::DomainError;
use notchpay_gateway::orders::{OrderId, OrderStatus, OrderStore};
use notchpay_gateway::payments::types::{Outcome, TransactionStatus};
use notchpay_gateway::payments::{GatewaySettings, Reconciler};

const REF: &str = "42_1700000000";

#[tokio::test]
async fn test_happy_path_moves_order_to_processing() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Complete, 5000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Processing);
    assert_eq!(store.cart(SESSION).await, None);
    assert_eq!(store.cart_clears(SESSION).await, 1);
    assert_eq!(store.stock_level(PRODUCT).await, Some(8));

    let notes = store.notes(OrderId(42)).await;
    assert_eq!(notes.len(), 1);
    assert!(notes[0].text.contains(REF));
}

#[tokio::test]
async fn test_autocomplete_moves_order_to_completed() {
    let store = seeded_store(order(42)).await;
    let settings = GatewaySettings {
        autocomplete_orders: true,
        ..GatewaySettings::default()
    };
    let reconciler = Reconciler::new(store.clone(), settings);

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Complete, 5000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(store.cart_clears(SESSION).await, 1);
}

#[tokio::test]
async fn test_underpayment_holds_order() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Complete, 4000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::OnHoldAmountMismatch);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::OnHold);
    assert_eq!(store.stock_level(PRODUCT).await, Some(8));
    // The cart survives: the customer has not fully paid
    assert_eq!(store.cart_clears(SESSION).await, 0);

    let notes = store.notes(OrderId(42)).await;
    assert_eq!(notes.iter().filter(|n| n.customer_visible).count(), 1);
    assert_eq!(notes.iter().filter(|n| !n.customer_visible).count(), 1);
    for note in &notes {
        assert!(note.text.contains(REF));
        assert!(note.text.contains("4000"));
        assert!(note.text.contains("5000"));
        assert!(note.text.contains("FCFA"));
    }
}

#[tokio::test]
async fn test_currency_mismatch_holds_order() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Complete, 5000, "USD"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::OnHoldCurrencyMismatch);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::OnHold);
    assert_eq!(store.stock_level(PRODUCT).await, Some(8));

    let notes = store.notes(OrderId(42)).await;
    assert_eq!(notes.len(), 2);
    for note in &notes {
        assert!(note.text.contains("USD"));
        assert!(note.text.contains("XAF"));
        assert!(note.text.contains(REF));
    }
}

#[tokio::test]
async fn test_cancellation_has_no_side_effects() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Canceled, 5000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
    assert_eq!(store.stock_level(PRODUCT).await, Some(10));
    assert_eq!(store.cart(SESSION).await, Some(vec![PRODUCT]));
    assert!(store.notes(OrderId(42)).await.is_empty());
}

#[tokio::test]
async fn test_failure_marks_order_failed() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Failed, 5000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Failed);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
    assert_eq!(store.stock_level(PRODUCT).await, Some(10));
}

#[tokio::test]
async fn test_pending_provider_status_changes_nothing() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Initialized, 5000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Pending);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_second_reconcile_is_idempotent() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());
    let paid = txn(REF, TransactionStatus::Complete, 5000, "XAF");

    let first = reconciler.reconcile(&order(42), &paid).await.unwrap();
    // A stale copy of the order still says pending
    let second = reconciler.reconcile(&order(42), &paid).await.unwrap();
    let fresh = store.get(OrderId(42)).await.unwrap().unwrap();
    let third = reconciler.reconcile(&fresh, &paid).await.unwrap();

    assert_eq!(first, Outcome::Completed);
    assert_eq!(second, Outcome::AlreadyFinalized);
    assert_eq!(third, Outcome::AlreadyFinalized);
    assert_eq!(store.notes(OrderId(42)).await.len(), 1);
    assert_eq!(store.stock_level(PRODUCT).await, Some(8));
    assert_eq!(store.cart_clears(SESSION).await, 1);
}

#[tokio::test]
async fn test_finalized_order_ignores_cancellation() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Complete, 4000, "XAF"))
        .await
        .unwrap();
    let outcome = reconciler
        .reconcile(&order(42), &txn(REF, TransactionStatus::Canceled, 4000, "XAF"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::AlreadyFinalized);
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::OnHold);
}

#[tokio::test]
async fn test_reference_for_other_order_is_rejected() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    let err = reconciler
        .reconcile(&order(42), &txn("43_1700000000", TransactionStatus::Complete, 5000, "XAF"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.domain(),
        Some(DomainError::ReferenceMismatch { order_id: 42, .. })
    ));
    let stored = store.get(OrderId(42)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_undecodable_reference_is_rejected() {
    let store = seeded_store(order(42)).await;
    let reconciler = Reconciler::new(store.clone(), GatewaySettings::default());

    for reference in ["abc_123", "42"] {
        let err = reconciler
            .reconcile(&order(42), &txn(reference, TransactionStatus::Complete, 5000, "XAF"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::MalformedReference { .. })
        ));
    }
    assert!(store.notes(OrderId(42)).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reconciles_apply_once() {
    let store = seeded_store(order(42)).await;
    let reconciler = Arc::new(Reconciler::new(store.clone(), GatewaySettings::default()));
    let paid = txn(REF, TransactionStatus::Complete, 5000, "XAF");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reconciler = reconciler.clone();
            let paid = paid.clone();
            tokio::spawn(async move { reconciler.reconcile(&order(42), &paid).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| **o == Outcome::Completed).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == Outcome::AlreadyFinalized)
            .count(),
        7
    );
    assert_eq!(store.notes(OrderId(42)).await.len(), 1);
    assert_eq!(store.stock_level(PRODUCT).await, Some(8));
    assert_eq!(store.cart_clears(SESSION).await, 1);
}
