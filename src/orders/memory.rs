//! In-process order store
//!
//! Used by the test suites and when the service runs without the `database`
//! feature. A single mutex guards all state, so `apply_transition` is a
//! straightforward compare-and-set.

use super::{Order, OrderId, OrderNote, OrderStatus, OrderStore, Transition};
use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    notes: HashMap<OrderId, Vec<OrderNote>>,
    stock: HashMap<i64, i64>,
    stock_reduced: HashSet<OrderId>,
    carts: HashMap<String, Vec<i64>>,
    cart_clears: HashMap<String, usize>,
}

impl State {
    fn reduce_stock(&mut self, id: OrderId) {
        if self.stock_reduced.contains(&id) {
            return;
        }
        let Some(order) = self.orders.get(&id) else {
            return;
        };
        for item in &order.items {
            *self.stock.entry(item.product_id).or_insert(0) -= i64::from(item.quantity);
        }
        self.stock_reduced.insert(id);
    }

    fn empty_cart(&mut self, session_id: &str) {
        self.carts.remove(session_id);
        *self.cart_clears.entry(session_id.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    state: Mutex<State>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) {
        let mut state = self.state.lock().await;
        state.orders.insert(order.id, order);
    }

    pub async fn set_stock(&self, product_id: i64, quantity: i64) {
        self.state.lock().await.stock.insert(product_id, quantity);
    }

    pub async fn stock_level(&self, product_id: i64) -> Option<i64> {
        self.state.lock().await.stock.get(&product_id).copied()
    }

    pub async fn fill_cart(&self, session_id: &str, product_ids: Vec<i64>) {
        self.state
            .lock()
            .await
            .carts
            .insert(session_id.to_string(), product_ids);
    }

    pub async fn cart(&self, session_id: &str) -> Option<Vec<i64>> {
        self.state.lock().await.carts.get(session_id).cloned()
    }

    pub async fn cart_clears(&self, session_id: &str) -> usize {
        self.state
            .lock()
            .await
            .cart_clears
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn notes(&self, id: OrderId) -> Vec<OrderNote> {
        self.state
            .lock()
            .await
            .notes
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, id: OrderId) -> AppResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn save(&self, order: &Order) -> AppResult<()> {
        self.state
            .lock()
            .await
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn set_transaction_id(&self, id: OrderId, transaction_id: &str) -> AppResult<()> {
        if let Some(order) = self.state.lock().await.orders.get_mut(&id) {
            order.transaction_id = Some(transaction_id.to_string());
        }
        Ok(())
    }

    async fn set_metadata(&self, id: OrderId, key: &str, value: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(order) = state.orders.get_mut(&id) {
            order.metadata.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn add_note(&self, id: OrderId, text: &str, customer_visible: bool) -> AppResult<()> {
        let note = OrderNote {
            text: text.to_string(),
            customer_visible,
        };
        self.state
            .lock()
            .await
            .notes
            .entry(id)
            .or_default()
            .push(note);
        Ok(())
    }

    async fn reduce_stock(&self, id: OrderId) -> AppResult<()> {
        self.state.lock().await.reduce_stock(id);
        Ok(())
    }

    async fn empty_cart(&self, session_id: &str) -> AppResult<()> {
        self.state.lock().await.empty_cart(session_id);
        Ok(())
    }

    async fn apply_transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        transition: &Transition,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;

        let session_id = match state.orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.status = transition.to;
                order.session_id.clone()
            }
            _ => {
                debug!(order_id = %id, expected = %expected, "Order status changed underneath, transition skipped");
                return Ok(false);
            }
        };

        state
            .notes
            .entry(id)
            .or_default()
            .extend(transition.notes.iter().cloned());

        if transition.reduce_stock {
            state.reduce_stock(id);
        }

        if transition.empty_cart {
            if let Some(session_id) = session_id {
                state.empty_cart(&session_id);
            }
        }

        Ok(true)
    }
}
