//! Order store contract
//!
//! Implemented by the Postgres [`OrderRepository`](crate::database::order_repository::OrderRepository)
//! and by [`MemoryOrderStore`](super::MemoryOrderStore).

use super::{Order, OrderId, OrderStatus, Transition};
use crate::error::AppResult;
use async_trait::async_trait;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load an order, `None` if it does not exist
    async fn get(&self, id: OrderId) -> AppResult<Option<Order>>;

    /// Persist the order's fields as given
    async fn save(&self, order: &Order) -> AppResult<()>;

    /// Record the provider's own transaction id. Leaves every other field,
    /// the status in particular, as stored.
    async fn set_transaction_id(&self, id: OrderId, transaction_id: &str) -> AppResult<()>;

    async fn set_metadata(&self, id: OrderId, key: &str, value: &str) -> AppResult<()>;

    async fn add_note(&self, id: OrderId, text: &str, customer_visible: bool) -> AppResult<()>;

    /// Debit stock for the order's items. Repeated calls debit once.
    async fn reduce_stock(&self, id: OrderId) -> AppResult<()>;

    async fn empty_cart(&self, session_id: &str) -> AppResult<()>;

    /// Atomically move the order from `expected` to `transition.to` and apply
    /// the transition's notes, stock and cart effects.
    ///
    /// Returns `false` without changing anything when the stored status is no
    /// longer `expected`.
    async fn apply_transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        transition: &Transition,
    ) -> AppResult<bool>;
}
