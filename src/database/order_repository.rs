use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::Repository;
use crate::database::transaction::DatabaseTransaction;
use crate::error::AppResult;
use crate::orders::{
    CustomerDetails, Order, OrderId, OrderItem, OrderNote, OrderStatus, OrderStore, Transition,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{debug, info};

/// Order row as stored in `orders`
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: i64,
    status: String,
    total_amount: BigDecimal,
    currency: String,
    payment_method: String,
    customer: Json<CustomerDetails>,
    session_id: Option<String>,
    transaction_id: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct OrderItemRow {
    product_id: i64,
    name: String,
    quantity: i32,
}

/// Postgres-backed order store
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: OrderId) -> Result<Option<Order>, DatabaseError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, status, total_amount, currency, payment_method, customer, session_id, transaction_id
             FROM orders WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT product_id, name, quantity FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let metadata: Vec<(String, String)> = sqlx::query_as(
            "SELECT meta_key, meta_value FROM order_meta WHERE order_id = $1",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let status = row.status.parse::<OrderStatus>().map_err(|message| {
            DatabaseError::new(DatabaseErrorKind::InvalidData { message })
                .with_context(format!("order {}", row.id))
        })?;

        Ok(Some(Order {
            id: OrderId(row.id),
            total_amount: row.total_amount,
            currency: row.currency,
            status,
            payment_method: row.payment_method,
            customer: row.customer.0,
            items: items
                .into_iter()
                .map(|item| OrderItem {
                    product_id: item.product_id,
                    name: item.name,
                    quantity: item.quantity,
                })
                .collect(),
            session_id: row.session_id,
            transaction_id: row.transaction_id,
            metadata: metadata.into_iter().collect::<HashMap<_, _>>(),
        }))
    }

    async fn store(&self, order: &Order) -> Result<(), DatabaseError> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;
        let conn = tx.conn()?;

        sqlx::query(
            "INSERT INTO orders (id, status, total_amount, currency, payment_method, customer, session_id, transaction_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                total_amount = EXCLUDED.total_amount,
                currency = EXCLUDED.currency,
                payment_method = EXCLUDED.payment_method,
                customer = EXCLUDED.customer,
                session_id = EXCLUDED.session_id,
                transaction_id = EXCLUDED.transaction_id,
                updated_at = NOW()",
        )
        .bind(order.id.get())
        .bind(order.status.as_str())
        .bind(&order.total_amount)
        .bind(&order.currency)
        .bind(&order.payment_method)
        .bind(Json(&order.customer))
        .bind(&order.session_id)
        .bind(&order.transaction_id)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id.get())
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, name, quantity) VALUES ($1, $2, $3, $4)",
            )
            .bind(order.id.get())
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }

        for (key, value) in &order.metadata {
            upsert_meta(conn, order.id, key, value).await?;
        }

        tx.commit().await
    }

    /// Notes written for an order, oldest first
    pub async fn notes(&self, id: OrderId) -> Result<Vec<OrderNote>, DatabaseError> {
        let rows: Vec<(String, bool)> = sqlx::query_as(
            "SELECT note, customer_visible FROM order_notes WHERE order_id = $1 ORDER BY id",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(text, customer_visible)| OrderNote {
                text,
                customer_visible,
            })
            .collect())
    }
}

async fn upsert_meta(
    conn: &mut PgConnection,
    id: OrderId,
    key: &str,
    value: &str,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO order_meta (order_id, meta_key, meta_value) VALUES ($1, $2, $3)
         ON CONFLICT (order_id, meta_key) DO UPDATE SET meta_value = EXCLUDED.meta_value",
    )
    .bind(id.get())
    .bind(key)
    .bind(value)
    .execute(conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;
    Ok(())
}

async fn insert_note(
    conn: &mut PgConnection,
    id: OrderId,
    text: &str,
    customer_visible: bool,
) -> Result<(), DatabaseError> {
    sqlx::query("INSERT INTO order_notes (order_id, note, customer_visible) VALUES ($1, $2, $3)")
        .bind(id.get())
        .bind(text)
        .bind(customer_visible)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;
    Ok(())
}

/// Debit stock for the order's items unless already done for this order
async fn debit_stock(conn: &mut PgConnection, id: OrderId) -> Result<bool, DatabaseError> {
    let claimed = sqlx::query(
        "UPDATE orders SET stock_reduced = TRUE WHERE id = $1 AND stock_reduced = FALSE",
    )
    .bind(id.get())
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?
    .rows_affected()
        == 1;

    if !claimed {
        debug!(order_id = %id, "Stock already reduced for order");
        return Ok(false);
    }

    sqlx::query(
        "UPDATE products p SET stock_quantity = p.stock_quantity - oi.quantity
         FROM (SELECT product_id, SUM(quantity) AS quantity
               FROM order_items WHERE order_id = $1 GROUP BY product_id) oi
         WHERE p.id = oi.product_id AND p.stock_quantity IS NOT NULL",
    )
    .bind(id.get())
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    Ok(true)
}

async fn clear_cart(conn: &mut PgConnection, session_id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
        .bind(session_id)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;
    Ok(result.rows_affected())
}

#[async_trait]
impl Repository for OrderRepository {
    type Entity = Order;
    type Id = OrderId;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DatabaseError> {
        self.load(id).await
    }

    async fn upsert(&self, entity: &Order) -> Result<(), DatabaseError> {
        self.store(entity).await
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn get(&self, id: OrderId) -> AppResult<Option<Order>> {
        Ok(self.find_by_id(id).await?)
    }

    async fn save(&self, order: &Order) -> AppResult<()> {
        Ok(self.upsert(order).await?)
    }

    async fn set_transaction_id(&self, id: OrderId, transaction_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE orders SET transaction_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.get())
            .bind(transaction_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn set_metadata(&self, id: OrderId, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        upsert_meta(&mut conn, id, key, value).await?;
        Ok(())
    }

    async fn add_note(&self, id: OrderId, text: &str, customer_visible: bool) -> AppResult<()> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        insert_note(&mut conn, id, text, customer_visible).await?;
        Ok(())
    }

    async fn reduce_stock(&self, id: OrderId) -> AppResult<()> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;
        debit_stock(tx.conn()?, id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn empty_cart(&self, session_id: &str) -> AppResult<()> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        clear_cart(&mut conn, session_id).await?;
        Ok(())
    }

    async fn apply_transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        transition: &Transition,
    ) -> AppResult<bool> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;
        let conn = tx.conn()?;

        let updated: Option<(Option<String>,)> = sqlx::query_as(
            "UPDATE orders SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING session_id",
        )
        .bind(id.get())
        .bind(expected.as_str())
        .bind(transition.to.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some((session_id,)) = updated else {
            tx.rollback().await?;
            debug!(order_id = %id, expected = %expected, "Order status changed underneath, transition skipped");
            return Ok(false);
        };

        for note in &transition.notes {
            insert_note(&mut *conn, id, &note.text, note.customer_visible).await?;
        }

        if transition.reduce_stock {
            debit_stock(&mut *conn, id).await?;
        }

        if transition.empty_cart {
            if let Some(session_id) = &session_id {
                clear_cart(&mut *conn, session_id).await?;
            }
        }

        tx.commit().await?;
        info!(order_id = %id, from = %expected, to = %transition.to, "Order transition committed");
        Ok(true)
    }
}
