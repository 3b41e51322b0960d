use chrono::{SecondsFormat, Utc};
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::metrics::{record_order_placed, record_order_rejected};
use crate::db::{OrderView, OrderViewRow};
use crate::DbPool;

const ORDER_VIEW_SELECT: &str = r#"
    SELECT o.id, o.amount, o.paid, o.created_at,
           c.id AS customer_id, c.name AS customer_name, c.email AS customer_email,
           p.id AS product_id, p.name AS product_name, p.price AS product_price
    FROM orders o
    JOIN customers c ON c.id = o.customer_id
    JOIN products p ON p.id = o.product_id
"#;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("order amount must be a positive integer, got {0}")]
    InvalidAmount(i64),

    #[error("product {0} not found")]
    ProductNotFound(i64),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("customer {0} does not exist")]
    UnknownCustomer(i64),

    #[error("order {0} not found")]
    OrderNotFound(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl OrderError {
    /// Short label used for the rejection metric
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::InvalidAmount(_) => "invalid_amount",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::UnknownCustomer(_) => "unknown_customer",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::Database(_) => "database",
        }
    }
}

/// A validated request to buy `amount` units of a product
#[derive(Debug, Clone, Copy)]
pub struct NewOrder {
    pub product_id: i64,
    pub customer_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct OrderEngine {
    db: DbPool,
}

impl OrderEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Decrement stock and record an unpaid order, atomically.
    ///
    /// Either both writes commit or neither does. Returns the committed order
    /// as it now reads from the store.
    pub async fn place_order(&self, order: NewOrder) -> Result<OrderView, OrderError> {
        match self.try_place_order(order).await {
            Ok(view) => {
                record_order_placed();
                info!(
                    order_id = view.id,
                    product_id = order.product_id,
                    customer_id = order.customer_id,
                    amount = order.amount,
                    "Order placed"
                );
                Ok(view)
            }
            Err(e) => {
                record_order_rejected(e.reason());
                match &e {
                    OrderError::InsufficientStock { .. } => warn!(error = %e, "Order rejected"),
                    OrderError::Database(_) => tracing::error!(error = %e, "Order placement failed"),
                    _ => info!(error = %e, "Order rejected"),
                }
                Err(e)
            }
        }
    }

    async fn try_place_order(&self, order: NewOrder) -> Result<OrderView, OrderError> {
        if order.amount < 1 {
            return Err(OrderError::InvalidAmount(order.amount));
        }

        // Dropping `tx` on any early return rolls the transaction back.
        let mut tx = self.db.begin().await?;

        // Write first: the conditional decrement takes the write lock before
        // anything is read, and only succeeds while enough stock remains.
        let updated = sqlx::query("UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?")
            .bind(order.amount)
            .bind(order.product_id)
            .bind(order.amount)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
                    .bind(order.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match available {
                None => OrderError::ProductNotFound(order.product_id),
                Some(available) => OrderError::InsufficientStock {
                    product_id: order.product_id,
                    requested: order.amount,
                    available,
                },
            });
        }

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let inserted = sqlx::query(
            "INSERT INTO orders (product_id, customer_id, amount, paid, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(order.product_id)
        .bind(order.customer_id)
        .bind(order.amount)
        .bind(&created_at)
        .execute(&mut *tx)
        .await;

        let order_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), ErrorKind::ForeignKeyViolation) =>
            {
                return Err(OrderError::UnknownCustomer(order.customer_id));
            }
            Err(e) => return Err(e.into()),
        };

        let row: OrderViewRow = sqlx::query_as(&format!("{} WHERE o.id = ?", ORDER_VIEW_SELECT))
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    pub async fn get_order(&self, id: i64) -> Result<OrderView, OrderError> {
        let row: Option<OrderViewRow> =
            sqlx::query_as(&format!("{} WHERE o.id = ?", ORDER_VIEW_SELECT))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        row.map(OrderView::from).ok_or(OrderError::OrderNotFound(id))
    }

    /// All orders by ascending id, optionally only paid or only unpaid ones
    pub async fn list_orders(&self, paid: Option<bool>) -> Result<Vec<OrderView>, OrderError> {
        let rows: Vec<OrderViewRow> = match paid {
            Some(paid) => {
                sqlx::query_as(&format!(
                    "{} WHERE o.paid = ? ORDER BY o.id ASC",
                    ORDER_VIEW_SELECT
                ))
                .bind(paid)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as(&format!("{} ORDER BY o.id ASC", ORDER_VIEW_SELECT))
                    .fetch_all(&self.db)
                    .await?
            }
        };

        Ok(rows.into_iter().map(OrderView::from).collect())
    }

    /// Mark an order as paid. Paying an already paid order is a no-op.
    pub async fn mark_paid(&self, id: i64) -> Result<OrderView, OrderError> {
        let result = sqlx::query("UPDATE orders SET paid = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::OrderNotFound(id));
        }

        info!(order_id = id, "Order marked paid");
        self.get_order(id).await
    }

    /// Remove an order. Stock is not restored.
    pub async fn delete_order(&self, id: i64) -> Result<(), OrderError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::OrderNotFound(id));
        }

        info!(order_id = id, "Order deleted");
        Ok(())
    }
}
