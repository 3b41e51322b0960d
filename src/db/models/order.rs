//! Order models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

/// Order as returned by the API, with the referenced customer and product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub amount: i64,
    pub paid: bool,
    pub created_at: String,
    pub customer: CustomerSummary,
    pub product: ProductSummary,
}

/// Flat row produced by the order/customer/product join
#[derive(Debug, Clone, FromRow)]
pub struct OrderViewRow {
    pub id: i64,
    pub amount: i64,
    pub paid: bool,
    pub created_at: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub product_id: i64,
    pub product_name: String,
    pub product_price: i64,
}

impl From<OrderViewRow> for OrderView {
    fn from(row: OrderViewRow) -> Self {
        Self {
            id: row.id,
            amount: row.amount,
            paid: row.paid,
            created_at: row.created_at,
            customer: CustomerSummary {
                id: row.customer_id,
                name: row.customer_name,
                email: row.customer_email,
            },
            product: ProductSummary {
                id: row.product_id,
                name: row.product_name,
                price: row.product_price,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: i64,
    pub amount: i64,
    pub customer_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub paid: Option<bool>,
}
