use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{positive_id, ApiJson, ApiPath, ApiQuery};
use super::guard::Identity;
use super::validation::validate_positive;
use crate::db::{CreateOrderRequest, ListOrdersQuery, OrderView};
use crate::engine::NewOrder;
use crate::AppState;

/// GET /api/orders?paid=true|false (admin)
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListOrdersQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    Ok(Json(state.orders.list_orders(query.paid).await?))
}

/// GET /api/orders/:id (admin)
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<OrderView>, ApiError> {
    let id = positive_id(id, "id")?;
    Ok(Json(state.orders.get_order(id).await?))
}

/// POST /api/orders (admin)
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("product_id", validate_positive(request.product_id, "product_id"));
    errors.check("customer_id", validate_positive(request.customer_id, "customer_id"));
    errors.check("amount", validate_positive(request.amount, "amount"));
    errors.finish()?;

    tracing::debug!(placed_by = identity.id, "Placing order");

    let view = state
        .orders
        .place_order(NewOrder {
            product_id: request.product_id,
            customer_id: request.customer_id,
            amount: request.amount,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// PATCH /api/orders/:id (admin), marks the order paid
pub async fn pay_order(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<OrderView>, ApiError> {
    let id = positive_id(id, "id")?;
    Ok(Json(state.orders.mark_paid(id).await?))
}

/// DELETE /api/orders/:id (admin)
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let id = positive_id(id, "id")?;
    state.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
