use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{positive_id, ApiJson, ApiPath};
use super::validation::{validate_positive, validate_product_name};
use crate::db::{CreateProductRequest, Product, UpdateProductRequest};
use crate::AppState;

/// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT id, name, price, stock FROM products ORDER BY id ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Product>, ApiError> {
    let id = positive_id(id, "id")?;
    Ok(Json(fetch_product(&state, id).await?))
}

async fn fetch_product(state: &AppState, id: i64) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>("SELECT id, name, price, stock FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// POST /api/products (admin)
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let name = request.name.trim().to_string();

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_product_name(&name));
    errors.check("price", validate_positive(request.price, "price"));
    errors.check("stock", validate_positive(request.stock, "stock"));
    errors.finish()?;

    let id = sqlx::query("INSERT INTO products (name, price, stock) VALUES (?, ?, ?)")
        .bind(&name)
        .bind(request.price)
        .bind(request.stock)
        .execute(&state.db)
        .await?
        .last_insert_rowid();

    tracing::info!(product_id = id, %name, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(Product {
            id,
            name,
            price: request.price,
            stock: request.stock,
        }),
    ))
}

/// PATCH /api/products/:id (admin)
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let id = positive_id(id, "id")?;

    if request.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let name = request.name.as_deref().map(|n| n.trim().to_string());

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &name {
        errors.check("name", validate_product_name(name));
    }
    if let Some(price) = request.price {
        errors.check("price", validate_positive(price, "price"));
    }
    if let Some(stock) = request.stock {
        errors.check("stock", validate_positive(stock, "stock"));
    }
    errors.finish()?;

    let result = sqlx::query(
        r#"
        UPDATE products SET
            name = COALESCE(?, name),
            price = COALESCE(?, price),
            stock = COALESCE(?, stock)
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(request.price)
    .bind(request.stock)
    .bind(id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = id, "Product updated");

    Ok(Json(fetch_product(&state, id).await?))
}

/// DELETE /api/products/:id (admin)
///
/// Products referenced by orders cannot be removed.
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let id = positive_id(id, "id")?;

    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}
