use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{positive_id, ApiJson, ApiPath};
use super::guard::Identity;
use super::validation::{
    normalize_email, validate_customer_name, validate_email, validate_password, validate_role,
};
use crate::db::{CustomerContact, CustomerResponse, UpdateCustomerRequest};
use crate::AppState;

/// GET /api/customers (admin)
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CustomerResponse>>, ApiError> {
    let customers = sqlx::query_as::<_, CustomerResponse>(
        "SELECT id, name, email, role FROM customers ORDER BY id ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(customers))
}

/// GET /api/customers/:id (admin or self)
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<CustomerContact>, ApiError> {
    let id = positive_id(id, "id")?;

    let contact = sqlx::query_as::<_, CustomerContact>(
        "SELECT name, email FROM customers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    Ok(Json(contact))
}

/// PATCH /api/customers/:id (admin or self)
///
/// Only administrators may change a role.
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = positive_id(id, "id")?;

    if request.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    if request.role.is_some() && !identity.is_admin() {
        return Err(ApiError::forbidden("Only administrators can change roles"));
    }

    let name = request.name.as_deref().map(|n| n.trim().to_string());
    let email = request.email.as_deref().map(normalize_email);
    let password = request.password.as_deref().map(|p| p.trim().to_string());

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &name {
        errors.check("name", validate_customer_name(name));
    }
    if let Some(email) = &email {
        errors.check("email", validate_email(email));
    }
    if let Some(password) = &password {
        errors.check("password", validate_password(password));
    }
    let role = match request.role.as_deref().map(validate_role) {
        Some(Ok(role)) => Some(role.as_str()),
        Some(Err(message)) => {
            errors.add("role", message);
            None
        }
        None => None,
    };
    errors.finish()?;

    let password_hash = match password {
        Some(password) => Some(state.hasher.hash(password).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to hash password");
            ApiError::internal("Failed to update password")
        })?),
        None => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE customers SET
            name = COALESCE(?, name),
            email = COALESCE(?, email),
            password_hash = COALESCE(?, password_hash),
            role = COALESCE(?, role)
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .bind(id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Customer not found"));
    }

    let customer = sqlx::query_as::<_, CustomerResponse>(
        "SELECT id, name, email, role FROM customers WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(customer_id = id, updated_by = identity.id, "Customer updated");

    Ok(Json(customer))
}

/// DELETE /api/customers/:id (admin or self)
///
/// Customers with orders cannot be removed.
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let id = positive_id(id, "id")?;

    let result = sqlx::query("DELETE FROM customers WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Customer not found"));
    }

    tracing::info!(customer_id = id, deleted_by = identity.id, "Customer deleted");

    Ok(StatusCode::NO_CONTENT)
}
