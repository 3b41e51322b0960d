use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::validation::{
    normalize_email, validate_customer_name, validate_email, validate_password, validate_role,
};
use crate::crypto::CredentialHasher;
use crate::db::{Customer, CustomerResponse, LoginRequest, LoginResponse, Role, SignupRequest};
use crate::{AppState, DbPool};

/// POST /api/login/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    let password = request.password.trim().to_string();

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_customer_name(&name));
    errors.check("email", validate_email(&email));
    errors.check("password", validate_password(&password));

    let role = match request.role.as_deref() {
        None => Role::User,
        Some(raw) => match validate_role(raw) {
            Ok(role) => role,
            Err(message) => {
                errors.add("role", message);
                Role::User
            }
        },
    };
    errors.finish()?;

    let password_hash = state.hasher.hash(password).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create account")
    })?;

    let id = sqlx::query(
        "INSERT INTO customers (name, email, password_hash, role) VALUES (?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(role.as_str())
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    tracing::info!(customer_id = id, %role, "Customer signed up");

    Ok((
        StatusCode::CREATED,
        Json(CustomerResponse {
            id,
            name,
            email,
            role: role.as_str().to_string(),
        }),
    ))
}

/// POST /api/login
///
/// Unknown email and wrong password fail identically.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&request.email);
    let password = request.password.trim().to_string();

    let customer: Option<Customer> = sqlx::query_as("SELECT * FROM customers WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let customer = match customer {
        Some(customer) => customer,
        None => {
            state.hasher.verify_dummy(password).await.map_err(hash_failure)?;
            return Err(ApiError::invalid_credentials());
        }
    };

    let verified = state
        .hasher
        .verify(password, customer.password_hash.clone())
        .await
        .map_err(hash_failure)?;
    if !verified {
        tracing::info!(customer_id = customer.id, "Login rejected");
        return Err(ApiError::invalid_credentials());
    }

    let token = state
        .tokens
        .issue(customer.id, customer.role_enum())
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to issue session token");
            ApiError::internal("Failed to issue session token")
        })?;

    tracing::info!(customer_id = customer.id, "Customer logged in");

    Ok(Json(LoginResponse {
        token,
        user: CustomerResponse::from(customer),
    }))
}

fn hash_failure(e: crate::crypto::PasswordError) -> ApiError {
    tracing::error!(error = %e, "Password verification failed to run");
    ApiError::internal("Failed to verify credentials")
}

/// Create the configured bootstrap administrator if no customer has that email yet
pub async fn ensure_admin_user(
    db: &DbPool,
    hasher: &CredentialHasher,
    email: Option<&str>,
    password: Option<&str>,
    name: &str,
) -> anyhow::Result<()> {
    let (email, password) = match (email, password) {
        (Some(email), Some(password)) => (normalize_email(email), password.trim().to_string()),
        (None, None) => return Ok(()),
        _ => {
            tracing::warn!("Both admin_email and admin_password must be set to bootstrap an admin");
            return Ok(());
        }
    };

    validate_email(&email).map_err(|e| anyhow::anyhow!("admin_email: {}", e))?;
    validate_password(&password).map_err(|e| anyhow::anyhow!("admin_password: {}", e))?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE email = ?")
        .bind(&email)
        .fetch_optional(db)
        .await?;

    if exists.is_some() {
        tracing::debug!(%email, "Bootstrap admin already exists");
        return Ok(());
    }

    let password_hash = hasher.hash(password).await?;
    sqlx::query("INSERT INTO customers (name, email, password_hash, role) VALUES (?, ?, ?, 'admin')")
        .bind(name.trim())
        .bind(&email)
        .bind(&password_hash)
        .execute(db)
        .await?;

    tracing::info!(%email, "Created bootstrap admin");
    Ok(())
}
