//! Unified API error handling.
//!
//! Every failure leaves the service as an [`ApiError`] and is rendered as
//! `{"error": {"message", "code", "details"?}}` with the status that belongs
//! to its code. Datastore failures are classified here and never echoed back
//! verbatim.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (4xx)
    ValidationError,
    AuthenticationError,
    /// Failed login; deliberately the same for unknown email and bad password
    Unauthorized,
    AuthorizationError,
    NotFound,
    DuplicateKey,
    InsufficientStock,
    FkViolation,
    CheckViolation,
    NotNull,
    InvalidText,
    TooManyRequests,

    // Server errors (5xx)
    InternalError,
    DbError,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::AuthenticationError => StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::AuthorizationError => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::DuplicateKey => StatusCode::CONFLICT,
            ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::FkViolation => StatusCode::CONFLICT,
            ErrorCode::CheckViolation => StatusCode::BAD_REQUEST,
            ErrorCode::NotNull => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidText => StatusCode::BAD_REQUEST,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DbError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::AuthorizationError => "AUTHORIZATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::DuplicateKey => "DUPLICATE_KEY",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::FkViolation => "FK_VIOLATION",
            ErrorCode::CheckViolation => "CHECK_VIOLATION",
            ErrorCode::NotNull => "NOT_NULL",
            ErrorCode::InvalidText => "INVALID_TEXT",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::DbError => "DB_ERROR",
        }
    }
}

/// The inner error object in the response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional diagnostic context (e.g. available stock)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    /// Field-level validation errors
    ValidationErrors(HashMap<String, Vec<String>>),
    /// Generic key-value details
    Generic(HashMap<String, serde_json::Value>),
}

/// The full error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
    details: Option<ErrorDetails>,
    /// Seconds the client should wait, only set for rate limiting
    retry_after: Option<u64>,
}

impl ApiError {
    /// Create a new API error with a specific code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        self.details.as_ref()
    }

    /// Add a single generic detail entry
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        match &mut self.details {
            Some(ErrorDetails::Generic(map)) => {
                map.insert(key.to_string(), value.into());
            }
            _ => {
                let mut map = HashMap::new();
                map.insert(key.to_string(), value.into());
                self.details = Some(ErrorDetails::Generic(map));
            }
        }
        self
    }

    /// Add validation errors as details
    pub fn with_validation_errors(mut self, errors: HashMap<String, Vec<String>>) -> Self {
        self.details = Some(ErrorDetails::ValidationErrors(errors));
        self
    }

    // -------------------------------------------------------------------------
    // Convenience constructors for common error types
    // -------------------------------------------------------------------------

    /// Missing, malformed or expired session token (401)
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationError, message)
    }

    /// Login rejected (401)
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::Unauthorized, "Invalid email or password")
    }

    /// Valid token, insufficient privilege or not the owner (403)
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthorizationError, message)
    }

    /// Not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Not enough stock to cover an order (409)
    pub fn insufficient_stock(product_id: i64, requested: i64, available: i64) -> Self {
        Self::new(ErrorCode::InsufficientStock, "Insufficient stock for this order")
            .with_detail("product_id", product_id)
            .with_detail("requested", requested)
            .with_detail("available", available)
    }

    /// Validation error (400) with field-level details
    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self::new(ErrorCode::ValidationError, message).with_validation_errors(errors)
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::validation(errors)
    }

    /// Validation error not tied to a single field
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Internal server error (500)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error (500)
    pub fn database() -> Self {
        Self::new(ErrorCode::DbError, "A database error occurred")
    }

    /// Too many requests error (429)
    pub fn rate_limited(retry_after: u64) -> Self {
        let mut err = Self::new(
            ErrorCode::TooManyRequests,
            format!("Rate limit exceeded. Try again in {} seconds.", retry_after),
        );
        err.retry_after = Some(retry_after);
        err
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: ErrorBody {
                message: self.message,
                code: self.code.as_str().to_string(),
                details: self.details,
            },
        };

        let mut res = (self.status, Json(response)).into_response();
        if let Some(secs) = self.retry_after {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        res
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Datastore error translation
// -------------------------------------------------------------------------

/// Pull the constraint name out of a SQLite message such as
/// `UNIQUE constraint failed: customers.email`.
fn constraint_name(db_err: &dyn sqlx::error::DatabaseError) -> Option<String> {
    if let Some(name) = db_err.constraint() {
        return Some(name.to_string());
    }
    db_err
        .message()
        .split_once(": ")
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) => {
                tracing::warn!(error = %db_err, "Database constraint or engine error");
                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        let err = ApiError::new(ErrorCode::DuplicateKey, "Duplicate resource");
                        match constraint_name(&**db_err) {
                            Some(name) => err.with_detail("constraint", name),
                            None => err,
                        }
                    }
                    ErrorKind::ForeignKeyViolation => ApiError::new(
                        ErrorCode::FkViolation,
                        "Operation conflicts with related records",
                    ),
                    ErrorKind::NotNullViolation => {
                        ApiError::new(ErrorCode::NotNull, "Required field is missing")
                    }
                    ErrorKind::CheckViolation => {
                        ApiError::new(ErrorCode::CheckViolation, "Data constraint violated")
                    }
                    _ => ApiError::database(),
                }
            }
            _ => {
                tracing::error!(error = %err, "Database error");
                ApiError::database()
            }
        }
    }
}

impl From<crate::engine::OrderError> for ApiError {
    fn from(err: crate::engine::OrderError) -> Self {
        use crate::engine::OrderError;

        match err {
            OrderError::InvalidAmount(_) => {
                ApiError::validation_field("amount", "amount must be a positive integer")
            }
            OrderError::ProductNotFound(id) => {
                ApiError::not_found("Product not found").with_detail("product_id", id)
            }
            OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            } => ApiError::insufficient_stock(product_id, requested, available),
            OrderError::UnknownCustomer(id) => {
                ApiError::new(ErrorCode::FkViolation, "Customer does not exist")
                    .with_detail("customer_id", id)
            }
            OrderError::OrderNotFound(_) => ApiError::not_found("Order not found"),
            OrderError::Database(e) => e.into(),
        }
    }
}

// -------------------------------------------------------------------------
// Builder for validation errors (integrates with existing validation module)
// -------------------------------------------------------------------------

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    /// Create a new validation error builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error of a field validator, if any
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Build the ApiError if there are any errors
    pub fn build(self) -> Option<ApiError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ApiError::validation(self.errors))
        }
    }

    /// Return Ok(()) if no errors, or Err(ApiError) if there are errors
    pub fn finish(self) -> Result<(), ApiError> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Fallback for any path that matches no route
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AuthenticationError.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::AuthorizationError.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::DuplicateKey.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InsufficientStock.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::FkViolation.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::CheckViolation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotNull.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidText.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::DbError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_code_serializes_like_as_str() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::InsufficientStock,
            ErrorCode::FkViolation,
            ErrorCode::DbError,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, code.as_str());
        }
    }

    #[test]
    fn test_validation_error_single_field() {
        let err = ApiError::validation_field("name", "Name is required");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("Name is required"));
    }

    #[test]
    fn test_validation_error_builder() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("name", "Name is required");
        builder.check("email", Err("Invalid email format".to_string()));
        builder.check("password", Ok(()));
        builder.add("name", "Name is too short");

        let err = builder.build().unwrap();
        assert_eq!(err.code, ErrorCode::ValidationError);

        if let Some(ErrorDetails::ValidationErrors(errors)) = &err.details {
            assert_eq!(errors.get("name").unwrap().len(), 2);
            assert_eq!(errors.get("email").unwrap().len(), 1);
            assert!(!errors.contains_key("password"));
        } else {
            panic!("Expected ValidationErrors details");
        }
    }

    #[test]
    fn test_insufficient_stock_details() {
        let err = ApiError::insufficient_stock(4, 999, 4);
        assert_eq!(err.status, StatusCode::CONFLICT);
        match err.details {
            Some(ErrorDetails::Generic(map)) => {
                assert_eq!(map["available"], 4);
                assert_eq!(map["requested"], 999);
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_pool_errors_do_not_leak() {
        let err = ApiError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code, ErrorCode::DbError);
        assert_eq!(err.message, "A database error occurred");
    }

    #[test]
    fn test_order_errors_translate() {
        use crate::engine::OrderError;

        let err = ApiError::from(OrderError::InsufficientStock {
            product_id: 1,
            requested: 5,
            available: 2,
        });
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        let err = ApiError::from(OrderError::UnknownCustomer(42));
        assert_eq!(err.code, ErrorCode::FkViolation);
        match err.details {
            Some(ErrorDetails::Generic(map)) => assert_eq!(map["customer_id"], 42),
            other => panic!("unexpected details: {:?}", other),
        }

        assert_eq!(
            ApiError::from(OrderError::ProductNotFound(3)).code,
            ErrorCode::NotFound
        );
        assert_eq!(
            ApiError::from(OrderError::OrderNotFound(3)).code,
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let response = ApiError::not_found("Route not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Route not found");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(12).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
    }
}
