//! Request extractors whose rejections use the API error envelope.
//!
//! axum's stock `Json`, `Path` and `Query` reject with plain-text bodies;
//! these wrappers translate the rejection into an [`ApiError`].

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use super::error::{ApiError, ErrorCode};

/// JSON request body. Malformed or mistyped bodies are validation errors.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected a JSON body with Content-Type: application/json")
        }
        other => ApiError::bad_request(other.body_text()),
    }
}

/// Typed path parameters. Values that do not parse (e.g. `/products/abc`)
/// are reported as invalid text.
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Path(value)) => Ok(ApiPath(value)),
            Err(PathRejection::FailedToDeserializePathParams(err)) => Err(ApiError::new(
                ErrorCode::InvalidText,
                format!("Invalid path parameter: {}", err.body_text()),
            )),
            Err(other) => {
                tracing::error!(error = %other.body_text(), "Path extraction failed");
                Err(ApiError::internal("Failed to read path parameters"))
            }
        }
    }
}

/// Typed query string
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(ApiQuery(value)),
            Err(QueryRejection::FailedToDeserializeQueryString(err)) => {
                Err(ApiError::bad_request(err.body_text()))
            }
            Err(other) => Err(ApiError::bad_request(other.body_text())),
        }
    }
}

/// Parse a path id into a positive integer
pub fn positive_id(raw: i64, field: &str) -> Result<i64, ApiError> {
    if raw < 1 {
        return Err(ApiError::new(
            ErrorCode::InvalidText,
            format!("{} must be a positive integer", field),
        ));
    }
    Ok(raw)
}
