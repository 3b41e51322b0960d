//! Access guard: bearer-token verification plus role and ownership checks.
//!
//! Mounted with `route_layer`, so it runs after routing (path parameters are
//! known) and before any handler extractor touches the request body.

use axum::{
    extract::{RawPathParams, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::error::ApiError;
use crate::crypto::{SessionClaims, TokenError, TokenSigner};
use crate::db::Role;

/// Only administrators
pub const ADMIN: &[Role] = &[Role::Admin];

/// Administrators, or a user acting on their own `:id`
pub const ADMIN_OR_SELF: &[Role] = &[Role::Admin, Role::User];

/// Authenticated caller, inserted into request extensions by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Guard configuration for one group of routes
#[derive(Clone)]
pub struct Guard {
    tokens: TokenSigner,
    roles: &'static [Role],
}

impl Guard {
    pub fn new(tokens: TokenSigner, roles: &'static [Role]) -> Self {
        Self { tokens, roles }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::authentication("Missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::authentication("Malformed authorization header"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| ApiError::authentication("Malformed authorization header"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::authentication("Authorization scheme must be Bearer"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::authentication("Missing bearer token"));
    }

    Ok(token)
}

/// Apply the role and ownership rules to verified claims.
///
/// `path_id` is the raw `:id` segment of the matched route, if it has one.
pub fn authorize(
    claims: &SessionClaims,
    roles: &[Role],
    path_id: Option<&str>,
) -> Result<Identity, ApiError> {
    let identity = Identity {
        id: claims.customer_id,
        role: claims.role,
    };

    if !roles.contains(&identity.role) {
        return Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ));
    }

    if identity.role == Role::User && roles.contains(&Role::User) {
        if let Some(raw) = path_id {
            let owns = raw
                .parse::<i64>()
                .map(|id| id == identity.id)
                .unwrap_or(false);
            if !owns {
                return Err(ApiError::forbidden(
                    "You can only access your own account",
                ));
            }
        }
    }

    Ok(identity)
}

/// Middleware entry point, see [`Guard`]
pub async fn access_guard(
    State(guard): State<Guard>,
    params: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;

    let claims = guard.tokens.verify(token).map_err(|e| match e {
        TokenError::Expired => ApiError::authentication("Session token has expired"),
        other => {
            tracing::debug!(error = %other, "Rejected session token");
            ApiError::authentication("Invalid session token")
        }
    })?;

    let path_id = params
        .as_ref()
        .and_then(|p| p.iter().find(|(key, _)| *key == "id").map(|(_, value)| value));

    let identity = authorize(&claims, guard.roles, path_id).map_err(|e| {
        tracing::info!(
            customer_id = claims.customer_id,
            role = %claims.role,
            path = %request.uri().path(),
            "Access denied"
        );
        e
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
