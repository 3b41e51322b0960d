pub mod auth;
mod customers;
pub mod error;
pub mod extract;
pub mod guard;
pub mod metrics;
mod orders;
mod products;
pub mod rate_limit;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::AppState;
use guard::{access_guard, Guard, ADMIN, ADMIN_OR_SELF};

/// The complete application: routes, middleware and trailing-slash
/// normalisation. Serve it with `ServiceExt::<Request>::into_make_service`.
pub fn build_app(state: Arc<AppState>) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login and signup (public, tighter rate limit)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/login/signup", post(auth::signup))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/products", get(products::list_products))
        .route("/products/:id", get(products::get_product));

    let admin_routes = Router::new()
        // Catalog
        .route("/products", post(products::create_product))
        .route(
            "/products/:id",
            patch(products::update_product).delete(products::delete_product),
        )
        // Customers
        .route("/customers", get(customers::list_customers))
        // Orders
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order)
                .patch(orders::pay_order)
                .delete(orders::delete_order),
        )
        .route_layer(middleware::from_fn_with_state(
            Guard::new(state.tokens.clone(), ADMIN),
            access_guard,
        ));

    let self_service_routes = Router::new()
        .route(
            "/customers/:id",
            get(customers::get_customer)
                .patch(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route_layer(middleware::from_fn_with_state(
            Guard::new(state.tokens.clone(), ADMIN_OR_SELF),
            access_guard,
        ));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(self_service_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ))
        .merge(auth_routes);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api", api_routes)
        .fallback(error::route_not_found)
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors))
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

async fn health_check() -> &'static str {
    "OK"
}
