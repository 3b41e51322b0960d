pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod engine;

pub use db::DbPool;

use anyhow::Result;
use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::crypto::{CredentialHasher, TokenSigner};
use crate::engine::OrderEngine;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub orders: OrderEngine,
    pub tokens: TokenSigner,
    pub hasher: CredentialHasher,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the shared state. `config` must already be finalized.
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let tokens = TokenSigner::new(&config.auth.jwt_secret, config.auth.token_expiry_secs);
        let hasher = CredentialHasher::from_config(&config.auth)?;
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Ok(Self {
            orders: OrderEngine::new(db.clone()),
            config,
            db,
            tokens,
            hasher,
            rate_limiter,
            metrics_handle: None,
        })
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
