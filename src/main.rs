use anyhow::Result;
use axum::ServiceExt;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom::api::rate_limit::spawn_cleanup_task;
use stockroom::config::{Config, ConfigOverrides};
use stockroom::AppState;

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(author, version, about = "Customer, catalog and order API", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "stockroom.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Override listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Override database URL (e.g. sqlite:./data/stockroom.db)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRES_SECS")]
    token_expiry_secs: Option<i64>,

    /// Argon2 iteration count
    #[arg(long, env = "PASSWORD_HASH_COST")]
    password_hash_cost: Option<u32>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            database_url: self.database_url.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_expiry_secs: self.token_expiry_secs,
            password_hash_cost: self.password_hash_cost,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?.apply_overrides(cli.overrides());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stockroom v{}", env!("CARGO_PKG_VERSION"));

    let config = config.finalize()?;

    let db = stockroom::db::init(&config.database).await?;

    let metrics_handle = stockroom::api::metrics::init_metrics()?;
    let state = AppState::new(config.clone(), db.clone())?.with_metrics(metrics_handle);

    stockroom::api::auth::ensure_admin_user(
        &db,
        &state.hasher,
        config.auth.admin_email.as_deref(),
        config.auth.admin_password.as_deref(),
        &config.auth.admin_name,
    )
    .await?;

    let state = Arc::new(state);

    if config.rate_limit.enabled {
        spawn_cleanup_task(state.rate_limiter.clone(), config.rate_limit.cleanup_interval);
    }

    let app = stockroom::api::build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        ServiceExt::<axum::extract::Request>::into_make_service_with_connect_info::<SocketAddr>(
            app,
        ),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
