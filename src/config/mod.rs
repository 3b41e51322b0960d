use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Minimum accepted length for the token signing secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite:./data/stockroom.db`
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a transaction waits on a locked database before failing
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/stockroom.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Empty means "generate one at startup".
    #[serde(default)]
    pub jwt_secret: String,
    /// Session token lifetime in seconds (default: 12 hours)
    #[serde(default = "default_token_expiry_secs")]
    pub token_expiry_secs: i64,
    /// Argon2 iteration count (time cost)
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    /// Argon2 memory cost in KiB
    #[serde(default = "default_password_hash_memory_kib")]
    pub password_hash_memory_kib: u32,
    /// Admin account created at startup when no customer owns this email
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_secs: default_token_expiry_secs(),
            password_hash_cost: default_password_hash_cost(),
            password_hash_memory_kib: default_password_hash_memory_kib(),
            admin_email: None,
            admin_password: None,
            admin_name: default_admin_name(),
        }
    }
}

fn default_token_expiry_secs() -> i64 {
    12 * 60 * 60
}

fn default_password_hash_cost() -> u32 {
    2
}

fn default_password_hash_memory_kib() -> u32 {
    19 * 1024
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests per window for general API endpoints
    #[serde(default = "default_api_requests_per_window")]
    pub api_requests_per_window: u32,
    /// Requests per window for login and signup
    #[serde(default = "default_auth_requests_per_window")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Interval between sweeps of stale limiter entries, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients on `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address. Only enable behind a reverse proxy that sets these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            api_requests_per_window: default_api_requests_per_window(),
            auth_requests_per_window: default_auth_requests_per_window(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy_headers: false,
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_api_requests_per_window() -> u32 {
    300
}

fn default_auth_requests_per_window() -> u32 {
    20
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Allowed browser origins; `"*"` allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through the environment.
/// Anything set here wins over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_expiry_secs: Option<i64>,
    pub password_hash_cost: Option<u32>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(secret) = overrides.jwt_secret {
            self.auth.jwt_secret = secret;
        }
        if let Some(expiry) = overrides.token_expiry_secs {
            self.auth.token_expiry_secs = expiry;
        }
        if let Some(cost) = overrides.password_hash_cost {
            self.auth.password_hash_cost = cost;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self
    }

    /// Check settings that cannot be fixed up silently, and fill in a
    /// throwaway signing secret when none was configured.
    pub fn finalize(mut self) -> Result<Self> {
        if self.auth.jwt_secret.is_empty() {
            warn!("No JWT secret configured; generating an ephemeral one (sessions will not survive a restart)");
            self.auth.jwt_secret = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
        } else if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT secret must be at least {} bytes long", MIN_JWT_SECRET_LEN);
        }

        if self.auth.token_expiry_secs <= 0 {
            bail!("Token expiry must be a positive number of seconds");
        }
        if self.auth.password_hash_cost == 0 {
            bail!("Password hash cost must be at least 1");
        }
        if self.database.max_connections == 0 {
            bail!("Database pool needs at least one connection");
        }

        Ok(self)
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_expiry_secs, 43_200);
        assert!(config.auth.jwt_secret.is_empty());
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8081

            [auth]
            password_hash_cost = 3

            [rate_limit]
            trust_proxy_headers = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.password_hash_cost, 3);
        assert_eq!(config.auth.token_expiry_secs, 43_200);
        assert!(config.rate_limit.trust_proxy_headers);
        assert!(!Config::default().rate_limit.trust_proxy_headers);
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::default().apply_overrides(ConfigOverrides {
            port: Some(9000),
            database_url: Some("sqlite::memory:".to_string()),
            token_expiry_secs: Some(60),
            ..Default::default()
        });

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.auth.token_expiry_secs, 60);
    }

    #[test]
    fn test_finalize_generates_secret() {
        let config = Config::default().finalize().unwrap();
        assert!(config.auth.jwt_secret.len() >= MIN_JWT_SECRET_LEN);
    }

    #[test]
    fn test_finalize_rejects_short_secret() {
        let mut config = Config::default();
        config.auth.jwt_secret = "too-short".to_string();
        assert!(config.finalize().is_err());
    }
}
