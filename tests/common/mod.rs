//! Shared harness for the HTTP-level tests.
//!
//! Each `TestApp` owns a fresh SQLite file in a temporary directory and drives
//! the real router in-process with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use stockroom::config::Config;
use stockroom::db::Role;
use stockroom::AppState;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const DEFAULT_PASSWORD: &str = "password123";

pub struct TestApp {
    pub state: Arc<AppState>,
    _dir: TempDir,
}

/// Status, headers and parsed JSON body of a response (`Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `error.code` of an error envelope
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.url = format!("sqlite:{}", dir.path().join("stockroom.db").display());
    config.database.max_connections = 5;
    config.database.busy_timeout_secs = 10;
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.auth.password_hash_cost = 1;
    config.auth.password_hash_memory_kib = 8;
    config.rate_limit.enabled = false;
    config
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Start from the test configuration and let the caller adjust it
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        adjust(&mut config);
        let config = config.finalize().unwrap();

        let db = stockroom::db::init(&config.database).await.unwrap();
        let state = Arc::new(AppState::new(config, db).unwrap());

        Self { state, _dir: dir }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let app = stockroom::api::build_app(self.state.clone());
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// POST a JSON body as if it arrived on a connection from `peer`
    pub async fn post_from(
        &self,
        peer: &str,
        uri: &str,
        forwarded_for: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(Body::from(body.to_string())).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Insert a customer directly and return its id
    pub async fn create_customer(&self, name: &str, email: &str, password: &str, role: Role) -> i64 {
        let hash = self.state.hasher.hash(password.to_string()).await.unwrap();
        sqlx::query("INSERT INTO customers (name, email, password_hash, role) VALUES (?, ?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(hash)
            .bind(role.as_str())
            .execute(&self.state.db)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub fn token_for(&self, id: i64, role: Role) -> String {
        self.state.tokens.issue(id, role).unwrap()
    }

    /// A fresh administrator and a token for it
    pub async fn admin(&self) -> (i64, String) {
        let id = self
            .create_customer("Admin", "admin@example.com", DEFAULT_PASSWORD, Role::Admin)
            .await;
        (id, self.token_for(id, Role::Admin))
    }

    /// A fresh regular user and a token for it
    pub async fn user(&self, email: &str) -> (i64, String) {
        let id = self
            .create_customer("User", email, DEFAULT_PASSWORD, Role::User)
            .await;
        (id, self.token_for(id, Role::User))
    }

    pub async fn create_product(&self, name: &str, price: i64, stock: i64) -> i64 {
        sqlx::query("INSERT INTO products (name, price, stock) VALUES (?, ?, ?)")
            .bind(name)
            .bind(price)
            .bind(stock)
            .execute(&self.state.db)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn stock_of(&self, product_id: i64) -> i64 {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }

    pub async fn order_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }
}
