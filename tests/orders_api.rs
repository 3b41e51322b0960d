//! Order placement over HTTP, including the stock invariant under contention.

mod common;

use axum::http::StatusCode;
use common::{TestApp, DEFAULT_PASSWORD};
use serde_json::json;
use std::sync::Arc;
use stockroom::db::Role;

#[tokio::test]
async fn test_widget_purchase_end_to_end() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.admin().await;

    // Customer signs up and logs in
    let res = app
        .post(
            "/api/login/signup",
            None,
            json!({"name": "Ana", "email": "ana@example.com", "password": "password123"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let customer_id = res.body["id"].as_i64().unwrap();

    let res = app
        .post(
            "/api/login",
            None,
            json!({"email": "ana@example.com", "password": "password123"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Admin stocks the catalog
    let res = app
        .post(
            "/api/products",
            Some(&admin_token),
            json!({"name": "Widget", "price": 15, "stock": 5}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let product_id = res.body["id"].as_i64().unwrap();

    // Admin places an order for the customer
    let res = app
        .post(
            "/api/orders",
            Some(&admin_token),
            json!({"product_id": product_id, "amount": 2, "customer_id": customer_id}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let order_id = res.body["id"].as_i64().unwrap();
    assert_eq!(res.body["amount"], 2);
    assert_eq!(res.body["paid"], false);
    assert!(res.body["created_at"].is_string());
    assert_eq!(
        res.body["customer"],
        json!({"id": customer_id, "name": "Ana", "email": "ana@example.com"})
    );
    assert_eq!(
        res.body["product"],
        json!({"id": product_id, "name": "Widget", "price": 15})
    );

    let res = app.get(&format!("/api/products/{}", product_id), None).await;
    assert_eq!(res.body["stock"], 3);

    // Too much
    let res = app
        .post(
            "/api/orders",
            Some(&admin_token),
            json!({"product_id": product_id, "amount": 999, "customer_id": customer_id}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error_code(), "INSUFFICIENT_STOCK");
    assert_eq!(res.body["error"]["details"]["available"], 3);
    assert_eq!(res.body["error"]["details"]["requested"], 999);
    assert_eq!(res.body["error"]["details"]["product_id"], product_id);
    assert_eq!(app.stock_of(product_id).await, 3);

    // Pay it
    let res = app
        .patch(&format!("/api/orders/{}", order_id), Some(&admin_token), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["paid"], true);

    let res = app.get("/api/orders?paid=true", Some(&admin_token)).await;
    assert_eq!(res.status, StatusCode::OK);
    let orders = res.body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id);
}

#[tokio::test]
async fn test_orders_are_admin_only() {
    let app = TestApp::new().await;
    let (user_id, user_token) = app.user("ana@example.com").await;
    let product = app.create_product("Widget", 15, 5).await;

    let res = app
        .post(
            "/api/orders",
            Some(&user_token),
            json!({"product_id": product, "amount": 1, "customer_id": user_id}),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(app.stock_of(product).await, 5);

    let res = app.get("/api/orders", Some(&user_token)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/orders", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_validation_and_references() {
    let app = TestApp::new().await;
    let (admin_id, token) = app.admin().await;
    let product = app.create_product("Widget", 15, 5).await;

    for amount in [0, -2] {
        let res = app
            .post(
                "/api/orders",
                Some(&token),
                json!({"product_id": product, "amount": amount, "customer_id": admin_id}),
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.error_code(), "VALIDATION_ERROR");
    }

    let res = app
        .post(
            "/api/orders",
            Some(&token),
            json!({"product_id": 9999, "amount": 1, "customer_id": admin_id}),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post(
            "/api/orders",
            Some(&token),
            json!({"product_id": product, "amount": 1, "customer_id": 9999}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error_code(), "FK_VIOLATION");
    assert_eq!(res.body["error"]["details"]["customer_id"], 9999);

    // Nothing leaked from the failed attempts
    assert_eq!(app.stock_of(product).await, 5);
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn test_order_lookup_and_delete() {
    let app = TestApp::new().await;
    let (admin_id, token) = app.admin().await;
    let product = app.create_product("Widget", 15, 5).await;

    let res = app
        .post(
            "/api/orders",
            Some(&token),
            json!({"product_id": product, "amount": 2, "customer_id": admin_id}),
        )
        .await;
    let order_id = res.body["id"].as_i64().unwrap();

    let res = app.get(&format!("/api/orders/{}", order_id), Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["product"]["name"], "Widget");

    let res = app.delete(&format!("/api/orders/{}", order_id), Some(&token)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(app.stock_of(product).await, 3);

    let res = app.get(&format!("/api/orders/{}", order_id), Some(&token)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .patch(&format!("/api/orders/{}", order_id), Some(&token), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_filter() {
    let app = TestApp::new().await;
    let (admin_id, token) = app.admin().await;
    let product = app.create_product("Widget", 15, 10).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let res = app
            .post(
                "/api/orders",
                Some(&token),
                json!({"product_id": product, "amount": 1, "customer_id": admin_id}),
            )
            .await;
        ids.push(res.body["id"].as_i64().unwrap());
    }
    app.patch(&format!("/api/orders/{}", ids[0]), Some(&token), json!({}))
        .await;

    let listed = |body: &serde_json::Value| -> Vec<i64> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|o| o["id"].as_i64().unwrap())
            .collect()
    };

    assert_eq!(listed(&app.get("/api/orders", Some(&token)).await.body), ids);
    assert_eq!(
        listed(&app.get("/api/orders?paid=false", Some(&token)).await.body),
        vec![ids[1], ids[2]]
    );
    assert_eq!(
        listed(&app.get("/api/orders?paid=true", Some(&token)).await.body),
        vec![ids[0]]
    );

    let res = app.get("/api/orders?paid=maybe", Some(&token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_concurrent_orders_over_http() {
    let app = Arc::new(TestApp::new().await);
    let (_, token) = app.admin().await;
    let customer = app
        .create_customer("Ana", "ana@example.com", DEFAULT_PASSWORD, Role::User)
        .await;
    let product = app.create_product("Widget", 15, 10).await;

    let tasks: Vec<_> = (0..30)
        .map(|_| {
            let app = app.clone();
            let token = token.clone();
            tokio::spawn(async move {
                app.post(
                    "/api/orders",
                    Some(&token),
                    json!({"product_id": product, "amount": 1, "customer_id": customer}),
                )
                .await
            })
        })
        .collect();

    let mut created = 0;
    for result in futures::future::join_all(tasks).await {
        let res = result.unwrap();
        match res.status {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => assert_eq!(res.error_code(), "INSUFFICIENT_STOCK"),
            other => panic!("unexpected status {}: {}", other, res.body),
        }
    }

    assert_eq!(created, 10);
    assert_eq!(app.stock_of(product).await, 0);
    assert_eq!(app.order_count().await, 10);
}
