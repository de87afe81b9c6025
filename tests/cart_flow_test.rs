mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn adding_items_accumulates_quantity_and_total() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 1500, 10).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada Lovelace");

    let (status, cart) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 3000);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);

    let (status, cart) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 4500);
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(items[0]["line_total_cents"], 4500);
}

#[tokio::test]
async fn adding_beyond_stock_reports_remaining_quantity() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 1000, 3).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 823);
    assert_eq!(body["message"], "Only 3 items left in stock for Widget");
}

#[tokio::test]
async fn adding_a_sold_out_product_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gone", 1000, 0).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 822);
}

#[tokio::test]
async fn adding_an_unknown_product_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": Uuid::new_v4(), "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 821);
}

#[tokio::test]
async fn malformed_product_id_is_an_invalid_product() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": "not-a-uuid", "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 820);
}

#[tokio::test]
async fn zero_quantity_fails_validation() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 1000, 5).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn setting_quantity_replaces_the_line() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 500, 10).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;

    let (status, cart) = app
        .request(
            "PUT",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["quantity"], 5);
    assert_eq!(cart["total_cents"], 2500);
}

#[tokio::test]
async fn reducing_removes_the_line_at_one_unit() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 700, 10).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;

    let (status, cart) = app
        .request(
            "POST",
            "/api/v1/cart/items/reduce",
            Some(&token),
            Some(json!({ "product_id": product.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["quantity"], 1);
    assert_eq!(cart["total_cents"], 700);

    let (status, cart) = app
        .request(
            "POST",
            "/api/v1/cart/items/reduce",
            Some(&token),
            Some(json!({ "product_id": product.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["total_cents"], 0);
}

#[tokio::test]
async fn reducing_an_absent_product_is_a_no_op() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 700, 10).await;
    let other = app.seed_product("Other", 300, 10).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;

    let (status, cart) = app
        .request(
            "POST",
            "/api/v1/cart/items/reduce",
            Some(&token),
            Some(json!({ "product_id": other.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 700);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn removing_and_clearing_empty_the_cart() {
    let app = TestApp::new().await;
    let first = app.seed_product("First", 100, 10).await;
    let second = app.seed_product("Second", 200, 10).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    for product in [&first, &second] {
        app.request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": product.id, "quantity": 1 })),
        )
        .await;
    }

    let (status, cart) = app
        .request(
            "DELETE",
            &format!("/api/v1/cart/items/{}", first.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["total_cents"], 200);

    let (status, cart) = app.request("DELETE", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["total_cents"], 0);
}

#[tokio::test]
async fn carts_are_isolated_per_user() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 1000, 10).await;
    let ada = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");
    let bob = app.token_for(Uuid::new_v4(), "bob@example.com", "Bob");

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&ada),
        Some(json!({ "product_id": product.id, "quantity": 3 })),
    )
    .await;

    let (status, cart) = app.request("GET", "/api/v1/cart", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 801);
}

#[tokio::test]
async fn mutations_advance_the_cart_version_without_changing_reads() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 1000, 10).await;
    let user_id = Uuid::new_v4();
    let token = app.token_for(user_id, "ada@example.com", "Ada");

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;
    app.request(
        "PUT",
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product.id, "quantity": 5 })),
    )
    .await;

    let cart = app.fetch_cart(user_id).await.unwrap();
    assert_eq!(cart.version, 2);
    assert_eq!(cart.total_cents, 5000);

    // reads recompute but never consume a version
    app.request("GET", "/api/v1/cart", Some(&token), None).await;
    let cart = app.fetch_cart(user_id).await.unwrap();
    assert_eq!(cart.version, 2);
}

#[tokio::test]
async fn cart_reads_price_from_the_live_catalog() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", 1000, 10).await;
    let token = app.token_for(Uuid::new_v4(), "ada@example.com", "Ada");

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&token),
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;

    app.set_price(product.id, 1500).await;

    let (status, cart) = app.request("GET", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 3000);
}
