//! Per-customer rows: negotiated prices and the wishlist.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use materialesya_api::services::customers::CustomerInput;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn customer(app: &TestApp, name: &str) -> Uuid {
    app.state
        .services
        .customers
        .create(CustomerInput {
            user_id: None,
            name: name.to_string(),
            email: None,
            phone: Some("1155550000".to_string()),
            company: None,
            tax_id: None,
            address: None,
            is_wholesale: false,
            notes: None,
        })
        .await
        .expect("create customer")
        .id
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal as string")
        .parse()
        .expect("decimal")
}

#[tokio::test]
async fn saving_a_customer_price_twice_keeps_one_row() {
    let app = TestApp::new().await;
    let buyer = customer(&app, "Obras del Sur").await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;

    let first = app
        .request(
            Method::PUT,
            "/api/v1/customer-prices",
            Some(json!({ "customer_id": buyer, "product_id": cement.product.id, "price": "900" })),
        )
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = response_json(first).await;

    let second = app
        .request(
            Method::PUT,
            "/api/v1/customer-prices",
            Some(json!({ "customer_id": buyer, "product_id": cement.product.id, "price": "850" })),
        )
        .await;
    let second = response_json(second).await;
    assert_eq!(second["data"]["id"], first["data"]["id"]);

    let prices = response_json(
        app.request(Method::GET, &format!("/api/v1/customers/{}/prices", buyer), None)
            .await,
    )
    .await;
    let rows = prices["data"].as_array().expect("price rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(decimal(&rows[0]["price"]), dec!(850));
}

#[tokio::test]
async fn adding_to_the_wishlist_twice_keeps_one_row() {
    let app = TestApp::new().await;
    let buyer = customer(&app, "Ana Gómez").await;
    let drill = app.seed_product("Taladro", dec!(50000), None, 2, None).await;
    let uri = format!("/api/v1/customers/{}/wishlist/{}", buyer, drill.product.id);

    let first = response_json(app.request(Method::PUT, &uri, None).await).await;
    let second = response_json(app.request(Method::PUT, &uri, None).await).await;
    assert_eq!(first["data"]["id"], second["data"]["id"]);

    let list = response_json(
        app.request(Method::GET, &format!("/api/v1/customers/{}/wishlist", buyer), None)
            .await,
    )
    .await;
    let items = list["data"].as_array().expect("wishlist");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Taladro");

    let removed = app.request(Method::DELETE, &uri, None).await;
    assert!(removed.status().is_success());
    let list = response_json(
        app.request(Method::GET, &format!("/api/v1/customers/{}/wishlist", buyer), None)
            .await,
    )
    .await;
    assert!(list["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn session_cart_is_priced_for_its_customer_through_checkout() {
    let app = TestApp::new().await;
    let buyer = customer(&app, "Obras del Sur").await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    app.request(
        Method::PUT,
        "/api/v1/customer-prices",
        Some(json!({ "customer_id": buyer, "product_id": cement.product.id, "price": "800" })),
    )
    .await;

    let added = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-9/cart/items",
            Some(json!({ "product_id": cement.product.id, "customer_id": buyer, "quantity": 2 })),
        )
        .await;
    let session = response_json(added).await;
    assert_eq!(session["data"]["customer_id"], json!(buyer));
    assert_eq!(decimal(&session["data"]["total"]), dec!(1600));

    // the customer is remembered, so checkout needs only the contact fields
    let response = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-9/checkout",
            Some(json!({
                "customer_name": "Obras del Sur",
                "customer_phone": "11 5555 0000"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["order"]["customer_id"], json!(buyer));
    assert_eq!(decimal(&body["data"]["order"]["total"]), dec!(1600));
}
