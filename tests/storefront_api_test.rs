//! Storefront over HTTP: catalog browsing, the session cart, the comparator
//! and cart checkout.

mod common;

use axum::http::{Method, StatusCode};
use common::{product_input, response_json, TestApp};
use materialesya_api::{
    entities::{DiscountScope, DiscountType},
    services::discounts::DiscountInput,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal as string")
        .parse()
        .expect("decimal")
}

fn names(page: &Value) -> Vec<String> {
    page["data"]["page"]["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|item| item["name"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn catalog_filters_sorts_and_echoes_the_query() {
    let app = TestApp::new().await;
    let cements = app.seed_category("Cementos").await;
    let tools = app.seed_category("Herramientas").await;
    app.seed_product("Cemento Portland", dec!(8500), None, 40, Some(cements)).await;
    app.seed_product("Cemento blanco", dec!(9900), None, 0, Some(cements)).await;
    app.seed_product("Martillo", dec!(15000), None, 3, Some(tools)).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/catalog?q=cemento&sort=price_desc&category=cementos",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(names(&body), vec!["Cemento blanco", "Cemento Portland"]);
    assert_eq!(body["data"]["page"]["total"], 2);
    assert_eq!(
        body["data"]["query_string"],
        "q=cemento&category=cementos&sort=price_desc"
    );

    let in_stock = app
        .request(Method::GET, "/api/v1/catalog?q=cemento&inStock=true", None)
        .await;
    let body = response_json(in_stock).await;
    assert_eq!(names(&body), vec!["Cemento Portland"]);
}

#[tokio::test]
async fn catalog_rejects_malformed_filters() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/catalog?minPrice=mucho", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_pages_hold_twelve_products() {
    let app = TestApp::new().await;
    for i in 0..14 {
        app.seed_product(&format!("Tornillo {:02}", i), dec!(10), None, 100, None)
            .await;
    }

    let second = app
        .request(Method::GET, "/api/v1/catalog?sort=name_asc&page=2", None)
        .await;
    let body = response_json(second).await;
    assert_eq!(body["data"]["page"]["total_pages"], 2);
    assert_eq!(names(&body), vec!["Tornillo 12", "Tornillo 13"]);
}

#[tokio::test]
async fn pages_far_past_the_end_are_empty() {
    let app = TestApp::new().await;
    app.seed_product("Tornillo", dec!(10), None, 100, None).await;

    let response = app
        .request(Method::GET, "/api/v1/catalog?page=18446744073709551615", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(names(&body).is_empty());
    assert_eq!(body["data"]["page"]["total"], 1);

    let products = app
        .request(Method::GET, "/api/v1/products?page=18446744073709551615", None)
        .await;
    assert_eq!(products.status(), StatusCode::OK);
}

#[tokio::test]
async fn product_detail_by_slug_hides_inactive_products() {
    let app = TestApp::new().await;
    app.seed_product("Cemento Portland", dec!(8500), None, 40, None).await;
    let mut hidden = product_input("Cemento viejo", dec!(1), None, 0, None);
    hidden.active = false;
    app.state
        .services
        .products
        .create(hidden, None)
        .await
        .expect("inactive product");

    let found = app
        .request(Method::GET, "/api/v1/catalog/products/cemento-portland", None)
        .await;
    assert_eq!(found.status(), StatusCode::OK);

    let missing = app
        .request(Method::GET, "/api/v1/catalog/products/cemento-viejo", None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn adding_the_same_product_twice_makes_one_line() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento Portland", dec!(8500), None, 40, None).await;
    let payload = json!({ "product_id": cement.product.id });

    app.request(Method::POST, "/api/v1/storefront/visit-1/cart/items", Some(payload.clone()))
        .await;
    let response = app
        .request(Method::POST, "/api/v1/storefront/visit-1/cart/items", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let items = body["data"]["cart"]["items"].as_array().expect("cart items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(body["data"]["item_count"], 2);
    assert_eq!(decimal(&body["data"]["subtotal"]), dec!(17000));

    // another session has its own cart
    let other = app.request(Method::GET, "/api/v1/storefront/visit-2", None).await;
    let body = response_json(other).await;
    assert!(body["data"]["cart"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn decrementing_the_last_unit_removes_the_line() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento Portland", dec!(8500), None, 40, None).await;
    let line = cement.product.id.to_string();

    app.request(
        Method::POST,
        "/api/v1/storefront/visit-1/cart/items",
        Some(json!({ "product_id": cement.product.id })),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/storefront/visit-1/cart/items/{}/decrement", line),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert!(body["data"]["cart"]["items"].as_array().unwrap().is_empty());

    let gone = app
        .request(
            Method::POST,
            &format!("/api/v1/storefront/visit-1/cart/items/{}/increment", line),
            None,
        )
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comparator_holds_four_products() {
    let app = TestApp::new().await;
    let mut ids = Vec::new();
    for i in 0..5 {
        let p = app
            .seed_product(&format!("Taladro {}", i), dec!(50000), None, 2, None)
            .await;
        ids.push(p.product.id);
    }

    for id in &ids[..4] {
        let response = app
            .request(Method::POST, &format!("/api/v1/storefront/visit-1/compare/{}", id), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let fifth = app
        .request(Method::POST, &format!("/api/v1/storefront/visit-1/compare/{}", ids[4]), None)
        .await;
    assert_eq!(fifth.status(), StatusCode::CONFLICT);

    // toggling a compared product removes it
    let removed = app
        .request(Method::POST, &format!("/api/v1/storefront/visit-1/compare/{}", ids[0]), None)
        .await;
    let body = response_json(removed).await;
    assert_eq!(body["data"]["comparator"]["product_ids"].as_array().unwrap().len(), 3);

    let compared = app
        .request(Method::GET, "/api/v1/storefront/visit-1/compare", None)
        .await;
    let body = response_json(compared).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn view_mode_is_kept_per_session() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::PUT,
            "/api/v1/storefront/visit-1/view-mode",
            Some(json!({ "mode": "list" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body =
        response_json(app.request(Method::GET, "/api/v1/storefront/visit-1", None).await).await;
    assert_eq!(body["data"]["view_mode"], "list");
}

#[tokio::test]
async fn invalid_session_ids_are_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/storefront/..%2Fetc", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_checkout_creates_an_order_and_empties_the_cart() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento Portland", dec!(8500), None, 40, None).await;

    app.request(
        Method::POST,
        "/api/v1/storefront/visit-1/cart/items",
        Some(json!({ "product_id": cement.product.id, "quantity": 3 })),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-1/checkout",
            Some(json!({
                "customer_name": "Juan Pérez",
                "customer_phone": "11 5555 1234"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["order"]["status"], "pending");
    assert_eq!(body["data"]["order"]["items"][0]["quantity"], 3);
    assert!(body["data"]["whatsapp_url"]
        .as_str()
        .unwrap()
        .starts_with("https://wa.me/"));

    let session =
        response_json(app.request(Method::GET, "/api/v1/storefront/visit-1", None).await).await;
    assert!(session["data"]["cart"]["items"].as_array().unwrap().is_empty());

    // an empty cart cannot be checked out
    let again = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-1/checkout",
            Some(json!({
                "customer_name": "Juan Pérez",
                "customer_phone": "11 5555 1234"
            })),
        )
        .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_totals_match_the_order_under_a_global_discount() {
    let app = TestApp::new().await;
    let sand = app.seed_product("Arena fina", dec!(1000), None, 10, None).await;
    app.state
        .services
        .discounts
        .create(DiscountInput {
            name: "Semana de la construcción".to_string(),
            description: None,
            scope: DiscountScope::Global,
            discount_type: DiscountType::Percentage,
            value: dec!(10),
            category_id: None,
            product_id: None,
            customer_id: None,
            min_quantity: None,
            min_amount: None,
            start_date: None,
            end_date: None,
            active: true,
        })
        .await
        .expect("global discount");

    let added = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-1/cart/items",
            Some(json!({ "product_id": sand.product.id })),
        )
        .await;
    let session = response_json(added).await;
    let line = &session["data"]["cart"]["items"][0];
    assert_eq!(decimal(&line["price"]), dec!(1000));
    assert_eq!(decimal(&line["unit_discount"]), dec!(100));
    assert_eq!(decimal(&session["data"]["subtotal"]), dec!(1000));
    assert_eq!(decimal(&session["data"]["discount_amount"]), dec!(100));
    assert_eq!(decimal(&session["data"]["total"]), dec!(900));

    let response = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-1/checkout",
            Some(json!({
                "customer_name": "Juan Pérez",
                "customer_phone": "11 5555 1234"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let order = &body["data"]["order"];
    assert_eq!(decimal(&order["subtotal"]), decimal(&session["data"]["subtotal"]));
    assert_eq!(
        decimal(&order["discount_amount"]),
        decimal(&session["data"]["discount_amount"])
    );
    assert_eq!(decimal(&order["total"]), decimal(&session["data"]["total"]));

    // the message lines add up to its subtotal
    let message = body["data"]["message"].as_str().unwrap();
    assert!(message.contains("- Arena fina x1 = $ 1.000,00"));
    assert!(message.contains("Subtotal: $ 1.000,00"));
    assert!(message.contains("Descuento: -$ 100,00"));
    assert!(message.contains("Total: $ 900,00"));
}

#[tokio::test]
async fn archived_products_keep_their_saved_price_in_the_cart_view() {
    let app = TestApp::new().await;
    let sand = app.seed_product("Arena fina", dec!(1000), None, 10, None).await;
    app.request(
        Method::POST,
        "/api/v1/storefront/visit-1/cart/items",
        Some(json!({ "product_id": sand.product.id, "quantity": 2 })),
    )
    .await;
    app.state
        .services
        .products
        .delete(sand.product.id)
        .await
        .expect("archive");

    let response = app.request(Method::GET, "/api/v1/storefront/visit-1", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = response_json(response).await;
    assert_eq!(decimal(&session["data"]["total"]), dec!(2000));

    let checkout = app
        .request(
            Method::POST,
            "/api/v1/storefront/visit-1/checkout",
            Some(json!({
                "customer_name": "Juan Pérez",
                "customer_phone": "11 5555 1234"
            })),
        )
        .await;
    assert_eq!(checkout.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_adds_to_one_session_are_all_kept() {
    let app = TestApp::new().await;
    let brick = app.seed_product("Ladrillo hueco", dec!(350), None, 500, None).await;
    let add = || {
        app.request(
            Method::POST,
            "/api/v1/storefront/visit-1/cart/items",
            Some(json!({ "product_id": brick.product.id })),
        )
    };

    let (a, b, c, d) = tokio::join!(add(), add(), add(), add());
    for response in [a, b, c, d] {
        assert_eq!(response.status(), StatusCode::OK);
    }

    let session =
        response_json(app.request(Method::GET, "/api/v1/storefront/visit-1", None).await).await;
    assert_eq!(session["data"]["cart"]["items"][0]["quantity"], 4);
    assert_eq!(session["data"]["item_count"], 4);
}

#[tokio::test]
async fn health_contact_and_openapi_are_served() {
    let app = TestApp::new().await;

    let health =
        response_json(app.request(Method::GET, "/api/v1/health", None).await).await;
    assert_eq!(health["data"]["database"], "healthy");

    let contact =
        response_json(app.request(Method::GET, "/api/v1/contact", None).await).await;
    assert_eq!(contact["data"]["whatsapp_url"], "https://wa.me/5491155550000");

    let docs = app.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(docs.status(), StatusCode::OK);
    let docs = response_json(docs).await;
    assert!(docs["paths"]["/api/v1/storefront/{session_id}/checkout"].is_object());
}
