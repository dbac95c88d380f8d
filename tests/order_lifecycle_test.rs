//! Checkout, the status workflow and its stock side effects.

mod common;

use axum::http::{Method, StatusCode};
use common::{product_input, response_json, TestApp};
use materialesya_api::{
    entities::{product_variant, MovementType, OrderStatus},
    errors::ServiceError,
    services::{
        orders::{CheckoutLine, CheckoutRequest},
        products::{ProductRemoval, VariantInput},
    },
};
use sea_orm::EntityTrait;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

fn checkout_request(lines: Vec<(Uuid, i32)>) -> CheckoutRequest {
    CheckoutRequest {
        customer_id: None,
        customer_name: "Juan Pérez".to_string(),
        customer_phone: "11 5555 1234".to_string(),
        customer_email: Some("juan@example.com".to_string()),
        delivery_address: Some("Calle Falsa 123".to_string()),
        notes: None,
        items: lines
            .into_iter()
            .map(|(product_id, quantity)| CheckoutLine {
                product_id,
                variant_id: None,
                quantity,
            })
            .collect(),
    }
}

async fn variant_stock(app: &TestApp, variant_id: Uuid) -> i32 {
    product_variant::Entity::find_by_id(variant_id)
        .one(&*app.state.db)
        .await
        .expect("variant lookup")
        .expect("variant exists")
        .stock
}

#[tokio::test]
async fn checkout_creates_pending_order_priced_on_the_server() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let sand = app.seed_product("Arena m3", dec!(2500.50), None, 5, None).await;

    let response = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![
            (cement.product.id, 3),
            (sand.product.id, 2),
        ]))
        .await
        .expect("checkout");

    let order = &response.order.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("MY-"));
    assert_eq!(order.subtotal, dec!(8001.00));
    assert_eq!(order.total, dec!(8001.00));
    assert_eq!(response.order.items.len(), 2);
    assert_eq!(response.order.history.len(), 1);
    assert!(response.whatsapp_url.starts_with("https://wa.me/5491155550000?text="));
    assert!(response.message.contains(&order.order_number));

    // checkout alone does not touch stock
    assert_eq!(app.stock_of(cement.product.id).await, 20);
}

#[tokio::test]
async fn checkout_with_an_empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn delivery_decrements_stock_exactly_once() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let checkout = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![(cement.product.id, 4)]))
        .await
        .expect("checkout");
    let order_id = checkout.order.order.id;
    let status = &app.state.services.order_status;

    for next in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Shipped] {
        status
            .update_status(order_id, next, None, None)
            .await
            .expect("forward move");
    }
    assert_eq!(app.stock_of(cement.product.id).await, 20);

    status
        .update_status(order_id, OrderStatus::Delivered, None, Some("entregado".to_string()))
        .await
        .expect("deliver");
    assert_eq!(app.stock_of(cement.product.id).await, 16);

    // a repeated click on an already delivered order changes nothing
    status
        .update_status(order_id, OrderStatus::Delivered, None, None)
        .await
        .expect("repeat deliver");
    assert_eq!(app.stock_of(cement.product.id).await, 16);

    let movements = app
        .state
        .services
        .inventory
        .movements_for_order(order_id)
        .await
        .expect("order movements");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::Sale);
    assert_eq!(movements[0].quantity, -4);

    // pending + 3 forward moves + delivered; the no-op writes nothing
    let history = status.history(order_id).await.expect("history");
    assert_eq!(history.len(), 5);
}

#[tokio::test]
async fn cancelling_after_delivery_restores_stock() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let sand = app.seed_product("Arena m3", dec!(2500), None, 8, None).await;
    let checkout = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![
            (cement.product.id, 5),
            (sand.product.id, 3),
        ]))
        .await
        .expect("checkout");
    let order_id = checkout.order.order.id;
    let status = &app.state.services.order_status;

    status
        .update_status(order_id, OrderStatus::Delivered, None, None)
        .await
        .expect("deliver");
    assert_eq!(app.stock_of(cement.product.id).await, 15);
    assert_eq!(app.stock_of(sand.product.id).await, 5);

    status
        .update_status(order_id, OrderStatus::Cancelled, None, Some("devuelto".to_string()))
        .await
        .expect("cancel");
    assert_eq!(app.stock_of(cement.product.id).await, 20);
    assert_eq!(app.stock_of(sand.product.id).await, 8);

    let returns = app
        .state
        .services
        .inventory
        .movements_for_order(order_id)
        .await
        .expect("order movements")
        .into_iter()
        .filter(|m| m.movement_type == MovementType::Return)
        .count();
    assert_eq!(returns, 2);

    // cancelled is terminal
    let err = status
        .update_status(order_id, OrderStatus::Pending, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn reopening_a_delivered_order_and_delivering_again_sells_twice() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let checkout = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![(cement.product.id, 4)]))
        .await
        .expect("checkout");
    let order_id = checkout.order.order.id;
    let status = &app.state.services.order_status;

    status
        .update_status(order_id, OrderStatus::Delivered, None, None)
        .await
        .expect("deliver");
    assert_eq!(app.stock_of(cement.product.id).await, 16);

    status
        .update_status(order_id, OrderStatus::Pending, None, Some("reabierto".to_string()))
        .await
        .expect("reopen");
    assert_eq!(app.stock_of(cement.product.id).await, 20);

    status
        .update_status(order_id, OrderStatus::Delivered, None, None)
        .await
        .expect("deliver again");
    assert_eq!(app.stock_of(cement.product.id).await, 16);

    let movements = app
        .state
        .services
        .inventory
        .movements_for_order(order_id)
        .await
        .expect("order movements");
    let count = |kind: MovementType| movements.iter().filter(|m| m.movement_type == kind).count();
    assert_eq!(count(MovementType::Sale), 2);
    assert_eq!(count(MovementType::Return), 1);
}

#[tokio::test]
async fn variant_lines_move_the_variant_stock() {
    let app = TestApp::new().await;
    let mut input = product_input("Cemento", dec!(1000), None, 20, None);
    input.variants = vec![VariantInput {
        id: None,
        name: "25kg".to_string(),
        sku: None,
        price_modifier: dec!(-400),
        stock: 10,
    }];
    let cement = app
        .state
        .services
        .products
        .create(input, None)
        .await
        .expect("product with variant");
    let variant_id = cement.variants[0].id;

    let mut request = checkout_request(vec![(cement.product.id, 3)]);
    request.items[0].variant_id = Some(variant_id);
    let checkout = app
        .state
        .services
        .orders
        .checkout(request)
        .await
        .expect("checkout");
    let item = &checkout.order.items[0];
    assert_eq!(item.variant_id, Some(variant_id));
    assert_eq!(item.unit_price, dec!(600));
    assert_eq!(item.product_name, "Cemento (25kg)");

    let order_id = checkout.order.order.id;
    let status = &app.state.services.order_status;
    status
        .update_status(order_id, OrderStatus::Delivered, None, None)
        .await
        .expect("deliver");
    assert_eq!(variant_stock(&app, variant_id).await, 7);
    assert_eq!(app.stock_of(cement.product.id).await, 20);

    status
        .update_status(order_id, OrderStatus::Cancelled, None, None)
        .await
        .expect("cancel");
    assert_eq!(variant_stock(&app, variant_id).await, 10);
    assert_eq!(app.stock_of(cement.product.id).await, 20);
}

#[tokio::test]
async fn deleting_a_sold_product_archives_it_and_keeps_the_ledger() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let checkout = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![(cement.product.id, 5)]))
        .await
        .expect("checkout");
    let order_id = checkout.order.order.id;
    let status = &app.state.services.order_status;
    status
        .update_status(order_id, OrderStatus::Delivered, None, None)
        .await
        .expect("deliver");

    let removed = app
        .request(Method::DELETE, &format!("/api/v1/products/{}", cement.product.id), None)
        .await;
    assert_eq!(removed.status(), StatusCode::OK);
    assert_eq!(response_json(removed).await["data"], "archived");

    status
        .update_status(order_id, OrderStatus::Cancelled, None, None)
        .await
        .expect("cancel after delete");
    assert_eq!(app.stock_of(cement.product.id).await, 20);

    let movements = app
        .state
        .services
        .inventory
        .movements_for_order(order_id)
        .await
        .expect("order movements");
    assert_eq!(movements.len(), 2);

    let archived = app
        .state
        .services
        .products
        .get(cement.product.id)
        .await
        .expect("archived product");
    assert!(!archived.product.active);

    // a product nothing refers to is really deleted
    let unused = app.seed_product("Clavos", dec!(10), None, 0, None).await;
    let removal = app
        .state
        .services
        .products
        .delete(unused.product.id)
        .await
        .expect("delete");
    assert_eq!(removal, ProductRemoval::Deleted);
    assert!(matches!(
        app.state.services.products.get(unused.product.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn cancelling_before_delivery_leaves_stock_alone() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let checkout = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![(cement.product.id, 5)]))
        .await
        .expect("checkout");

    app.state
        .services
        .order_status
        .update_status(checkout.order.order.id, OrderStatus::Cancelled, None, None)
        .await
        .expect("cancel");

    assert_eq!(app.stock_of(cement.product.id).await, 20);
}

#[tokio::test]
async fn status_endpoint_rejects_backward_moves_with_conflict() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento 50kg", dec!(1000), None, 20, None).await;
    let checkout = app
        .state
        .services
        .orders
        .checkout(checkout_request(vec![(cement.product.id, 1)]))
        .await
        .expect("checkout");
    let order_id = checkout.order.order.id;

    let ready = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "ready" })),
        )
        .await;
    assert_eq!(ready.status(), StatusCode::OK);
    let body = response_json(ready).await;
    assert_eq!(body["data"]["status"], "ready");

    let back = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "preparing" })),
        )
        .await;
    assert_eq!(back.status(), StatusCode::CONFLICT);

    let transitions = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/transitions", order_id),
            None,
        )
        .await;
    assert_eq!(transitions.status(), StatusCode::OK);
    let body = response_json(transitions).await;
    let targets: Vec<&str> = body["data"]
        .as_array()
        .expect("transition list")
        .iter()
        .filter_map(|t| t["status"].as_str())
        .collect();
    assert!(targets.contains(&"shipped"));
    assert!(targets.contains(&"cancelled"));
    assert!(!targets.contains(&"pending"));
}
