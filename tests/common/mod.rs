#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use materialesya_api::{
    app_router,
    config::AppConfig,
    db,
    entities::product,
    events::{self, EventSender},
    services::{
        categories::CategoryInput,
        products::{ProductDetail, ProductInput},
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Application backed by a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // every connection to sqlite::memory: is its own database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.stock_alert_poll_secs = 0;
        cfg.contact.whatsapp_phone = "+54 9 11 5555-0000".to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender)
            .expect("failed to build application state");
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Sends a request through the full router, JSON body optional
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a raw text body, as the CSV import endpoint expects
    pub async fn request_text(&self, method: Method, uri: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "text/csv")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_category(&self, name: &str) -> Uuid {
        self.state
            .services
            .categories
            .create(CategoryInput {
                name: name.to_string(),
                slug: None,
                description: None,
                image_url: None,
                parent_id: None,
            })
            .await
            .expect("seed category")
            .id
    }

    pub async fn seed_product(
        &self,
        name: &str,
        base_price: Decimal,
        wholesale_price: Option<Decimal>,
        stock: i32,
        category_id: Option<Uuid>,
    ) -> ProductDetail {
        self.state
            .services
            .products
            .create(product_input(name, base_price, wholesale_price, stock, category_id), None)
            .await
            .expect("seed product")
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        use sea_orm::EntityTrait;

        product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("product lookup")
            .expect("product exists")
            .stock
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn product_input(
    name: &str,
    base_price: Decimal,
    wholesale_price: Option<Decimal>,
    stock: i32,
    category_id: Option<Uuid>,
) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        slug: None,
        description: None,
        base_price,
        wholesale_price,
        stock,
        min_stock: 0,
        sku: None,
        barcode: None,
        category_id,
        unit: None,
        featured: false,
        active: true,
        images: vec![],
        variants: vec![],
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 response")
}
