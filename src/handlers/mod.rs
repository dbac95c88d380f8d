pub mod catalog;
pub mod categories;
pub mod common;
pub mod csv_io;
pub mod customers;
pub mod inventory;
pub mod orders;
pub mod pricing;
pub mod products;
pub mod storefront;
pub mod system;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        catalog::CatalogService, categories::CategoryService, csv_io::CsvService,
        customer_prices::CustomerPriceService, customers::CustomerService,
        discounts::DiscountService, inventory::InventoryLedger, order_status::OrderStatusService,
        orders::OrderService, pricing::PricingService, products::ProductService,
        wishlist::WishlistService,
    },
    storefront::{JsonFileSessionStore, MemorySessionStore, SessionLocks, SessionStore},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub pricing: Arc<PricingService>,
    pub discounts: Arc<DiscountService>,
    pub customer_prices: Arc<CustomerPriceService>,
    pub catalog: Arc<CatalogService>,
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub customers: Arc<CustomerService>,
    pub wishlist: Arc<WishlistService>,
    pub inventory: Arc<InventoryLedger>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub csv: Arc<CsvService>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_locks: SessionLocks,
}

impl AppServices {
    /// Wires every service to the shared pool and event channel.
    ///
    /// Fails only when the configured discount priority does not parse.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let policy = config.discount_policy()?;
        let pricing = PricingService::new(db.clone(), policy);

        let sessions: Arc<dyn SessionStore> = match config.session_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => Arc::new(JsonFileSessionStore::new(dir)),
            _ => Arc::new(MemorySessionStore::new()),
        };

        Ok(Self {
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                pricing.resolver().clone(),
                config.contact.clone(),
                config.currency.clone(),
            )),
            pricing: Arc::new(pricing),
            discounts: Arc::new(DiscountService::new(db.clone())),
            customer_prices: Arc::new(CustomerPriceService::new(db.clone())),
            catalog: Arc::new(CatalogService::new(db.clone(), config.catalog_page_size)),
            categories: Arc::new(CategoryService::new(db.clone())),
            products: Arc::new(ProductService::new(db.clone(), event_sender.clone())),
            customers: Arc::new(CustomerService::new(db.clone())),
            wishlist: Arc::new(WishlistService::new(db.clone())),
            inventory: Arc::new(InventoryLedger::new(db.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone(), event_sender.clone())),
            csv: Arc::new(CsvService::new(db, event_sender)),
            sessions,
            session_locks: SessionLocks::new(),
        })
    }
}
