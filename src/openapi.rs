use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MaterialesYA API",
        version = "1.0.0",
        description = r#"
# MaterialesYA

Storefront and back office for a building-materials retailer.

## Features

- **Catalog**: Filtered, sorted and paginated product listing with featured products
- **Storefront sessions**: Cart, product comparator and view mode kept per session id
- **Pricing**: Customer prices first, then the most specific active discount
- **Checkout**: Orders are priced on the server and handed off over WhatsApp
- **Inventory**: Every stock change is a ledger movement; low stock raises alerts
- **Orders**: Six-state workflow with history and stock restoration on cancel
- **CSV**: All-or-nothing product import and product, customer and order export

## Actors

Back-office writes record the operator from the `x-actor-id` header when present.

## Error Handling

Errors share one body:

```json
{
  "error": "Conflict",
  "message": "Invalid status transition: delivered -> pending",
  "request_id": "7f7d...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        contact(name = "MaterialesYA", email = "ventas@materialesya.com"),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Public product listing"),
        (name = "Storefront", description = "Cart, comparator and view mode per session"),
        (name = "Pricing", description = "Price quotes, discounts and customer prices"),
        (name = "Products", description = "Product administration"),
        (name = "Categories", description = "Category administration"),
        (name = "Customers", description = "Customers and wishlists"),
        (name = "Inventory", description = "Stock ledger and alerts"),
        (name = "Orders", description = "Checkout and order workflow"),
        (name = "CSV", description = "Bulk import and export"),
        (name = "System", description = "Health and contact endpoints")
    ),
    paths(
        // System
        crate::handlers::system::health_check,
        crate::handlers::system::contact_info,

        // Catalog
        crate::handlers::catalog::search_catalog,
        crate::handlers::catalog::featured_products,
        crate::handlers::catalog::get_product_by_slug,

        // Storefront
        crate::handlers::storefront::get_session,
        crate::handlers::storefront::add_cart_item,
        crate::handlers::storefront::increment_cart_item,
        crate::handlers::storefront::decrement_cart_item,
        crate::handlers::storefront::remove_cart_item,
        crate::handlers::storefront::clear_cart,
        crate::handlers::storefront::compared_products,
        crate::handlers::storefront::toggle_compare,
        crate::handlers::storefront::clear_comparator,
        crate::handlers::storefront::set_view_mode,
        crate::handlers::storefront::checkout_cart,

        // Pricing
        crate::handlers::pricing::quote_price,
        crate::handlers::pricing::list_discounts,
        crate::handlers::pricing::list_active_discounts,
        crate::handlers::pricing::create_discount,
        crate::handlers::pricing::get_discount,
        crate::handlers::pricing::update_discount,
        crate::handlers::pricing::set_discount_active,
        crate::handlers::pricing::delete_discount,
        crate::handlers::pricing::list_customer_prices,
        crate::handlers::pricing::upsert_customer_price,
        crate::handlers::pricing::delete_customer_price,

        // Products and categories
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::get_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        // Customers
        crate::handlers::customers::list_customers,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::get_customer_by_user,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::list_customer_prices,
        crate::handlers::customers::list_customer_orders,
        crate::handlers::customers::list_wishlist,
        crate::handlers::customers::add_to_wishlist,
        crate::handlers::customers::remove_from_wishlist,

        // Inventory
        crate::handlers::inventory::record_movement,
        crate::handlers::inventory::adjust_stock,
        crate::handlers::inventory::list_movements,
        crate::handlers::inventory::low_stock_products,
        crate::handlers::inventory::open_alerts,
        crate::handlers::inventory::check_alerts,
        crate::handlers::inventory::mark_alert_notified,

        // Orders
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::get_order_history,
        crate::handlers::orders::get_allowed_transitions,
        crate::handlers::orders::get_order_movements,
        crate::handlers::orders::get_order_handoff,

        // CSV
        crate::handlers::csv_io::import_products,
        crate::handlers::csv_io::export_resource,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::errors::ErrorResponse,

            // Enumerations stored in the database
            crate::entities::OrderStatus,
            crate::entities::DiscountType,
            crate::entities::DiscountScope,
            crate::entities::MovementType,

            // Catalog and storefront
            crate::services::catalog::CatalogQuery,
            crate::services::catalog::CatalogItem,
            crate::handlers::catalog::CatalogResponse,
            crate::storefront::Cart,
            crate::storefront::CartItem,
            crate::storefront::Comparator,
            crate::storefront::SessionState,
            crate::storefront::ViewMode,
            crate::handlers::storefront::SessionView,
            crate::handlers::storefront::AddCartItem,
            crate::handlers::storefront::ViewModeUpdate,
            crate::handlers::storefront::CartCheckout,

            // Pricing
            crate::services::pricing::PriceSource,
            crate::services::pricing::PriceBreakdown,
            crate::services::pricing::PriceQuote,
            crate::services::discounts::DiscountInput,
            crate::services::customer_prices::CustomerPriceInput,
            crate::handlers::pricing::ActiveFlag,

            // Back office inputs
            crate::services::products::ProductInput,
            crate::services::products::VariantInput,
            crate::services::products::ImageInput,
            crate::services::products::ProductDetail,
            crate::services::products::ProductRemoval,
            crate::services::categories::CategoryInput,
            crate::services::customers::CustomerInput,

            // Inventory
            crate::services::inventory::MovementRequest,
            crate::services::inventory::AlertSweep,
            crate::handlers::inventory::MovementPayload,
            crate::handlers::inventory::AdjustPayload,
            crate::handlers::inventory::MovementView,

            // Orders
            crate::services::orders::CheckoutLine,
            crate::services::orders::CheckoutRequest,
            crate::services::orders::CheckoutResponse,
            crate::services::orders::OrderDetail,
            crate::handlers::orders::StatusUpdate,
            crate::handlers::orders::TransitionOption,
            crate::handlers::orders::Handoff,

            // CSV and system
            crate::services::csv_io::ImportSummary,
            crate::handlers::system::ContactInfo,
            crate::handlers::system::HealthStatus,
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_storefront_and_back_office_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("MaterialesYA API"));
        assert!(json.contains("/api/v1/orders/checkout"));
        assert!(json.contains("/api/v1/catalog"));
        assert!(json.contains("/api/v1/csv/import/products"));
    }

    #[test]
    fn every_tag_has_a_description() {
        let openapi = ApiDocV1::openapi();
        let tags = openapi.tags.unwrap_or_default();
        assert_eq!(tags.len(), 10);
        assert!(tags.iter().all(|t| t.description.is_some()));
    }
}
