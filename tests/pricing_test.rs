//! Price resolution against a real database: customer prices, wholesale
//! prices and the discount pass.

mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use materialesya_api::{
    entities::{DiscountScope, DiscountType},
    services::{
        customer_prices::CustomerPriceInput, customers::CustomerInput, discounts::DiscountInput,
        pricing::PriceSource,
    },
};
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn wholesale_customer(app: &TestApp) -> Uuid {
    app.state
        .services
        .customers
        .create(CustomerInput {
            user_id: None,
            name: "Constructora Delta".to_string(),
            email: Some("compras@delta.com.ar".to_string()),
            phone: Some("1155550000".to_string()),
            company: Some("Delta SRL".to_string()),
            tax_id: None,
            address: None,
            is_wholesale: true,
            notes: None,
        })
        .await
        .expect("create customer")
        .id
}

fn category_discount(category_id: Uuid, value: rust_decimal::Decimal) -> DiscountInput {
    DiscountInput {
        name: "Cemento 10%".to_string(),
        description: None,
        scope: DiscountScope::Category,
        discount_type: DiscountType::Percentage,
        value,
        category_id: Some(category_id),
        product_id: None,
        customer_id: None,
        min_quantity: None,
        min_amount: None,
        start_date: None,
        end_date: None,
        active: true,
    }
}

#[tokio::test]
async fn wholesale_buyer_gets_wholesale_price() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cementos").await;
    let product = app
        .seed_product("Cemento 50kg", dec!(1000), Some(dec!(800)), 10, Some(category))
        .await;
    let customer = wholesale_customer(&app).await;

    let quote = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, Some(customer), 1)
        .await
        .expect("quote");

    assert_eq!(quote.breakdown.source, PriceSource::Wholesale);
    assert_eq!(quote.breakdown.unit_price, dec!(800));
}

#[tokio::test]
async fn category_discount_applies_on_top_of_wholesale() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cementos").await;
    let product = app
        .seed_product("Cemento 50kg", dec!(1000), Some(dec!(800)), 10, Some(category))
        .await;
    let customer = wholesale_customer(&app).await;
    app.state
        .services
        .discounts
        .create(category_discount(category, dec!(10)))
        .await
        .expect("create discount");

    let quote = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, Some(customer), 1)
        .await
        .expect("quote");

    assert_eq!(quote.breakdown.unit_price, dec!(720));
    assert_eq!(quote.breakdown.discount_amount, dec!(80));
    assert!(quote.breakdown.discount_id.is_some());
}

#[tokio::test]
async fn retail_buyer_pays_base_price_minus_discount() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cementos").await;
    let product = app
        .seed_product("Cemento 50kg", dec!(1000), Some(dec!(800)), 10, Some(category))
        .await;
    app.state
        .services
        .discounts
        .create(category_discount(category, dec!(10)))
        .await
        .expect("create discount");

    let quote = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, None, 3)
        .await
        .expect("quote");

    assert_eq!(quote.breakdown.source, PriceSource::Base);
    assert_eq!(quote.breakdown.unit_price, dec!(900));
    assert_eq!(quote.line_total, dec!(2700));
}

#[tokio::test]
async fn customer_price_wins_over_wholesale_and_discounts() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cementos").await;
    let product = app
        .seed_product("Cemento 50kg", dec!(1000), Some(dec!(800)), 10, Some(category))
        .await;
    let customer = wholesale_customer(&app).await;
    app.state
        .services
        .discounts
        .create(category_discount(category, dec!(10)))
        .await
        .expect("create discount");
    app.state
        .services
        .customer_prices
        .upsert(CustomerPriceInput {
            customer_id: customer,
            product_id: product.product.id,
            price: dec!(650),
        })
        .await
        .expect("customer price");

    let quote = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, Some(customer), 1)
        .await
        .expect("quote");

    assert_eq!(quote.breakdown.source, PriceSource::CustomerPrice);
    assert_eq!(quote.breakdown.unit_price, dec!(650));
    assert!(quote.breakdown.discount_id.is_none());
}

#[tokio::test]
async fn expired_discount_is_never_applied() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cementos").await;
    let product = app
        .seed_product("Cemento 50kg", dec!(1000), None, 10, Some(category))
        .await;

    let now = Utc::now();
    let mut expired = category_discount(category, dec!(25));
    expired.start_date = Some(now - Duration::days(30));
    expired.end_date = Some(now - Duration::days(1));
    app.state
        .services
        .discounts
        .create(expired)
        .await
        .expect("create discount");

    let quote = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, None, 1)
        .await
        .expect("quote");

    assert_eq!(quote.breakdown.unit_price, dec!(1000));
    assert!(quote.breakdown.discount_id.is_none());
}

#[tokio::test]
async fn product_discount_beats_category_discount() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cementos").await;
    let product = app
        .seed_product("Cemento 50kg", dec!(1000), None, 10, Some(category))
        .await;
    app.state
        .services
        .discounts
        .create(category_discount(category, dec!(10)))
        .await
        .expect("category discount");
    app.state
        .services
        .discounts
        .create(DiscountInput {
            name: "Liquidación".to_string(),
            scope: DiscountScope::Product,
            discount_type: DiscountType::Fixed,
            value: dec!(50),
            category_id: None,
            product_id: Some(product.product.id),
            ..category_discount(category, dec!(0))
        })
        .await
        .expect("product discount");

    let quote = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, None, 1)
        .await
        .expect("quote");

    // one discount only, the most specific one
    assert_eq!(quote.breakdown.unit_price, dec!(950));
}

#[tokio::test]
async fn quote_rejects_zero_quantity() {
    let app = TestApp::new().await;
    let product = app.seed_product("Arena", dec!(100), None, 1, None).await;

    let err = app
        .state
        .services
        .pricing
        .quote(product.product.id, None, None, 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        materialesya_api::errors::ServiceError::ValidationError(_)
    ));
}
