//! Unit price resolution.
//!
//! A price is resolved in two passes. The first picks the base amount: a
//! customer-specific price wins outright, otherwise wholesale buyers get the
//! wholesale price when the product has one, otherwise the list price. The second
//! pass applies at most one discount, chosen by [`DiscountPolicy`] specificity.
//! Variant modifiers are added last.
//!
//! Customer-specific prices are final: no discount is applied on top of them.

use crate::{
    entities::{
        customer, customer_price, discount, product, product_variant, DiscountScope, DiscountType,
    },
    errors::ServiceError,
    services::discounts::DiscountService,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Ordered list of discount scopes, most specific first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountPolicy {
    scopes: Vec<DiscountScope>,
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            scopes: vec![
                DiscountScope::Product,
                DiscountScope::Category,
                DiscountScope::Customer,
                DiscountScope::Global,
            ],
        }
    }
}

impl DiscountPolicy {
    pub fn new(scopes: Vec<DiscountScope>) -> Result<Self, ServiceError> {
        if scopes.is_empty() {
            return Err(ServiceError::ValidationError(
                "discount priority needs at least one scope".to_string(),
            ));
        }
        for (i, scope) in scopes.iter().enumerate() {
            if scopes[..i].contains(scope) {
                return Err(ServiceError::ValidationError(format!(
                    "discount scope '{}' listed twice",
                    scope
                )));
            }
        }
        Ok(Self { scopes })
    }

    /// Parses a comma separated list such as `product,category,customer,global`
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let scopes = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                DiscountScope::from_str(s).map_err(|_| {
                    ServiceError::ValidationError(format!("unknown discount scope '{}'", s))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(scopes)
    }

    pub fn scopes(&self) -> &[DiscountScope] {
        &self.scopes
    }

    /// Position of `scope` in the priority list; scopes not listed never apply
    fn rank(&self, scope: DiscountScope) -> Option<usize> {
        self.scopes.iter().position(|s| *s == scope)
    }
}

/// Where the pre-discount amount came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    CustomerPrice,
    Wholesale,
    Base,
}

/// Everything the resolver needs besides the product itself
#[derive(Debug, Clone)]
pub struct PricingContext<'a> {
    pub customer_id: Option<Uuid>,
    pub is_wholesale: bool,
    /// Price from the customer price table for this (customer, product) pair
    pub customer_price: Option<Decimal>,
    pub discounts: &'a [discount::Model],
    pub quantity: i32,
    pub now: DateTime<Utc>,
}

impl<'a> PricingContext<'a> {
    /// Anonymous retail buyer, one unit
    pub fn retail(discounts: &'a [discount::Model], now: DateTime<Utc>) -> Self {
        Self {
            customer_id: None,
            is_wholesale: false,
            customer_price: None,
            discounts,
            quantity: 1,
            now,
        }
    }
}

/// Result of resolving one unit price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub source: PriceSource,
    /// Amount chosen by the first pass
    pub base_amount: Decimal,
    pub discount_id: Option<Uuid>,
    pub discount_amount: Decimal,
    pub variant_modifier: Decimal,
    /// Final price of one unit
    pub unit_price: Decimal,
}

impl PriceBreakdown {
    /// Unit price before the discount, variant modifier included
    pub fn list_price(&self) -> Decimal {
        self.unit_price + self.discount_amount
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceResolver {
    policy: DiscountPolicy,
}

impl PriceResolver {
    pub fn new(policy: DiscountPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DiscountPolicy {
        &self.policy
    }

    /// Final unit price of `product` (and optionally one of its variants)
    pub fn resolve_price(
        &self,
        product: &product::Model,
        variant: Option<&product_variant::Model>,
        ctx: &PricingContext<'_>,
    ) -> Decimal {
        self.resolve(product, variant, ctx).unit_price
    }

    pub fn resolve(
        &self,
        product: &product::Model,
        variant: Option<&product_variant::Model>,
        ctx: &PricingContext<'_>,
    ) -> PriceBreakdown {
        let (source, base_amount) = base_amount(product, ctx);

        let discount = match source {
            PriceSource::CustomerPrice => None,
            _ => self.matching_discount(product, base_amount, ctx),
        };

        let discounted = discount
            .map(|d| apply_discount(base_amount, d))
            .unwrap_or(base_amount);
        let discount_amount = base_amount - discounted;

        let variant_modifier = variant.map(|v| v.price_modifier).unwrap_or_default();
        let unit_price = (discounted + variant_modifier).max(Decimal::ZERO).round_dp(2);

        PriceBreakdown {
            source,
            base_amount,
            discount_id: discount.map(|d| d.id),
            discount_amount,
            variant_modifier,
            unit_price,
        }
    }

    /// The single discount that applies to `product` under the policy, if any
    pub fn matching_discount<'d>(
        &self,
        product: &product::Model,
        amount: Decimal,
        ctx: &PricingContext<'d>,
    ) -> Option<&'d discount::Model> {
        ctx.discounts
            .iter()
            .filter(|d| targets(d, product, ctx))
            .filter(|d| passes_gates(d, amount, ctx.quantity, ctx.now))
            .filter_map(|d| self.policy.rank(d.scope).map(|rank| (rank, d)))
            // same scope: the lower resulting price wins
            .min_by(|(ra, a), (rb, b)| {
                ra.cmp(rb)
                    .then_with(|| apply_discount(amount, a).cmp(&apply_discount(amount, b)))
            })
            .map(|(_, d)| d)
    }
}

fn base_amount(product: &product::Model, ctx: &PricingContext<'_>) -> (PriceSource, Decimal) {
    if let Some(price) = ctx.customer_price {
        return (PriceSource::CustomerPrice, price);
    }
    match product.wholesale_price {
        Some(wholesale) if ctx.is_wholesale => (PriceSource::Wholesale, wholesale),
        _ => (PriceSource::Base, product.base_price),
    }
}

fn targets(d: &discount::Model, product: &product::Model, ctx: &PricingContext<'_>) -> bool {
    match d.scope {
        DiscountScope::Global => true,
        DiscountScope::Product => d.product_id == Some(product.id),
        DiscountScope::Category => d.category_id.is_some() && d.category_id == product.category_id,
        DiscountScope::Customer => d.customer_id.is_some() && d.customer_id == ctx.customer_id,
    }
}

/// Activity window plus the optional quantity and amount thresholds.
///
/// `amount` is the unit amount; `min_amount` is compared against the line total.
pub fn passes_gates(
    d: &discount::Model,
    amount: Decimal,
    quantity: i32,
    now: DateTime<Utc>,
) -> bool {
    if !d.is_active_at(now) {
        return false;
    }
    let min_quantity = match d.discount_type {
        DiscountType::Volume => d.min_quantity.unwrap_or(1),
        _ => d.min_quantity.unwrap_or(0),
    };
    if quantity < min_quantity {
        return false;
    }
    match d.min_amount {
        Some(min) => amount * Decimal::from(quantity.max(1)) >= min,
        None => true,
    }
}

/// `amount` after applying `d`, clamped at zero
pub fn apply_discount(amount: Decimal, d: &discount::Model) -> Decimal {
    let reduced = match d.discount_type {
        DiscountType::Percentage | DiscountType::Volume => amount - amount * d.value / HUNDRED,
        DiscountType::Fixed => amount - d.value,
    };
    reduced.max(Decimal::ZERO)
}

/// Price quote for the storefront and back office
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceQuote {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub quantity: i32,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
    pub line_total: Decimal,
}

/// Loads the pricing context from the database and runs the resolver
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
    discounts: DiscountService,
    resolver: PriceResolver,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>, policy: DiscountPolicy) -> Self {
        Self {
            discounts: DiscountService::new(db.clone()),
            db,
            resolver: PriceResolver::new(policy),
        }
    }

    pub fn resolver(&self) -> &PriceResolver {
        &self.resolver
    }

    /// Resolves the unit price of a product for an optional customer and quantity
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        customer_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<PriceQuote, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let db = &*self.db;
        let product = product::Entity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let variant = match variant_id {
            Some(id) => Some(
                product_variant::Entity::find_by_id(id)
                    .filter(product_variant::Column::ProductId.eq(product_id))
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", id)))?,
            ),
            None => None,
        };

        let (is_wholesale, customer_price) = match customer_id {
            Some(id) => {
                let customer = customer::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))?;
                let price = customer_price::Entity::find()
                    .filter(customer_price::Column::CustomerId.eq(id))
                    .filter(customer_price::Column::ProductId.eq(product_id))
                    .one(db)
                    .await?
                    .map(|cp| cp.price);
                (customer.is_wholesale, price)
            }
            None => (false, None),
        };

        let now = Utc::now();
        let discounts = self.discounts.active_discounts(now).await?;
        let ctx = PricingContext {
            customer_id,
            is_wholesale,
            customer_price,
            discounts: &discounts,
            quantity,
            now,
        };

        let breakdown = self.resolver.resolve(&product, variant.as_ref(), &ctx);
        debug!(
            unit_price = %breakdown.unit_price,
            source = ?breakdown.source,
            "price resolved"
        );

        Ok(PriceQuote {
            product_id,
            variant_id,
            customer_id,
            quantity,
            line_total: breakdown.unit_price * Decimal::from(quantity),
            breakdown,
        })
    }
}
