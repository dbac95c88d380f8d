use crate::{
    config::ContactConfig,
    entities::{
        customer, customer_price, order, order_item, order_status_history, product,
        product_variant, OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        discounts::active_discounts_on,
        messaging,
        pricing::{PriceBreakdown, PriceResolver, PricingContext},
    },
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One line of a checkout request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

/// Contact fields plus the cart snapshot
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(length(min = 6, max = 30))]
    pub customer_phone: String,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(max = 500))]
    pub delivery_address: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "the cart is empty"))]
    pub items: Vec<CheckoutLine>,
}

/// Order with its lines and audit trail
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub order: order::Model,
    pub status_label: String,
    pub status_color: String,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<order_item::Model>,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<order_status_history::Model>,
}

impl OrderDetail {
    fn new(
        order: order::Model,
        items: Vec<order_item::Model>,
        history: Vec<order_status_history::Model>,
    ) -> Self {
        Self {
            status_label: order.status.label().to_string(),
            status_color: order.status.badge_color().to_string(),
            order,
            items,
            history,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: OrderDetail,
    /// Pre-filled message sent through WhatsApp
    pub message: String,
    pub whatsapp_url: String,
}

/// One cart line resolved at current prices
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product: product::Model,
    pub variant: Option<product_variant::Model>,
    pub quantity: i32,
    pub price: PriceBreakdown,
}

/// Cart totals exactly as checkout would record them
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    /// Sum of list prices
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}

/// `MY-YYYYMMDD-XXXXXX`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("MY-{}-{}", now.format("%Y%m%d"), suffix)
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    resolver: PriceResolver,
    contact: ContactConfig,
    currency: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        resolver: PriceResolver,
        contact: ContactConfig,
        currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            resolver,
            contact,
            currency,
        }
    }

    /// Creates a pending order from the cart and builds the WhatsApp handoff.
    ///
    /// Prices are resolved again here; the unit prices a client cart carries are
    /// only used for display.
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        request.validate()?;
        // no order without a handoff target
        if self.contact.whatsapp_digits().is_empty() {
            return Err(ServiceError::Configuration(
                "contact.whatsapp_phone has no digits".to_string(),
            ));
        }

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let priced = self
            .price_lines(&txn, request.customer_id, &request.items, now)
            .await?;

        let order_id = Uuid::new_v4();
        let lines: Vec<order_item::ActiveModel> = priced
            .lines
            .iter()
            .map(|line| {
                let quantity = Decimal::from(line.quantity);
                let name = match &line.variant {
                    Some(v) => format!("{} ({})", line.product.name, v.name),
                    None => line.product.name.clone(),
                };
                order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(line.product.id),
                    variant_id: Set(line.variant.as_ref().map(|v| v.id)),
                    product_name: Set(name),
                    unit_price: Set(line.price.unit_price),
                    quantity: Set(line.quantity),
                    line_total: Set(line.price.unit_price * quantity),
                    discount_amount: Set(line.price.discount_amount * quantity),
                }
            })
            .collect();

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number(now)),
            customer_id: Set(request.customer_id),
            customer_name: Set(request.customer_name.trim().to_string()),
            customer_phone: Set(request.customer_phone.trim().to_string()),
            customer_email: Set(request.customer_email.clone()),
            delivery_address: Set(request.delivery_address.clone()),
            notes: Set(request.notes.clone()),
            status: Set(OrderStatus::Pending),
            subtotal: Set(priced.subtotal),
            discount_amount: Set(priced.discount_amount),
            total: Set(priced.total),
            currency: Set(self.currency.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(line.insert(&txn).await?);
        }

        let initial = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            previous_status: Set(None),
            new_status: Set(OrderStatus::Pending),
            changed_by: Set(None),
            note: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit checkout: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        counter!("materialesya_orders.created", 1);
        info!(order_number = %order.order_number, total = %order.total, "order created");
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id,
                order_number: order.order_number.clone(),
            })
            .await;

        let message = messaging::order_message(&order, &items);
        let whatsapp_url = messaging::whatsapp_link(&self.contact, &message)?;

        Ok(CheckoutResponse {
            order: OrderDetail::new(order, items, vec![initial]),
            message,
            whatsapp_url,
        })
    }

    /// Prices cart lines at current prices without placing an order
    pub async fn quote_cart(
        &self,
        customer_id: Option<Uuid>,
        items: &[CheckoutLine],
    ) -> Result<PricedCart, ServiceError> {
        self.price_lines(&*self.db, customer_id, items, Utc::now()).await
    }

    /// Resolves every line and sums the totals an order would carry
    async fn price_lines<C>(
        &self,
        conn: &C,
        customer_id: Option<Uuid>,
        items: &[CheckoutLine],
        now: DateTime<Utc>,
    ) -> Result<PricedCart, ServiceError>
    where
        C: ConnectionTrait,
    {
        let (is_wholesale, customer_prices) = match customer_id {
            Some(id) => {
                let customer = customer::Entity::find_by_id(id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))?;
                let prices: HashMap<Uuid, Decimal> = customer_price::Entity::find()
                    .filter(customer_price::Column::CustomerId.eq(id))
                    .all(conn)
                    .await?
                    .into_iter()
                    .map(|cp| (cp.product_id, cp.price))
                    .collect();
                (customer.is_wholesale, prices)
            }
            None => (false, HashMap::new()),
        };

        let discounts = active_discounts_on(conn, now).await?;

        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Decimal::ZERO;
        let mut discount_amount = Decimal::ZERO;

        for line in items {
            line.validate()?;
            let product = product::Entity::find_by_id(line.product_id)
                .one(conn)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            let variant = match line.variant_id {
                Some(variant_id) => Some(
                    product_variant::Entity::find_by_id(variant_id)
                        .filter(product_variant::Column::ProductId.eq(product.id))
                        .one(conn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Variant {} not found", variant_id))
                        })?,
                ),
                None => None,
            };

            let ctx = PricingContext {
                customer_id,
                is_wholesale,
                customer_price: customer_prices.get(&product.id).copied(),
                discounts: &discounts,
                quantity: line.quantity,
                now,
            };
            let price = self.resolver.resolve(&product, variant.as_ref(), &ctx);

            let quantity = Decimal::from(line.quantity);
            subtotal += price.list_price() * quantity;
            discount_amount += price.discount_amount * quantity;

            lines.push(PricedLine {
                product,
                variant,
                quantity: line.quantity,
                price,
            });
        }

        let subtotal = subtotal.round_dp(2);
        let discount_amount = discount_amount.min(subtotal).round_dp(2);
        Ok(PricedCart {
            lines,
            subtotal,
            discount_amount,
            total: subtotal - discount_amount,
        })
    }

    /// Order with items and status history
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;
        let history = order_status_history::Entity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(OrderDetail::new(order, items, history))
    }

    /// Orders newest first, optionally filtered by status. Returns the page and the total count.
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Orders placed by a customer account, newest first
    pub async fn orders_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}
