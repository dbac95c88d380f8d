use crate::{
    entities::{inventory_movement, product, product_variant, stock_alert, MovementType},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// A stock change to record in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovementRequest {
    pub product_id: Uuid,
    /// When set the variant's own stock is changed instead of the product's
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    /// Units moved. Positive for entry/exit/sale/return; signed for adjustments.
    pub quantity: i32,
    pub reason: Option<String>,
    pub user_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}

impl MovementRequest {
    pub fn new(product_id: Uuid, movement_type: MovementType, quantity: i32) -> Self {
        Self {
            product_id,
            variant_id: None,
            movement_type,
            quantity,
            reason: None,
            user_id: None,
            order_id: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn for_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn for_variant(mut self, variant_id: Option<Uuid>) -> Self {
        self.variant_id = variant_id;
        self
    }

    /// Signed stock delta this request asks for
    pub fn signed_delta(&self) -> Result<i32, ServiceError> {
        match self.movement_type.sign() {
            Some(sign) if self.quantity > 0 => Ok(sign * self.quantity),
            Some(_) => Err(ServiceError::ValidationError(format!(
                "{} quantity must be positive",
                self.movement_type
            ))),
            None if self.quantity != 0 => Ok(self.quantity),
            None => Err(ServiceError::ValidationError(
                "adjustment quantity cannot be zero".to_string(),
            )),
        }
    }
}

/// `current + delta`, never below zero
pub fn next_stock(current: i32, delta: i32) -> i32 {
    (i64::from(current) + i64::from(delta)).clamp(0, i64::from(i32::MAX)) as i32
}

/// Outcome of one alert reconciliation pass
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AlertSweep {
    #[schema(value_type = Vec<Object>)]
    pub raised: Vec<stock_alert::Model>,
    #[schema(value_type = Vec<Object>)]
    pub resolved: Vec<stock_alert::Model>,
}

/// Append-only stock ledger with the product stock as its projection.
///
/// Every movement reads the current stock under a row lock, writes the floored
/// new value and appends the movement row in the same transaction.
#[derive(Clone)]
pub struct InventoryLedger {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryLedger {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Records a movement in its own transaction
    #[instrument(
        skip(self, request),
        fields(product_id = %request.product_id, movement_type = %request.movement_type)
    )]
    pub async fn apply_movement(
        &self,
        request: MovementRequest,
    ) -> Result<inventory_movement::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let movement = Self::record_movement(&txn, request).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit stock movement: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        self.event_sender
            .send_or_log(movement_event(&movement))
            .await;
        Ok(movement)
    }

    /// Signed stock adjustment of a product, recorded as an `adjustment` movement
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i32,
        reason: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<inventory_movement::Model, ServiceError> {
        let mut request =
            MovementRequest::new(product_id, MovementType::Adjustment, delta).by(user_id);
        request.reason = reason;
        self.apply_movement(request).await
    }

    /// Signed stock adjustment of one variant
    pub async fn adjust_variant_stock(
        &self,
        product_id: Uuid,
        variant_id: Uuid,
        delta: i32,
        reason: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<inventory_movement::Model, ServiceError> {
        let mut request = MovementRequest::new(product_id, MovementType::Adjustment, delta)
            .for_variant(Some(variant_id))
            .by(user_id);
        request.reason = reason;
        self.apply_movement(request).await
    }

    /// Applies `request` on `conn`, which callers pass a transaction for.
    ///
    /// Does not emit events; the caller does that once its transaction commits.
    pub async fn record_movement<C>(
        conn: &C,
        request: MovementRequest,
    ) -> Result<inventory_movement::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let delta = request.signed_delta()?;
        let now = Utc::now();

        let (previous_stock, new_stock) = match request.variant_id {
            None => {
                let product = product::Entity::find_by_id(request.product_id)
                    .lock_exclusive()
                    .one(conn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", request.product_id))
                    })?;
                let previous = product.stock;
                let new = next_stock(previous, delta);

                let mut active: product::ActiveModel = product.into();
                active.stock = Set(new);
                active.updated_at = Set(now);
                active.update(conn).await?;
                (previous, new)
            }
            Some(variant_id) => {
                let variant = product_variant::Entity::find_by_id(variant_id)
                    .filter(product_variant::Column::ProductId.eq(request.product_id))
                    .lock_exclusive()
                    .one(conn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Variant {} not found", variant_id))
                    })?;
                let previous = variant.stock;
                let new = next_stock(previous, delta);

                let mut active: product_variant::ActiveModel = variant.into();
                active.stock = Set(new);
                active.updated_at = Set(now);
                active.update(conn).await?;
                (previous, new)
            }
        };

        if new_stock - previous_stock != delta {
            warn!(
                product_id = %request.product_id,
                previous_stock,
                delta,
                "stock floored at zero"
            );
        }

        let movement = inventory_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(request.product_id),
            variant_id: Set(request.variant_id),
            movement_type: Set(request.movement_type),
            quantity: Set(delta),
            previous_stock: Set(previous_stock),
            new_stock: Set(new_stock),
            reason: Set(request.reason),
            user_id: Set(request.user_id),
            order_id: Set(request.order_id),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        counter!(
            "materialesya_inventory.movements",
            1,
            "type" => movement.movement_type.to_string()
        );
        info!(
            product_id = %movement.product_id,
            previous_stock,
            new_stock,
            "stock movement recorded"
        );

        Ok(movement)
    }

    /// Raises alerts for products at or below `min_stock` and resolves alerts
    /// of products that recovered. At most one open alert per product.
    #[instrument(skip(self))]
    pub async fn check_stock_alerts(&self) -> Result<AlertSweep, ServiceError> {
        let txn = self.db.begin().await?;

        let products = product::Entity::find().all(&txn).await?;
        let mut open: HashMap<Uuid, stock_alert::Model> = stock_alert::Entity::find()
            .filter(stock_alert::Column::Resolved.eq(false))
            .all(&txn)
            .await?
            .into_iter()
            .map(|alert| (alert.product_id, alert))
            .collect();

        let now = Utc::now();
        let mut sweep = AlertSweep::default();

        for product in products {
            match (product.is_low_stock(), open.remove(&product.id)) {
                (true, None) => {
                    let alert = stock_alert::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product.id),
                        stock_level: Set(product.stock),
                        min_stock: Set(product.min_stock),
                        resolved: Set(false),
                        notified: Set(false),
                        created_at: Set(now),
                        resolved_at: Set(None),
                    }
                    .insert(&txn)
                    .await?;
                    sweep.raised.push(alert);
                }
                (false, Some(alert)) => {
                    let mut active: stock_alert::ActiveModel = alert.into();
                    active.resolved = Set(true);
                    active.resolved_at = Set(Some(now));
                    sweep.resolved.push(active.update(&txn).await?);
                }
                _ => {}
            }
        }

        txn.commit().await?;

        counter!("materialesya_inventory.alerts_raised", sweep.raised.len() as u64);
        counter!(
            "materialesya_inventory.alerts_resolved",
            sweep.resolved.len() as u64
        );

        for alert in &sweep.raised {
            warn!(product_id = %alert.product_id, stock = alert.stock_level, "low stock");
            self.event_sender
                .send_or_log(Event::StockAlertRaised {
                    alert_id: alert.id,
                    product_id: alert.product_id,
                    stock: alert.stock_level,
                    min_stock: alert.min_stock,
                })
                .await;
        }
        for alert in &sweep.resolved {
            self.event_sender
                .send_or_log(Event::StockAlertResolved {
                    alert_id: alert.id,
                    product_id: alert.product_id,
                })
                .await;
        }

        Ok(sweep)
    }

    /// Movements of a product, newest first
    pub async fn list_movements(
        &self,
        product_id: Uuid,
        limit: u64,
    ) -> Result<Vec<inventory_movement::Model>, ServiceError> {
        Ok(inventory_movement::Entity::find()
            .filter(inventory_movement::Column::ProductId.eq(product_id))
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    /// Movements written for an order
    pub async fn movements_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<inventory_movement::Model>, ServiceError> {
        Ok(inventory_movement::Entity::find()
            .filter(inventory_movement::Column::OrderId.eq(order_id))
            .order_by_asc(inventory_movement::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn open_alerts(&self) -> Result<Vec<stock_alert::Model>, ServiceError> {
        Ok(stock_alert::Entity::find()
            .filter(stock_alert::Column::Resolved.eq(false))
            .order_by_desc(stock_alert::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Marks an alert as notified so the back office stops highlighting it
    pub async fn mark_alert_notified(
        &self,
        alert_id: Uuid,
    ) -> Result<stock_alert::Model, ServiceError> {
        let alert = stock_alert::Entity::find_by_id(alert_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock alert {} not found", alert_id)))?;
        let mut active: stock_alert::ActiveModel = alert.into();
        active.notified = Set(true);
        Ok(active.update(&*self.db).await?)
    }

    /// Products with `stock <= min_stock`, lowest stock first
    pub async fn low_stock_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = product::Entity::find()
            .order_by_asc(product::Column::Stock)
            .all(&*self.db)
            .await?;
        Ok(products.into_iter().filter(|p| p.is_low_stock()).collect())
    }

    /// Runs [`check_stock_alerts`](Self::check_stock_alerts) every `period` until the task
    /// is aborted
    pub fn spawn_alert_monitor(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = period.as_secs(), "stock alert monitor started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = self.check_stock_alerts().await {
                    error!("Stock alert check failed: {}", e);
                }
            }
        })
    }
}

/// Event describing a committed movement
pub fn movement_event(movement: &inventory_movement::Model) -> Event {
    Event::StockMovementRecorded {
        movement_id: movement.id,
        product_id: movement.product_id,
        movement_type: movement.movement_type.to_string(),
        previous_stock: movement.previous_stock,
        new_stock: movement.new_stock,
        order_id: movement.order_id,
    }
}
