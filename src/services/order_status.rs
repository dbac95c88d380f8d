use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, TransactionTrait,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
        order_item, order_status_history, MovementType, OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::{movement_event, InventoryLedger, MovementRequest},
};

/// Inventory side effect of a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockEffect {
    None,
    /// First entry into delivered: every line leaves stock as a sale
    Sale,
    /// Leaving delivered for pending or cancelled: every line comes back as a return
    Restore,
}

/// A validated status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub effect: StockEffect,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Checks `from -> to` against the workflow and returns its stock effect.
///
/// Forward moves may skip steps. Cancelled is reachable from every state except
/// delivered-as-ordinary-flow and is terminal. Delivered may only go back to
/// pending or cancelled, which restores stock.
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<Transition, ServiceError> {
    use OrderStatus::*;

    let effect = match (from, to) {
        _ if from == to => StockEffect::None,
        (Cancelled, _) => return Err(invalid(from, to)),
        (Delivered, Pending) | (Delivered, Cancelled) => StockEffect::Restore,
        (Delivered, _) => return Err(invalid(from, to)),
        (_, Cancelled) => StockEffect::None,
        (_, Delivered) => StockEffect::Sale,
        _ => match (from.rank(), to.rank()) {
            (Some(a), Some(b)) if b > a => StockEffect::None,
            _ => return Err(invalid(from, to)),
        },
    };

    Ok(Transition { from, to, effect })
}

fn invalid(from: OrderStatus, to: OrderStatus) -> ServiceError {
    ServiceError::InvalidTransition(format!(
        "Cannot transition from status '{}' to '{}'",
        from, to
    ))
}

/// Statuses reachable from `from` in one step
pub fn allowed_transitions(from: OrderStatus) -> Vec<OrderStatus> {
    use sea_orm::Iterable;
    OrderStatus::iter()
        .filter(|to| *to != from && validate_transition(from, *to).is_ok())
        .collect()
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order to `new_status`, applying stock side effects and appending
    /// one history row, all in one transaction.
    ///
    /// Moving to the current status changes nothing and writes no history.
    #[instrument(skip(self, note), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        changed_by: Option<Uuid>,
        note: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| {
                error!("Failed to fetch order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let transition = validate_transition(order.status, new_status).map_err(|e| {
            warn!("Rejected status change for order {}: {}", order_id, e);
            e
        })?;

        if transition.is_noop() {
            txn.rollback().await?;
            info!("Order {} already in status '{}'", order_id, new_status);
            return Ok(order);
        }

        let mut movements = Vec::new();
        if transition.effect != StockEffect::None {
            let items = order_item::Entity::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .all(&txn)
                .await?;

            let (movement_type, reason) = match transition.effect {
                StockEffect::Sale => (MovementType::Sale, "sale"),
                _ => (MovementType::Return, "return"),
            };

            for item in items {
                let request = MovementRequest::new(item.product_id, movement_type, item.quantity)
                    .for_variant(item.variant_id)
                    .reason(format!("{} {}", reason, order.order_number))
                    .by(changed_by)
                    .for_order(order_id);
                movements.push(InventoryLedger::record_movement(&txn, request).await?);
            }
        }

        let old_status = order.status;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(|e| {
            error!("Failed to update order {} status: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?;

        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            previous_status: Set(Some(old_status)),
            new_status: Set(new_status),
            changed_by: Set(changed_by),
            note: Set(note),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction for order {}: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?;

        counter!(
            "materialesya_orders.transitions",
            1,
            "to" => new_status.to_string()
        );
        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_status, new_status
        );

        for movement in &movements {
            self.event_sender.send_or_log(movement_event(movement)).await;
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Status history of an order, oldest first
    pub async fn history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_status_history::Model>, ServiceError> {
        use sea_orm::QueryOrder;

        let exists = OrderEntity::find_by_id(order_id)
            .select_only()
            .column(order::Column::Id)
            .into_tuple::<Uuid>()
            .one(&*self.db)
            .await?;
        if exists.is_none() {
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        }

        Ok(order_status_history::Entity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}
