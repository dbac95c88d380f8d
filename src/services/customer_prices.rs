use crate::{
    entities::{customer, customer_price, product},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerPriceInput {
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub price: Decimal,
}

/// Per-customer fixed prices; one row per (customer, product)
#[derive(Clone)]
pub struct CustomerPriceService {
    db: Arc<DatabaseConnection>,
}

impl CustomerPriceService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts the pair or replaces the price of the existing row
    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        input: CustomerPriceInput,
    ) -> Result<customer_price::Model, ServiceError> {
        if input.price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "price cannot be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        customer::Entity::find_by_id(input.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", input.customer_id))
            })?;
        product::Entity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let now = Utc::now();
        let existing = customer_price::Entity::find()
            .filter(customer_price::Column::CustomerId.eq(input.customer_id))
            .filter(customer_price::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        let saved = match existing {
            Some(row) => {
                let mut active: customer_price::ActiveModel = row.into();
                active.price = Set(input.price);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                customer_price::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(input.customer_id),
                    product_id: Set(input.product_id),
                    price: Set(input.price),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };
        txn.commit().await?;

        info!(
            customer_id = %saved.customer_id,
            product_id = %saved.product_id,
            price = %saved.price,
            "customer price saved"
        );
        Ok(saved)
    }

    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<customer_price::Model>, ServiceError> {
        Ok(customer_price::Entity::find()
            .filter(customer_price::Column::CustomerId.eq(customer_id))
            .order_by_asc(customer_price::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<customer_price::Model>, ServiceError> {
        Ok(customer_price::Entity::find()
            .order_by_desc(customer_price::Column::UpdatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn find(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<customer_price::Model>, ServiceError> {
        Ok(customer_price::Entity::find()
            .filter(customer_price::Column::CustomerId.eq(customer_id))
            .filter(customer_price::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = customer_price::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Customer price {} not found",
                id
            )));
        }
        Ok(())
    }
}
