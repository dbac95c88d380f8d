use crate::{
    entities::{customer, product, wishlist_item},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product; adding one that is already listed returns the existing row
    pub async fn add(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<wishlist_item::Model, ServiceError> {
        if let Some(existing) = self.find(customer_id, product_id).await? {
            debug!(%customer_id, %product_id, "already in wishlist");
            return Ok(existing);
        }

        customer::Entity::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?)
    }

    /// Removes a product; returns whether anything was removed
    pub async fn remove(&self, customer_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError> {
        let result = wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::CustomerId.eq(customer_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Wishlisted products, most recently added first
    pub async fn list(&self, customer_id: Uuid) -> Result<Vec<product::Model>, ServiceError> {
        let rows = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::CustomerId.eq(customer_id))
            .order_by_desc(wishlist_item::Column::CreatedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().filter_map(|(_, p)| p).collect())
    }

    async fn find(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<wishlist_item::Model>, ServiceError> {
        Ok(wishlist_item::Entity::find()
            .filter(wishlist_item::Column::CustomerId.eq(customer_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?)
    }
}
