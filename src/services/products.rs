use crate::{
    entities::{
        category, inventory_movement, order_item, product, product_image, product_variant,
        MovementType,
    },
    errors::ServiceError,
    events::EventSender,
    services::{
        categories::slugify,
        inventory::{movement_event, InventoryLedger, MovementRequest},
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ImageInput {
    #[validate(url)]
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VariantInput {
    /// Existing variant to update; new variants omit it
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub price_modifier: Decimal,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock: i32,
}

/// Create/update payload of the back office product form
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub wholesale_price: Option<Decimal>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub min_stock: i32,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Replaces the image set; order gives the position
    #[serde(default)]
    pub images: Vec<ImageInput>,
    /// Replaces the variant set; variants not listed are removed
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Field validation plus the price rules the form enforces before saving
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.base_price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "base_price cannot be negative".to_string(),
            ));
        }
        if self.wholesale_price.is_some_and(|p| p.is_sign_negative()) {
            return Err(ServiceError::ValidationError(
                "wholesale_price cannot be negative".to_string(),
            ));
        }
        for image in &self.images {
            image.validate()?;
        }
        for variant in &self.variants {
            variant.validate()?;
        }
        Ok(())
    }
}

/// Product with its images, variants and category
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub product: product::Model,
    #[schema(value_type = Option<Object>)]
    pub category: Option<category::Model>,
    #[schema(value_type = Vec<Object>)]
    pub images: Vec<product_image::Model>,
    #[schema(value_type = Vec<Object>)]
    pub variants: Vec<product_variant::Model>,
}

/// What [`ProductService::delete`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    Deleted,
    /// Kept inactive because stock movements or orders point at it
    Archived,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product with its images and variants. Opening stock is
    /// recorded as an `entry` movement so the ledger replays to the projection.
    #[instrument(skip(self, input, user_id), fields(name = %input.name))]
    pub async fn create(
        &self,
        input: ProductInput,
        user_id: Option<Uuid>,
    ) -> Result<ProductDetail, ServiceError> {
        input.check()?;

        let txn = self.db.begin().await?;
        let slug = unique_slug(&txn, input.slug.as_deref().unwrap_or(&input.name), None).await?;
        ensure_category(&txn, input.category_id).await?;

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            description: Set(input.description.clone()),
            base_price: Set(input.base_price),
            wholesale_price: Set(input.wholesale_price),
            stock: Set(0),
            min_stock: Set(input.min_stock),
            sku: Set(input.sku.clone()),
            barcode: Set(input.barcode.clone()),
            category_id: Set(input.category_id),
            unit: Set(input.unit.clone()),
            featured: Set(input.featured),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut movements = Vec::new();
        if input.stock > 0 {
            let request = MovementRequest::new(product.id, MovementType::Entry, input.stock)
                .reason("stock inicial")
                .by(user_id);
            movements.push(InventoryLedger::record_movement(&txn, request).await?);
        }

        replace_images(&txn, product.id, &input.images).await?;
        movements.extend(sync_variants(&txn, product.id, &input.variants, user_id).await?);

        txn.commit().await.map_err(|e| {
            error!("Failed to commit product create: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        for movement in &movements {
            self.event_sender.send_or_log(movement_event(movement)).await;
        }
        info!(product_id = %product.id, "product created");
        self.get(product.id).await
    }

    /// Updates a product and replaces its images and variants in one transaction.
    ///
    /// A changed stock value is written through the ledger as an adjustment.
    #[instrument(skip(self, input, user_id))]
    pub async fn update(
        &self,
        id: Uuid,
        input: ProductInput,
        user_id: Option<Uuid>,
    ) -> Result<ProductDetail, ServiceError> {
        input.check()?;

        let txn = self.db.begin().await?;
        let existing = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        let slug = unique_slug(&txn, input.slug.as_deref().unwrap_or(&input.name), Some(id)).await?;
        ensure_category(&txn, input.category_id).await?;

        let stock_delta = input.stock - existing.stock;

        let mut active: product::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.slug = Set(slug);
        active.description = Set(input.description.clone());
        active.base_price = Set(input.base_price);
        active.wholesale_price = Set(input.wholesale_price);
        active.min_stock = Set(input.min_stock);
        active.sku = Set(input.sku.clone());
        active.barcode = Set(input.barcode.clone());
        active.category_id = Set(input.category_id);
        active.unit = Set(input.unit.clone());
        active.featured = Set(input.featured);
        active.active = Set(input.active);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let mut movements = Vec::new();
        if stock_delta != 0 {
            let request = MovementRequest::new(id, MovementType::Adjustment, stock_delta)
                .reason("edición de producto")
                .by(user_id);
            movements.push(InventoryLedger::record_movement(&txn, request).await?);
        }

        replace_images(&txn, id, &input.images).await?;
        movements.extend(sync_variants(&txn, id, &input.variants, user_id).await?);

        txn.commit().await.map_err(|e| {
            error!("Failed to commit product update {}: {}", id, e);
            ServiceError::DatabaseError(e)
        })?;

        for movement in &movements {
            self.event_sender.send_or_log(movement_event(movement)).await;
        }
        info!(product_id = %id, "product updated");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        let product = product::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        self.detail(product).await
    }

    /// Storefront product page lookup
    pub async fn get_by_slug(&self, slug: &str) -> Result<ProductDetail, ServiceError> {
        let product = product::Entity::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::Active.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))?;
        self.detail(product).await
    }

    async fn detail(&self, product: product::Model) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        let images = product
            .find_related(product_image::Entity)
            .order_by_asc(product_image::Column::Position)
            .all(db)
            .await?;
        let variants = product
            .find_related(product_variant::Entity)
            .order_by_asc(product_variant::Column::Name)
            .all(db)
            .await?;
        let category = match product.category_id {
            Some(id) => category::Entity::find_by_id(id).one(db).await?,
            None => None,
        };
        Ok(ProductDetail {
            product,
            category,
            images,
            variants,
        })
    }

    /// Back office listing, newest first, including inactive products
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let paginator = product::Entity::find()
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    pub async fn list_all(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Removes a product.
    ///
    /// Products with stock movements or order lines are archived (`active = false`)
    /// so the ledger and past orders keep their rows; others are deleted along
    /// with their images and variants.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<ProductRemoval, ServiceError> {
        let txn = self.db.begin().await?;
        let product = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let movements = inventory_movement::Entity::find()
            .filter(inventory_movement::Column::ProductId.eq(id))
            .count(&txn)
            .await?;
        let order_lines = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&txn)
            .await?;

        let removal = if movements > 0 || order_lines > 0 {
            let mut active: product::ActiveModel = product.into();
            active.active = Set(false);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
            ProductRemoval::Archived
        } else {
            product_image::Entity::delete_many()
                .filter(product_image::Column::ProductId.eq(id))
                .exec(&txn)
                .await?;
            product_variant::Entity::delete_many()
                .filter(product_variant::Column::ProductId.eq(id))
                .exec(&txn)
                .await?;
            product.delete(&txn).await?;
            ProductRemoval::Deleted
        };
        txn.commit().await?;

        info!(product_id = %id, movements, order_lines, ?removal, "product removed");
        Ok(removal)
    }
}

async fn ensure_category<C: ConnectionTrait>(
    conn: &C,
    category_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    if let Some(id) = category_id {
        category::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Category {} does not exist", id))
            })?;
    }
    Ok(())
}

/// Slug derived from `source`, suffixed with `-2`, `-3`, ... until unused
pub(crate) async fn unique_slug<C: ConnectionTrait>(
    conn: &C,
    source: &str,
    current: Option<Uuid>,
) -> Result<String, ServiceError> {
    let base = slugify(source);
    if base.is_empty() {
        return Err(ServiceError::ValidationError(
            "product name must contain letters or digits".to_string(),
        ));
    }

    let taken: Vec<String> = product::Entity::find()
        .filter(product::Column::Slug.starts_with(base.as_str()))
        .all(conn)
        .await?
        .into_iter()
        .filter(|p| Some(p.id) != current)
        .map(|p| p.slug)
        .collect();

    if !taken.contains(&base) {
        return Ok(base);
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

async fn replace_images<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    images: &[ImageInput],
) -> Result<(), ServiceError> {
    product_image::Entity::delete_many()
        .filter(product_image::Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;

    let has_primary = images.iter().any(|i| i.is_primary);
    let now = Utc::now();
    for (position, image) in images.iter().enumerate() {
        product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(image.url.clone()),
            position: Set(position as i32),
            is_primary: Set(image.is_primary || (!has_primary && position == 0)),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

/// Brings the variant set in line with `inputs`; stock changes go through the ledger
async fn sync_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    inputs: &[VariantInput],
    user_id: Option<Uuid>,
) -> Result<Vec<crate::entities::inventory_movement::Model>, ServiceError> {
    let mut existing: HashMap<Uuid, product_variant::Model> = product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let now = Utc::now();
    let mut movements = Vec::new();

    for input in inputs {
        let (variant_id, current_stock) = match input.id.and_then(|id| existing.remove(&id)) {
            Some(variant) => {
                let id = variant.id;
                let stock = variant.stock;
                let mut active: product_variant::ActiveModel = variant.into();
                active.name = Set(input.name.trim().to_string());
                active.sku = Set(input.sku.clone());
                active.price_modifier = Set(input.price_modifier);
                active.updated_at = Set(now);
                active.update(conn).await?;
                (id, stock)
            }
            None => {
                let created = product_variant::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    name: Set(input.name.trim().to_string()),
                    sku: Set(input.sku.clone()),
                    price_modifier: Set(input.price_modifier),
                    stock: Set(0),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(conn)
                .await?;
                (created.id, 0)
            }
        };

        let delta = input.stock - current_stock;
        if delta != 0 {
            let request = MovementRequest::new(product_id, MovementType::Adjustment, delta)
                .for_variant(Some(variant_id))
                .reason("edición de variante")
                .by(user_id);
            movements.push(InventoryLedger::record_movement(conn, request).await?);
        }
    }

    let removed: Vec<Uuid> = existing.into_keys().collect();
    if !removed.is_empty() {
        product_variant::Entity::delete_many()
            .filter(product_variant::Column::Id.is_in(removed))
            .exec(conn)
            .await?;
    }

    Ok(movements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> ProductInput {
        ProductInput {
            name: "Cal hidratada 25kg".into(),
            slug: None,
            description: None,
            base_price: dec!(4200),
            wholesale_price: Some(dec!(3900)),
            stock: 10,
            min_stock: 3,
            sku: None,
            barcode: None,
            category_id: None,
            unit: Some("bolsa".into()),
            featured: false,
            active: true,
            images: vec![],
            variants: vec![],
        }
    }

    #[test]
    fn negative_prices_are_rejected_before_saving() {
        let mut bad = input();
        bad.base_price = dec!(-1);
        assert!(matches!(bad.check(), Err(ServiceError::ValidationError(_))));

        let mut bad = input();
        bad.wholesale_price = Some(dec!(-0.01));
        assert!(bad.check().is_err());

        assert!(input().check().is_ok());
    }

    #[test]
    fn empty_name_and_negative_stock_fail_validation() {
        let mut bad = input();
        bad.name = String::new();
        assert!(bad.check().is_err());

        let mut bad = input();
        bad.stock = -5;
        assert!(bad.check().is_err());
    }
}
