use crate::{
    entities::{discount, DiscountScope, DiscountType},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DiscountInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    pub scope: DiscountScope,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub category_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub min_quantity: Option<i32>,
    pub min_amount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl DiscountInput {
    /// Value range per type, window order, and exactly one target matching the scope
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;

        if self.value.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "discount value cannot be negative".to_string(),
            ));
        }
        if matches!(
            self.discount_type,
            DiscountType::Percentage | DiscountType::Volume
        ) && self.value > Decimal::ONE_HUNDRED
        {
            return Err(ServiceError::ValidationError(
                "percentage discounts must be between 0 and 100".to_string(),
            ));
        }
        if self.discount_type == DiscountType::Volume && self.min_quantity.is_none() {
            return Err(ServiceError::ValidationError(
                "volume discounts need min_quantity".to_string(),
            ));
        }
        if self.min_amount.is_some_and(|m| m.is_sign_negative()) {
            return Err(ServiceError::ValidationError(
                "min_amount cannot be negative".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ServiceError::ValidationError(
                    "end_date must not be before start_date".to_string(),
                ));
            }
        }

        let targets = (
            self.category_id.is_some(),
            self.product_id.is_some(),
            self.customer_id.is_some(),
        );
        let valid = match self.scope {
            DiscountScope::Global => targets == (false, false, false),
            DiscountScope::Category => targets == (true, false, false),
            DiscountScope::Product => targets == (false, true, false),
            DiscountScope::Customer => targets == (false, false, true),
        };
        if !valid {
            return Err(ServiceError::ValidationError(format!(
                "a {} discount must set exactly its own target",
                self.scope
            )));
        }
        Ok(())
    }
}

/// Active discounts read through `conn`, newest first; works inside a transaction
pub async fn active_discounts_on<C>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<Vec<discount::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let discounts = discount::Entity::find()
        .filter(discount::Column::Active.eq(true))
        .order_by_desc(discount::Column::CreatedAt)
        .all(conn)
        .await?;
    Ok(discounts
        .into_iter()
        .filter(|d| d.is_active_at(now))
        .collect())
}

#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<discount::Model>, ServiceError> {
        Ok(discount::Entity::find()
            .order_by_desc(discount::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Discounts flagged active whose validity window contains `now`
    pub async fn active_discounts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<discount::Model>, ServiceError> {
        active_discounts_on(&*self.db, now).await
    }

    pub async fn get(&self, id: Uuid) -> Result<discount::Model, ServiceError> {
        discount::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount {} not found", id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name, scope = %input.scope))]
    pub async fn create(&self, input: DiscountInput) -> Result<discount::Model, ServiceError> {
        input.check()?;
        let now = Utc::now();
        let model = discount::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            scope: Set(input.scope),
            discount_type: Set(input.discount_type),
            value: Set(input.value),
            category_id: Set(input.category_id),
            product_id: Set(input.product_id),
            customer_id: Set(input.customer_id),
            min_quantity: Set(input.min_quantity),
            min_amount: Set(input.min_amount),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;
        info!(discount_id = %model.id, "discount created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: DiscountInput,
    ) -> Result<discount::Model, ServiceError> {
        input.check()?;
        let mut active: discount::ActiveModel = self.get(id).await?.into();
        active.name = Set(input.name.trim().to_string());
        active.description = Set(input.description);
        active.scope = Set(input.scope);
        active.discount_type = Set(input.discount_type);
        active.value = Set(input.value);
        active.category_id = Set(input.category_id);
        active.product_id = Set(input.product_id);
        active.customer_id = Set(input.customer_id);
        active.min_quantity = Set(input.min_quantity);
        active.min_amount = Set(input.min_amount);
        active.start_date = Set(input.start_date);
        active.end_date = Set(input.end_date);
        active.active = Set(input.active);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Flips the active flag without touching the rest of the discount
    pub async fn set_active(
        &self,
        id: Uuid,
        active_flag: bool,
    ) -> Result<discount::Model, ServiceError> {
        let mut active: discount::ActiveModel = self.get(id).await?.into();
        active.active = Set(active_flag);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = discount::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Discount {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn global(kind: DiscountType, value: Decimal) -> DiscountInput {
        DiscountInput {
            name: "Promo invierno".into(),
            description: None,
            scope: DiscountScope::Global,
            discount_type: kind,
            value,
            category_id: None,
            product_id: None,
            customer_id: None,
            min_quantity: None,
            min_amount: None,
            start_date: None,
            end_date: None,
            active: true,
        }
    }

    #[rstest]
    #[case(DiscountType::Percentage, dec!(0), true)]
    #[case(DiscountType::Percentage, dec!(100), true)]
    #[case(DiscountType::Percentage, dec!(100.01), false)]
    #[case(DiscountType::Fixed, dec!(25000), true)]
    #[case(DiscountType::Fixed, dec!(-1), false)]
    fn value_ranges(#[case] kind: DiscountType, #[case] value: Decimal, #[case] ok: bool) {
        assert_eq!(global(kind, value).check().is_ok(), ok);
    }

    #[test]
    fn volume_needs_min_quantity() {
        let mut input = global(DiscountType::Volume, dec!(5));
        assert!(input.check().is_err());
        input.min_quantity = Some(10);
        assert!(input.check().is_ok());
    }

    #[test]
    fn window_must_be_ordered() {
        let mut input = global(DiscountType::Percentage, dec!(5));
        let now = Utc::now();
        input.start_date = Some(now);
        input.end_date = Some(now - Duration::days(1));
        assert!(input.check().is_err());
    }

    #[test]
    fn scope_requires_exactly_its_target() {
        let mut input = global(DiscountType::Percentage, dec!(5));
        input.product_id = Some(Uuid::new_v4());
        assert!(input.check().is_err());

        input.scope = DiscountScope::Product;
        assert!(input.check().is_ok());

        input.customer_id = Some(Uuid::new_v4());
        assert!(input.check().is_err());
    }
}
