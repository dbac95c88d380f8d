use crate::{entities::customer, errors::ServiceError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInput {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 30))]
    pub phone: Option<String>,
    pub company: Option<String>,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub is_wholesale: bool,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Customers by name, optionally filtered by a name/email/company substring
    pub async fn list(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let mut query = customer::Entity::find().order_by_asc(customer::Column::Name);
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(customer::Column::Name.contains(term))
                    .add(customer::Column::Email.contains(term))
                    .add(customer::Column::Company.contains(term)),
            );
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    /// Customer linked to an auth platform account
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<customer::Model>, ServiceError> {
        Ok(customer::Entity::find()
            .filter(customer::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CustomerInput) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        self.ensure_unique_email(input.email.as_deref(), None).await?;

        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            name: Set(input.name.trim().to_string()),
            email: Set(input.email.map(|e| e.trim().to_lowercase())),
            phone: Set(input.phone),
            company: Set(input.company),
            tax_id: Set(input.tax_id),
            address: Set(input.address),
            is_wholesale: Set(input.is_wholesale),
            notes: Set(input.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(customer_id = %model.id, wholesale = model.is_wholesale, "customer created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: CustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;
        self.ensure_unique_email(input.email.as_deref(), Some(id))
            .await?;

        let mut active: customer::ActiveModel = existing.into();
        active.user_id = Set(input.user_id);
        active.name = Set(input.name.trim().to_string());
        active.email = Set(input.email.map(|e| e.trim().to_lowercase()));
        active.phone = Set(input.phone);
        active.company = Set(input.company);
        active.tax_id = Set(input.tax_id);
        active.address = Set(input.address);
        active.is_wholesale = Set(input.is_wholesale);
        active.notes = Set(input.notes);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = customer::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Customer {} not found", id)));
        }
        info!(customer_id = %id, "customer deleted");
        Ok(())
    }

    async fn ensure_unique_email(
        &self,
        email: Option<&str>,
        current: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let Some(email) = email.map(|e| e.trim().to_lowercase()) else {
            return Ok(());
        };
        let clash = customer::Entity::find()
            .filter(customer::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;
        match clash {
            Some(other) if Some(other.id) != current => Err(ServiceError::Conflict(format!(
                "a customer with email {} already exists",
                email
            ))),
            _ => Ok(()),
        }
    }
}
