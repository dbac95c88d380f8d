use crate::{entities::category, errors::ServiceError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// URL slug: lowercase ASCII, accents folded, runs of anything else become one `-`
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        };
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Derived from the name when absent
    #[validate(length(max = 120))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CategoryInput) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let slug = self.checked_slug(&input, None).await?;
        if let Some(parent) = input.parent_id {
            self.get(parent).await?;
        }

        let now = Utc::now();
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            description: Set(input.description),
            image_url: Set(input.image_url),
            parent_id: Set(input.parent_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = %model.id, "category created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;
        let slug = self.checked_slug(&input, Some(id)).await?;
        if input.parent_id == Some(id) {
            return Err(ServiceError::ValidationError(
                "a category cannot be its own parent".to_string(),
            ));
        }

        let mut active: category::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.slug = Set(slug);
        active.description = Set(input.description);
        active.image_url = Set(input.image_url);
        active.parent_id = Set(input.parent_id);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes a category; its products keep existing without a category
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = category::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Category {} not found", id)));
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn checked_slug(
        &self,
        input: &CategoryInput,
        current: Option<Uuid>,
    ) -> Result<String, ServiceError> {
        let slug = slugify(input.slug.as_deref().unwrap_or(&input.name));
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(
                "category name must contain letters or digits".to_string(),
            ));
        }

        let clash = category::Entity::find()
            .filter(
                category::Column::Slug
                    .eq(slug.as_str())
                    .or(category::Column::Name.eq(input.name.trim())),
            )
            .one(&*self.db)
            .await?;
        match clash {
            Some(other) if Some(other.id) != current => Err(ServiceError::Conflict(format!(
                "a category named '{}' already exists",
                other.name
            ))),
            _ => Ok(slug),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_folds_accents_and_separators() {
        assert_eq!(slugify("Construcción en Seco"), "construccion-en-seco");
        assert_eq!(slugify("  Pinturas & Barnices!! "), "pinturas-barnices");
        assert_eq!(slugify("Baño / Cocina"), "bano-cocina");
        assert_eq!(slugify("Caño PVC 110mm"), "cano-pvc-110mm");
        assert_eq!(slugify("---"), "");
    }
}
