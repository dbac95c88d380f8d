use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Account id in the hosted auth platform, when the customer signed up online
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// CUIT/CUIL or other tax identifier
    pub tax_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub address: Option<String>,
    /// Wholesale buyers get `wholesale_price` when no customer price exists
    pub is_wholesale: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::customer_price::Entity")]
    CustomerPrices,
}

impl Related<super::customer_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustomerPrices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
