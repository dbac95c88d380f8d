use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product.
///
/// `stock` is the mutable projection of the inventory ledger and never goes below
/// zero. The displayed price is derived at read time from `base_price`,
/// `wholesale_price`, customer prices and discounts; it is never stored here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub base_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub wholesale_price: Option<Decimal>,
    pub stock: i32,
    pub min_stock: i32,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    /// Sale unit, e.g. "bolsa", "m2", "unidad"
    pub unit: Option<String>,
    pub featured: bool,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "super::product_variant::Entity")]
    Variants,
    #[sea_orm(has_many = "super::product_image::Entity")]
    Images,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the product sits at or below its alert threshold
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
