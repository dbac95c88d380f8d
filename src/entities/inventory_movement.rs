use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Cause of a stock change
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementType {
    #[sea_orm(string_value = "entry")]
    Entry,
    #[sea_orm(string_value = "exit")]
    Exit,
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

impl MovementType {
    /// Sign applied to a positive quantity; `None` when the caller's sign is kept (adjustments)
    pub fn sign(&self) -> Option<i32> {
        match self {
            MovementType::Entry | MovementType::Return => Some(1),
            MovementType::Exit | MovementType::Sale => Some(-1),
            MovementType::Adjustment => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MovementType::Entry => "Entrada",
            MovementType::Exit => "Salida",
            MovementType::Sale => "Venta",
            MovementType::Return => "Devolución",
            MovementType::Adjustment => "Ajuste",
        }
    }

    /// Icon name rendered next to the movement in the history table
    pub fn icon(&self) -> &'static str {
        match self {
            MovementType::Entry => "arrow-down-circle",
            MovementType::Exit => "arrow-up-circle",
            MovementType::Sale => "shopping-cart",
            MovementType::Return => "rotate-ccw",
            MovementType::Adjustment => "sliders",
        }
    }
}

/// Immutable ledger entry.
///
/// `quantity` is the signed delta that was requested; `new_stock` is the value
/// written after flooring at zero, so `new_stock - previous_stock` can differ
/// from `quantity` when the floor kicked in.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub user_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Restrict"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
